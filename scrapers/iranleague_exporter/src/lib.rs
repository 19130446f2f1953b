pub mod config;
pub mod error;
pub mod fetcher;
pub mod jalali;
pub mod metrics;
pub mod scheduler;
pub mod scraper;
pub mod types;
pub mod utils;
pub mod web;
