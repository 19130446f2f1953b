use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use iranleague_exporter::{
    config::AppConfig,
    fetcher::Fetcher,
    metrics::{ExporterInfo, MetricsStore, EXPORTER_VERSION},
    scheduler::Scheduler,
    scraper::ScheduleParser,
    types::{Language, Match},
    web::{self, AppState},
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the exporter (default)
    Serve,
    /// Fetch the schedule once and print the upcoming matches as JSON
    Scrape {
        /// Label language, FA or EN
        #[arg(short, long)]
        lang: Option<Language>,
        /// Schedule page to fetch instead of CRAWLER_URL
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Parse a saved schedule page and print the upcoming matches as JSON
    Parse {
        /// Path to the HTML file to parse
        #[arg(short, long)]
        file: PathBuf,
        /// Label language, FA or EN
        #[arg(short, long)]
        lang: Option<Language>,
    },
}

fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let errors = match command {
        Commands::Serve => config.validate(),
        _ => config.validate_runtime(),
    };
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_max_level(config.log_level.as_tracing())
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.http.workers as usize)
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        match command {
            Commands::Serve => serve(config).await,
            Commands::Scrape { lang, url } => scrape_once(config, lang, url).await,
            Commands::Parse { file, lang } => parse_file(config, file, lang).await,
        }
    })
}

async fn serve(config: AppConfig) -> Result<()> {
    let fetcher = Fetcher::new(&config.crawler)?;
    let parser = ScheduleParser::new(config.label_lang, config.crawler.kickoff_offset);
    let store = MetricsStore::new(ExporterInfo::new(
        config.label_lang.as_str(),
        config.update_interval_minutes,
    ));
    let scheduler = Arc::new(
        Scheduler::new(fetcher, parser, store.clone(), config.update_interval())
            .with_grace_period(config.shutdown_grace()),
    );

    let (host, port) = config.http.bind_addr()?;
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("failed to bind {}:{}", host, port))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run(shutdown_rx).await })
    };

    info!(
        "Started Iran League Exporter {} - updating every {} minutes",
        EXPORTER_VERSION,
        config.update_interval_minutes
    );

    web::serve(listener, AppState::new(store, &config.auth), shutdown_signal()).await?;

    info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    let wait = config.shutdown_grace() + Duration::from_secs(1);
    if tokio::time::timeout(wait, scheduler_task).await.is_err() {
        warn!("Scheduler did not stop within {:?}", wait);
    }

    info!("Shutdown complete");
    Ok(())
}

async fn scrape_once(config: AppConfig, lang: Option<Language>, url: Option<String>) -> Result<()> {
    let mut crawler = config.crawler.clone();
    if let Some(url) = url {
        crawler.url = url;
    }

    let fetcher = Fetcher::new(&crawler)?;
    let parser = ScheduleParser::new(lang.unwrap_or(config.label_lang), crawler.kickoff_offset);
    let matches = fetcher
        .get_matches(&parser)
        .await
        .with_context(|| format!("failed to scrape {}", fetcher.url()))?;

    print_matches(&matches)
}

async fn parse_file(config: AppConfig, file: PathBuf, lang: Option<Language>) -> Result<()> {
    let html = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let parser = ScheduleParser::new(
        lang.unwrap_or(config.label_lang),
        config.crawler.kickoff_offset,
    );
    print_matches(&parser.parse(&html))
}

fn print_matches(matches: &[Match]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(matches)?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
