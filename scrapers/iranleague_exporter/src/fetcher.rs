use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE},
    StatusCode,
};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::{
    config::CrawlerConfig,
    error::{CrawlerError, Result},
    scraper::ScheduleParser,
    types::Match,
};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Responses worth asking again for; anything else non-200 fails immediately.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Delay before retry number `attempt` (0-based): `factor * 2^attempt` seconds.
pub fn backoff_delay(factor: f64, attempt: u32) -> Duration {
    let secs = factor * 2f64.powi(attempt.min(16) as i32);
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

fn secs(value: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| CrawlerError::Client(format!("invalid {}: {}", name, value)))
}

/// Retrieves the schedule page with connect/read timeouts and retries.
pub struct Fetcher {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
    backoff_factor: f64,
}

impl Fetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| CrawlerError::Client(format!("invalid accept-language: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .connect_timeout(secs(config.connect_timeout, "connect timeout")?)
            .read_timeout(secs(config.read_timeout, "read timeout")?)
            .build()
            .map_err(|e| CrawlerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            max_retries: config.max_retries.max(0) as u32,
            backoff_factor: config.retry_backoff_factor.max(0.0),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> Result<String> {
        self.fetch_url(&self.url).await
    }

    pub async fn fetch_url(&self, url: &str) -> Result<String> {
        let mut attempt = 0;

        loop {
            debug!(url, attempt, "Fetching match data");
            let failure = match self.client.get(url).send().await {
                Ok(response) if response.status() == StatusCode::OK => {
                    return response.text().await.map_err(CrawlerError::from);
                }
                Ok(response) => {
                    let status_code = response.status().as_u16();
                    let err = CrawlerError::Http { status_code };
                    if !RETRYABLE_STATUSES.contains(&status_code) {
                        error!("Failed to fetch data: HTTP {}", status_code);
                        return Err(err);
                    }
                    err
                }
                Err(e) => {
                    let err = CrawlerError::from(e);
                    if !matches!(err, CrawlerError::Timeout | CrawlerError::Connection(_)) {
                        error!("Request failed: {}", err);
                        return Err(err);
                    }
                    err
                }
            };

            if attempt >= self.max_retries {
                error!(attempts = attempt + 1, "Giving up fetching match data: {}", failure);
                return Err(failure);
            }

            let delay = backoff_delay(self.backoff_factor, attempt);
            warn!(
                "Retry attempt {} after error: {} (waiting {:?})",
                attempt + 1,
                failure,
                delay
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Fetches the schedule page and extracts its upcoming matches.
    pub async fn get_matches(&self, parser: &ScheduleParser) -> Result<Vec<Match>> {
        let html = self.fetch().await?;
        Ok(parser.parse(&html))
    }
}
