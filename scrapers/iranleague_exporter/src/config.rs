use chrono::{FixedOffset, Offset, Utc};
use std::{collections::HashMap, env, str::FromStr, time::Duration};

use crate::{error::ConfigError, types::Language};

pub const DEFAULT_URL: &str = "https://iranleague.ir/fa/MatchSchedule/1/1";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "fa-IR,fa;q=0.9,en-US;q=0.8,en;q=0.7";
/// One week.
pub const MAX_UPDATE_INTERVAL_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "ERROR" => Ok(LogLevel::Error),
            "CRITICAL" => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    pub host: String,
    pub port: i64,
    pub workers: i64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: 1,
        }
    }
}

impl HttpConfig {
    /// Host and port in the form `TcpListener::bind` accepts.
    pub fn bind_addr(&self) -> Result<(String, u16), ConfigError> {
        match u16::try_from(self.port) {
            Ok(port) if port > 0 => Ok((self.host.clone(), port)),
            _ => Err(ConfigError::InvalidValue {
                key: "HTTP_PORT".to_string(),
                expected: "between 1 and 65535".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrawlerConfig {
    pub url: String,
    pub connect_timeout: f64,
    pub read_timeout: f64,
    pub max_retries: i64,
    pub retry_backoff_factor: f64,
    pub user_agent: String,
    pub accept_language: String,
    /// UTC offset of the kickoff times printed on the schedule page.
    pub kickoff_offset: FixedOffset,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: 5.0,
            read_timeout: 10.0,
            max_retries: 3,
            retry_backoff_factor: 0.5,
            user_agent: format!("IranLeagueExporter/{}", env!("CARGO_PKG_VERSION")),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            kickoff_offset: iran_standard_time(),
        }
    }
}

#[derive(Clone, Default, PartialEq)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub crawler: CrawlerConfig,
    pub auth: AuthConfig,
    pub log_level: LogLevel,
    pub label_lang: Language,
    pub update_interval_minutes: i64,
    pub shutdown_grace_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            crawler: CrawlerConfig::default(),
            auth: AuthConfig::default(),
            log_level: LogLevel::Info,
            label_lang: Language::En,
            update_interval_minutes: 30,
            shutdown_grace_secs: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Builds the configuration from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = EnvReader { lookup };

        if let Some(host) = env.string("HTTP_HOST") {
            config.http.host = host;
        }
        if let Some(port) = env.parse::<i64>("HTTP_PORT", "an integer")? {
            config.http.port = port;
        }
        if let Some(workers) = env.parse::<i64>("HTTP_WORKERS", "an integer")? {
            config.http.workers = workers;
        }

        if let Some(url) = env.string("CRAWLER_URL") {
            config.crawler.url = url;
        }
        if let Some(timeout) = env.parse::<f64>("CRAWLER_CONNECT_TIMEOUT", "a number")? {
            config.crawler.connect_timeout = timeout;
        }
        if let Some(timeout) = env.parse::<f64>("CRAWLER_READ_TIMEOUT", "a number")? {
            config.crawler.read_timeout = timeout;
        }
        if let Some(retries) = env.parse::<i64>("CRAWLER_MAX_RETRIES", "an integer")? {
            config.crawler.max_retries = retries;
        }
        if let Some(backoff) = env.parse::<f64>("CRAWLER_RETRY_BACKOFF", "a number")? {
            config.crawler.retry_backoff_factor = backoff;
        }
        if let Some(user_agent) = env.string("CRAWLER_USER_AGENT") {
            config.crawler.user_agent = user_agent;
        }
        if let Some(accept_language) = env.string("CRAWLER_ACCEPT_LANGUAGE") {
            config.crawler.accept_language = accept_language;
        }
        if let Some(offset) = env.string("KICKOFF_UTC_OFFSET") {
            config.crawler.kickoff_offset =
                parse_utc_offset(&offset).ok_or_else(|| ConfigError::InvalidValue {
                    key: "KICKOFF_UTC_OFFSET".to_string(),
                    expected: "a UTC offset like +03:30".to_string(),
                })?;
        }

        config.auth.username = env.string("AUTH_USERNAME").unwrap_or_default();
        config.auth.password = env.string("AUTH_PASSWORD").unwrap_or_default();

        if let Some(level) = env.parse::<LogLevel>(
            "LOG_LEVEL",
            "one of: DEBUG, INFO, WARNING, ERROR, CRITICAL",
        )? {
            config.log_level = level;
        }
        if let Some(lang) = env.parse::<Language>("LABEL_LANG", "one of: FA, EN")? {
            config.label_lang = lang;
        }
        if let Some(interval) = env.parse::<i64>("UPDATE_INTERVAL", "an integer")? {
            config.update_interval_minutes = interval;
        }
        if let Some(grace) = env.parse::<u64>("SHUTDOWN_GRACE_SECS", "a non-negative integer")? {
            config.shutdown_grace_secs = grace;
        }

        Ok(config)
    }

    /// Returns every problem found; an empty list means the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.auth.is_configured() {
            errors.push(
                "Authentication not configured: AUTH_USERNAME and AUTH_PASSWORD required"
                    .to_string(),
            );
        }
        errors.extend(self.validate_runtime());

        errors
    }

    /// Checks everything except credentials, for commands that do not serve HTTP.
    pub fn validate_runtime(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.update_interval_minutes < 1 {
            errors.push("UPDATE_INTERVAL must be at least 1 minute".to_string());
        } else if self.update_interval_minutes > MAX_UPDATE_INTERVAL_MINUTES {
            errors.push(format!(
                "UPDATE_INTERVAL must be at most {} minutes",
                MAX_UPDATE_INTERVAL_MINUTES
            ));
        }
        if !(1..=65535).contains(&self.http.port) {
            errors.push("HTTP_PORT must be between 1 and 65535".to_string());
        }
        if self.http.workers < 1 {
            errors.push("HTTP_WORKERS must be at least 1".to_string());
        }
        if !(self.crawler.connect_timeout > 0.0 && self.crawler.connect_timeout.is_finite()) {
            errors.push("CRAWLER_CONNECT_TIMEOUT must be positive".to_string());
        }
        if !(self.crawler.read_timeout > 0.0 && self.crawler.read_timeout.is_finite()) {
            errors.push("CRAWLER_READ_TIMEOUT must be positive".to_string());
        }
        if self.crawler.max_retries < 0 {
            errors.push("CRAWLER_MAX_RETRIES must not be negative".to_string());
        }
        if !(self.crawler.retry_backoff_factor >= 0.0 && self.crawler.retry_backoff_factor.is_finite()) {
            errors.push("CRAWLER_RETRY_BACKOFF must not be negative".to_string());
        }

        errors
    }

    pub fn update_interval(&self) -> Duration {
        let minutes = self.update_interval_minutes.clamp(1, MAX_UPDATE_INTERVAL_MINUTES) as u64;
        Duration::from_secs(minutes.saturating_mul(60))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn parse<T: FromStr>(&self, key: &str, expected: &str) -> Result<Option<T>, ConfigError> {
        match (self.lookup)(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    expected: expected.to_string(),
                }),
        }
    }
}

pub fn iran_standard_time() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix())
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
