use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// An upcoming fixture: team-pair label and kickoff as Unix seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub teams: String,
    pub kickoff: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "FA")]
    Fa,
    #[serde(rename = "EN")]
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Fa => "FA",
            Language::En => "EN",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FA" => Ok(Language::Fa),
            "EN" => Ok(Language::En),
            other => Err(format!("unknown language: {}", other)),
        }
    }
}

/// Outcome of one scrape cycle.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    pub matches: Vec<Match>,
    pub fetched_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
}

impl ScrapeResult {
    pub fn succeeded(matches: Vec<Match>) -> Self {
        Self {
            matches,
            fetched_at: Utc::now(),
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            fetched_at: Utc::now(),
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Fetching,
    Parsing,
    Publishing,
    Failed,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Fetching => "fetching",
            SchedulerState::Parsing => "parsing",
            SchedulerState::Publishing => "publishing",
            SchedulerState::Failed => "failed",
        };
        f.write_str(s)
    }
}
