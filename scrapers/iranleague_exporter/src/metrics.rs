use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::HashMap,
    fmt::Write,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::types::{Match, ScrapeResult};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Version string shared by the build-info metric and the health endpoint.
pub const EXPORTER_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

const MATCHES: &str = "ir_league_matches";
const EXPORTER_INFO: &str = "ir_league_exporter_info";
const SCRAPE_DURATION: &str = "ir_league_scrape_duration_seconds";
const SCRAPE_SUCCESS: &str = "ir_league_scrape_success";
const MATCHES_TOTAL: &str = "ir_league_matches_total";

/// Bookkeeping about the most recent scrape attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LastScrape {
    pub time: Option<DateTime<Utc>>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_secs: f64,
}

/// Static labels of the build-info metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ExporterInfo {
    pub version: String,
    pub label_lang: String,
    pub update_interval: String,
}

impl ExporterInfo {
    pub fn new(label_lang: impl Into<String>, update_interval_minutes: i64) -> Self {
        Self {
            version: EXPORTER_VERSION.to_string(),
            label_lang: label_lang.into(),
            update_interval: update_interval_minutes.to_string(),
        }
    }
}

/// Match snapshot and auxiliary gauges, always read and written as one unit.
#[derive(Debug, Clone, Default)]
struct MetricsState {
    matches: HashMap<String, i64>,
    matches_count: usize,
    last_scrape: LastScrape,
}

/// In-memory "team pair -> kickoff" gauges shared between the scheduler
/// (sole writer) and the HTTP handlers.
#[derive(Clone)]
pub struct MetricsStore {
    state: Arc<Mutex<MetricsState>>,
    info: Arc<ExporterInfo>,
}

impl MetricsStore {
    pub fn new(info: ExporterInfo) -> Self {
        Self {
            state: Arc::new(Mutex::new(MetricsState::default())),
            info: Arc::new(info),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swaps in a new match snapshot. Duplicate team pairs keep the last kickoff.
    pub fn replace(&self, matches: &[Match], duration: Duration) {
        let snapshot: HashMap<String, i64> = matches
            .iter()
            .map(|m| (m.teams.clone(), m.kickoff))
            .collect();

        let mut state = self.lock();
        state.matches_count = snapshot.len();
        state.matches = snapshot;
        state.last_scrape = LastScrape {
            time: Some(Utc::now()),
            success: true,
            error: None,
            duration_secs: duration.as_secs_f64(),
        };
    }

    /// Marks the last scrape as failed while keeping the previous snapshot.
    pub fn record_failure(&self, error: impl Into<String>, duration: Duration) {
        let mut state = self.lock();
        state.last_scrape = LastScrape {
            time: Some(Utc::now()),
            success: false,
            error: Some(error.into()),
            duration_secs: duration.as_secs_f64(),
        };
    }

    pub fn record(&self, result: &ScrapeResult, duration: Duration) {
        if result.success {
            self.replace(&result.matches, duration);
        } else {
            let error = result.error.clone().unwrap_or_else(|| "unknown error".to_string());
            self.record_failure(error, duration);
        }
    }

    pub fn last_scrape(&self) -> LastScrape {
        self.lock().last_scrape.clone()
    }

    pub fn snapshot(&self) -> HashMap<String, i64> {
        self.lock().matches.clone()
    }

    /// Renders every gauge in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let state = self.lock().clone();
        let mut out = String::new();

        header(&mut out, MATCHES, "Timestamp of IR football league matches");
        let mut matches: Vec<_> = state.matches.iter().collect();
        matches.sort();
        for (teams, kickoff) in matches {
            let _ = writeln!(out, "{}{{teams=\"{}\"}} {}", MATCHES, escape_label(teams), kickoff);
        }

        header(&mut out, EXPORTER_INFO, "Information about the Iran League exporter");
        let _ = writeln!(
            out,
            "{}{{label_lang=\"{}\",update_interval=\"{}\",version=\"{}\"}} 1",
            EXPORTER_INFO,
            escape_label(&self.info.label_lang),
            escape_label(&self.info.update_interval),
            escape_label(&self.info.version),
        );

        header(&mut out, SCRAPE_DURATION, "Duration of the last scrape in seconds");
        let _ = writeln!(out, "{} {}", SCRAPE_DURATION, state.last_scrape.duration_secs);

        header(
            &mut out,
            SCRAPE_SUCCESS,
            "Whether the last scrape was successful (1) or not (0)",
        );
        let _ = writeln!(out, "{} {}", SCRAPE_SUCCESS, u8::from(state.last_scrape.success));

        header(&mut out, MATCHES_TOTAL, "Total number of future matches found");
        let _ = writeln!(out, "{} {}", MATCHES_TOTAL, state.matches_count);

        out
    }
}

fn header(out: &mut String, name: &str, help: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} gauge", name);
}

fn escape_label(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}
