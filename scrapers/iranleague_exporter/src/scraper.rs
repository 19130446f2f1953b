use chrono::FixedOffset;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::{
    jalali,
    types::{Language, Match},
    utils::{cell_text, slugify_team_pair, team_pair},
};

/// Score cell content of a fixture that has not been played yet.
pub const UNPLAYED_SCORE: &str = "-";
pub const MIN_ROW_CELLS: usize = 7;

const HOME_COLUMN: usize = 0;
const SCORE_COLUMN: usize = 1;
const AWAY_COLUMN: usize = 2;
const DATE_COLUMN: usize = 3;
const TIME_COLUMN: usize = 4;

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// One `<tr>` of a week's fixtures table, before filtering.
#[derive(Debug)]
struct RawRow {
    home: String,
    score: String,
    away: String,
    date: String,
    time: String,
}

impl RawRow {
    fn from_element(row: &ElementRef, cell_selector: &Selector) -> Option<Self> {
        let cells: Vec<_> = row.select(cell_selector).collect();
        if cells.len() < MIN_ROW_CELLS {
            return None;
        }

        Some(Self {
            home: cell_text(&cells[HOME_COLUMN]),
            score: cell_text(&cells[SCORE_COLUMN]),
            away: cell_text(&cells[AWAY_COLUMN]),
            date: cell_text(&cells[DATE_COLUMN]),
            time: cell_text(&cells[TIME_COLUMN]),
        })
    }

    fn is_upcoming(&self) -> bool {
        self.score == UNPLAYED_SCORE
    }
}

/// Extracts upcoming fixtures from the league's match-schedule page.
///
/// The page is a sequence of week blocks (`<div class="row">`), each holding
/// a label `<div>` followed by a `<div>` that wraps the fixtures table.
/// Structural problems never fail the parse; they only mean fewer matches.
pub struct ScheduleParser {
    lang: Language,
    offset: FixedOffset,
    week_selector: Selector,
    table_selector: Selector,
    body_selector: Selector,
    row_selector: Selector,
    cell_selector: Selector,
}

impl ScheduleParser {
    pub fn new(lang: Language, offset: FixedOffset) -> Self {
        Self {
            lang,
            offset,
            week_selector: selector(r#"div[class="row"]"#),
            table_selector: selector("table"),
            body_selector: selector("tbody"),
            row_selector: selector("tr"),
            cell_selector: selector("td"),
        }
    }

    pub fn lang(&self) -> Language {
        self.lang
    }

    pub fn parse(&self, html: &str) -> Vec<Match> {
        if html.trim().is_empty() {
            warn!("Received empty HTML content");
            return Vec::new();
        }

        let document = Html::parse_document(html);
        let weeks: Vec<_> = document.select(&self.week_selector).collect();
        debug!("Found {} weeks", weeks.len());

        let mut matches = Vec::new();
        for (index, week) in weeks.iter().enumerate() {
            let week_number = index + 1;
            let Some(rows) = self.week_rows(week, week_number) else {
                continue;
            };

            debug!("Found {} rows in week {}", rows.len(), week_number);
            for row in rows {
                if let Some(m) = self.parse_row(&row) {
                    debug!(teams = %m.teams, kickoff = m.kickoff, "Processed match");
                    matches.push(m);
                }
            }
        }

        info!("Found {} future matches", matches.len());
        matches
    }

    fn week_rows<'a>(&self, week: &ElementRef<'a>, week_number: usize) -> Option<Vec<ElementRef<'a>>> {
        let blocks: Vec<_> = week
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "div")
            .collect();

        let Some(fixtures) = blocks.get(1) else {
            debug!("Week {} has no fixtures block, skipping", week_number);
            return None;
        };
        let Some(table) = fixtures.select(&self.table_selector).next() else {
            debug!("Week {} has no fixtures table, skipping", week_number);
            return None;
        };
        let Some(body) = table.select(&self.body_selector).next() else {
            debug!("Week {} table has no body, skipping", week_number);
            return None;
        };

        Some(body.select(&self.row_selector).collect())
    }

    fn parse_row(&self, row: &ElementRef) -> Option<Match> {
        let raw = RawRow::from_element(row, &self.cell_selector)?;
        if !raw.is_upcoming() {
            return None;
        }

        let teams = match self.lang {
            Language::Fa => team_pair(&raw.home, &raw.away),
            Language::En => slugify_team_pair(&raw.home, &raw.away),
        };

        match jalali::to_timestamp(&raw.date, &raw.time, self.offset) {
            Ok(kickoff) => Some(Match { teams, kickoff }),
            Err(e) => {
                warn!(teams = %teams, "Failed to parse match date/time: {}", e);
                None
            }
        }
    }
}

pub fn parse_schedule(html: &str, lang: Language, offset: FixedOffset) -> Vec<Match> {
    ScheduleParser::new(lang, offset).parse(html)
}
