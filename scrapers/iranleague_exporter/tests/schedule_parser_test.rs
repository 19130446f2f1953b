use chrono::FixedOffset;
use pretty_assertions::assert_eq;
use std::collections::HashSet;

use iranleague_exporter::{
    config::iran_standard_time,
    scraper::{parse_schedule, ScheduleParser},
    types::{Language, Match},
};

const TWO_WEEKS: &str = include_str!("fixtures/schedule/two_weeks.html");
const PERSIAN: &str = include_str!("fixtures/schedule/persian.html");
const PERSIAN_WEEK: &str = include_str!("fixtures/schedule/persian_week.html");
const MALFORMED: &str = include_str!("fixtures/schedule/malformed.html");

fn m(teams: &str, kickoff: i64) -> Match {
    Match {
        teams: teams.to_string(),
        kickoff,
    }
}

#[test]
fn test_english_labels_across_weeks() {
    let matches = parse_schedule(TWO_WEEKS, Language::En, iran_standard_time());

    assert_eq!(
        matches,
        vec![
            m("Team-A vs Team-B", 1_704_024_000),
            m("Esteghlal vs Persepolis", 1_710_880_200),
        ]
    );
}

#[test]
fn test_persian_labels_keep_raw_names() {
    let matches = parse_schedule(PERSIAN, Language::Fa, iran_standard_time());
    assert_eq!(matches, vec![m("تیم اول vs تیم دوم", 1_704_024_000)]);
}

#[test]
fn test_english_labels_for_persian_names_stay_distinct() {
    let matches = parse_schedule(PERSIAN_WEEK, Language::En, iran_standard_time());
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].kickoff, 1_704_024_000);
    assert_eq!(matches[1].kickoff, 1_704_110_400);

    for fixture in &matches {
        let (home, away) = fixture.teams.split_once(" vs ").unwrap();
        assert!(!home.is_empty() && !away.is_empty(), "empty side in {:?}", fixture.teams);
        assert!(fixture.teams.is_ascii(), "non-ASCII label {:?}", fixture.teams);
    }

    let labels: HashSet<_> = matches.iter().map(|fixture| fixture.teams.as_str()).collect();
    assert_eq!(labels.len(), 2);
}

#[test]
fn test_kickoff_offset_is_configurable() {
    let utc = FixedOffset::east_opt(0).unwrap();
    let matches = parse_schedule(PERSIAN, Language::Fa, utc);
    assert_eq!(matches[0].kickoff, 1_704_036_600);
}

#[test]
fn test_malformed_structure_yields_nothing() {
    let parser = ScheduleParser::new(Language::En, iran_standard_time());
    assert!(parser.parse(MALFORMED).is_empty());
}

#[test]
fn test_empty_and_blank_pages() {
    let parser = ScheduleParser::new(Language::En, iran_standard_time());
    assert!(parser.parse("").is_empty());
    assert!(parser.parse("   \n\t  ").is_empty());
    assert!(parser.parse("<html><body><p>maintenance</p></body></html>").is_empty());
}

#[test]
fn test_parser_is_reusable() {
    let parser = ScheduleParser::new(Language::En, iran_standard_time());
    let first = parser.parse(TWO_WEEKS);
    let second = parser.parse(TWO_WEEKS);
    assert_eq!(first, second);
    assert_eq!(parser.lang(), Language::En);
}
