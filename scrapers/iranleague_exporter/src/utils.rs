use deunicode::deunicode;
use scraper::ElementRef;

pub const TEAMS_SEPARATOR: &str = " vs ";

/// Text of an element with every text node trimmed, then concatenated.
pub fn cell_text(element: &ElementRef) -> String {
    element.text().map(str::trim).collect::<String>()
}

/// Builds the canonical `"{home} vs {away}"` label.
pub fn team_pair(home: &str, away: &str) -> String {
    format!("{}{}{}", home.trim(), TEAMS_SEPARATOR, away.trim())
}

/// ASCII slug that keeps the original casing.
///
/// Non-ASCII text is transliterated first, so Persian names still produce
/// distinct labels. ASCII letters and digits are kept and every other run of
/// characters (quotes included) collapses into a single `-`. Leading and
/// trailing hyphens are removed.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_hyphen = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Slugifies each side of a team-pair label, keeping the separator intact.
pub fn slugify_team_pair(home: &str, away: &str) -> String {
    team_pair(&slugify(home), &slugify(away))
}
