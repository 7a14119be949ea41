//! Parse free-text model output into structured advice.

use chrono::{DateTime, Utc};

use crate::farm::AdviceResult;

/// Confidence reported for parsed model output.
pub const DEFAULT_CONFIDENCE: u8 = 85;

#[derive(Clone, Copy)]
enum Section {
    Planting,
    Irrigation,
    Harvest,
    Market,
    General,
}

/// Heading keywords, checked in this order for each line.
const SECTION_KEYWORDS: &[(&str, Section)] = &[
    ("plant", Section::Planting),
    ("irrigat", Section::Irrigation),
    ("harvest", Section::Harvest),
    ("market", Section::Market),
    ("general", Section::General),
];

/// Default sentences used for sections the model left out.
pub fn default_advice(crops_display: &str, generated_at: DateTime<Utc>) -> AdviceResult {
    AdviceResult {
        planting: "Based on current conditions, follow optimal planting schedules for your crops."
            .to_string(),
        irrigation: "Monitor soil moisture and adjust irrigation based on weather conditions."
            .to_string(),
        harvest: format!(
            "Your {crops_display} crops should be ready for harvest based on growth conditions."
        ),
        market: "Monitor market trends and prices for optimal selling timing.".to_string(),
        general: "Continue monitoring your crops regularly and maintain proper farming practices."
            .to_string(),
        confidence: DEFAULT_CONFIDENCE,
        generated_at,
    }
}

/// Extract the five advice sections from model text.
///
/// A heading line is one that mentions a section keyword and either
/// contains a colon or starts with a list marker. Its content is the text
/// after the colon, or the next non-empty line when that is blank. The
/// first heading for each section wins.
pub fn parse_advice_text(
    text: &str,
    crops_display: &str,
    generated_at: DateTime<Utc>,
) -> AdviceResult {
    let mut advice = default_advice(crops_display, generated_at);
    let mut seen = [false; 5];
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    for (i, line) in lines.iter().enumerate() {
        if !looks_like_heading(line) {
            continue;
        }
        let Some(section) = section_of(line) else {
            continue;
        };
        if seen[section as usize] {
            continue;
        }

        let inline = line
            .split_once(':')
            .map(|(_, rest)| clean(rest))
            .unwrap_or_default();
        let content = if inline.is_empty() {
            lines[i + 1..]
                .iter()
                .find(|l| !l.is_empty())
                .map(|l| clean(l))
                .unwrap_or_default()
        } else {
            inline
        };
        if content.is_empty() {
            continue;
        }

        seen[section as usize] = true;
        let slot = match section {
            Section::Planting => &mut advice.planting,
            Section::Irrigation => &mut advice.irrigation,
            Section::Harvest => &mut advice.harvest,
            Section::Market => &mut advice.market,
            Section::General => &mut advice.general,
        };
        *slot = content;
    }

    advice
}

/// Section named by a heading line. With a colon only the label before it
/// counts, so body text mentioning "plants" or "market" is not a heading.
fn section_of(line: &str) -> Option<Section> {
    let label = match line.split_once(':') {
        Some((label, _)) => label,
        None => line,
    };
    let label = label.to_lowercase();
    SECTION_KEYWORDS
        .iter()
        .find(|(keyword, _)| label.contains(keyword))
        .map(|(_, section)| *section)
}

fn looks_like_heading(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    line.contains(':')
        || line.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '*' | '#' | '-'))
}

/// Strip list markers and markdown emphasis.
fn clean(s: &str) -> String {
    s.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '#'))
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_string()
}
