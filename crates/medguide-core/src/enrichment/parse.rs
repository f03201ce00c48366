//! Search results to medicine record fields.
//!
//! Scraped pharmacy pages are semi-structured at best. Fields are pulled out
//! with keyword and pattern matching; anything that cannot be found is left
//! empty and noted. Parsing is a pure function of its input.

use crate::search::SearchHit;
use crate::types::{Availability, MedicineName, MedicineRecord, Outcome, ParseOutcome};
use regex::Regex;
use std::sync::LazyLock;

const MAX_DESCRIPTION_CHARS: usize = 300;
const MAX_DOSAGE_LINES: usize = 3;
const MAX_DOSAGE_LINE_CHARS: usize = 200;
const MAX_DETAILS_CHARS: usize = 6000;

const UNAVAILABLE_MARKERS: &[&str] = &[
    "out of stock",
    "currently unavailable",
    "not available",
    "unavailable",
    "sold out",
    "discontinued",
];

const AVAILABLE_MARKERS: &[&str] = &["in stock", "add to cart", "buy now", "available"];

const DOSAGE_MARKERS: &[&str] = &[
    "dosage",
    "dose",
    "duration",
    "times a day",
    "once daily",
    "twice daily",
    "once a day",
    "twice a day",
    "for days",
    "take ",
];

/// Symbol or currency code followed by an amount. Letter codes must start a
/// word so "years 2" is not read as "rs 2".
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:₹|\$|€|£|\b(?:rs\.?|inr|usd|eur|gbp))\s?\d[\d,]*(?:\.\d{1,2})?")
        .expect("valid regex")
});

/// Build a record for `name` from search candidates.
///
/// Returns `Unparseable` when no candidate is well formed; the caller turns
/// that into a failed record.
pub fn parse_hits(name: &MedicineName, hits: &[SearchHit]) -> ParseOutcome<MedicineRecord> {
    if hits.is_empty() {
        return ParseOutcome::Unparseable("no search results".to_string());
    }

    let usable: Vec<&SearchHit> = hits.iter().filter(|h| h.is_well_formed()).collect();
    let Some(primary) = usable.first().copied() else {
        return ParseOutcome::Unparseable(format!(
            "none of {} search results had a usable page",
            hits.len()
        ));
    };

    let mut warnings = Vec::new();
    if usable.len() < hits.len() {
        warnings.push(format!(
            "ignored {} malformed search results",
            hits.len() - usable.len()
        ));
    }

    let description = extract_description(primary);
    let dosage = extract_dosage(&primary.markdown);
    let price = extract_price(primary);
    let availability = extract_availability(primary);

    if description.is_empty() {
        warnings.push("description not found".to_string());
    }
    if price.is_none() {
        warnings.push("price not found".to_string());
    }
    if availability == Availability::Unknown {
        warnings.push("availability not found".to_string());
    }

    let mut sources: Vec<String> = Vec::with_capacity(usable.len());
    for hit in &usable {
        let url = hit.url.trim().to_string();
        if !sources.contains(&url) {
            sources.push(url);
        }
    }

    let outcome = if price.is_none() || availability == Availability::Unknown {
        Outcome::Partial
    } else {
        Outcome::Success
    };

    let record = MedicineRecord {
        name: name.clone(),
        description,
        dosage,
        price,
        availability,
        sources,
        details: truncate_chars(primary.markdown.trim(), MAX_DETAILS_CHARS),
        warnings: warnings.clone(),
        outcome,
    };

    if warnings.is_empty() {
        ParseOutcome::Full(record)
    } else {
        ParseOutcome::Partial {
            value: record,
            warnings,
        }
    }
}

fn extract_description(hit: &SearchHit) -> String {
    let from_snippet = hit.description.trim();
    if !from_snippet.is_empty() {
        return truncate_chars(from_snippet, MAX_DESCRIPTION_CHARS);
    }
    hit.markdown
        .split("\n\n")
        .map(str::trim)
        .find(|para| is_prose(para))
        .map(|para| truncate_chars(&collapse_whitespace(para), MAX_DESCRIPTION_CHARS))
        .unwrap_or_default()
}

/// A paragraph of running text, not a heading, image, link row, table or list.
fn is_prose(para: &str) -> bool {
    para.chars().count() >= 40
        && !para.starts_with(['#', '!', '[', '|', '-', '*', '>'])
        && para.split_whitespace().count() >= 6
}

fn extract_dosage(markdown: &str) -> String {
    markdown
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .map(clean_markdown_line)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let lower = line.to_lowercase();
            DOSAGE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .take(MAX_DOSAGE_LINES)
        .map(|line| truncate_chars(&line, MAX_DOSAGE_LINE_CHARS))
        .collect::<Vec<_>>()
        .join(" ")
}

fn extract_price(hit: &SearchHit) -> Option<String> {
    [hit.markdown.as_str(), hit.description.as_str()]
        .iter()
        .find_map(|text| PRICE_RE.find(text))
        .map(|m| collapse_whitespace(m.as_str()))
}

fn extract_availability(hit: &SearchHit) -> Availability {
    let text = format!("{}\n{}", hit.description, hit.markdown).to_lowercase();
    if UNAVAILABLE_MARKERS.iter().any(|m| text.contains(m)) {
        Availability::Unavailable
    } else if AVAILABLE_MARKERS.iter().any(|m| text.contains(m)) {
        Availability::Available
    } else {
        Availability::Unknown
    }
}

fn clean_markdown_line(line: &str) -> String {
    let stripped = line
        .trim()
        .trim_start_matches(['#', '-', '*', '>', '|'])
        .replace("**", "")
        .replace('|', " ");
    collapse_whitespace(&stripped)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max).collect();
        out.push('…');
        out
    }
}
