//! Deterministic markdown pieces of the report.
//!
//! Everything here is a pure function of its input. The synthesizer decides
//! which pieces to emit and in what order.

use crate::types::{Availability, MedicineName, MedicineRecord};

const NO_DESCRIPTION: &str = "No description was found in the collected sources.";
const NO_DURATION: &str =
    "Not stated by the collected sources. Follow the duration written on your prescription.";

pub fn header(title: &str, names: &[MedicineName]) -> String {
    let mut out = format!("# {title}\n\n");
    if names.is_empty() {
        out.push_str("_No medicines were detected on this prescription._\n\n");
    } else {
        let listed: Vec<&str> = names.iter().map(MedicineName::as_str).collect();
        out.push_str(&format!(
            "_Detected {} medicine{}: {}_\n\n",
            names.len(),
            if names.len() == 1 { "" } else { "s" },
            listed.join(", ")
        ));
    }
    out
}

pub fn block_heading(record: &MedicineRecord) -> String {
    format!("## {}\n\n", record.name)
}

/// Body of a block whose lookup failed.
pub fn failed_block(reason: &str) -> String {
    format!("> **Could not retrieve details.** {reason}\n\n")
}

/// Description and Typical Duration, straight from the record.
pub fn prose(record: &MedicineRecord) -> String {
    let description = non_empty_or(&record.description, NO_DESCRIPTION);
    let duration = non_empty_or(&record.dosage, NO_DURATION);
    format!("**Description:** {description}\n\n**Typical Duration:** {duration}\n\n")
}

/// Price, availability and links.
pub fn facts(record: &MedicineRecord) -> String {
    let price = record.price.as_deref().unwrap_or("Not found");
    let availability = match record.availability {
        Availability::Available => "In stock",
        Availability::Unavailable => "Out of stock",
        Availability::Unknown => "Unknown",
    };

    let mut out = format!(
        "**Price Information:** {price}\n\n**Availability:** {availability}\n\n"
    );
    match record.sources.as_slice() {
        [] => out.push_str("**Purchase Link:** Not found\n\n"),
        [only] => out.push_str(&format!("**Purchase Link:** <{only}>\n\n")),
        many => {
            out.push_str("**Purchase Links:**\n\n");
            for url in many {
                out.push_str(&format!("- <{url}>\n"));
            }
            out.push('\n');
        }
    }
    out
}

/// Shown when generated prose was cut off or could not be produced.
pub fn fallback_note(reason: &str) -> String {
    format!("\n\n_Summary generation stopped ({reason}); showing the collected details instead._\n\n")
}

pub fn footer(disclaimer: &str) -> String {
    format!("---\n\n{}\n", disclaimer.trim_end())
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}
