//! Event extraction: one event per filing, chosen by keyword priority
//! among quarterly results, merger, acquisition and restructuring language,
//! falling back to a generic filing event when none match.

use once_cell::sync::Lazy;
use orion_core::{Event, EventType};
use regex::Regex;

const DESCRIPTION_MAX_CHARS: usize = 500;

static QUARTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)Q([1-4])\s*(\d{4})").unwrap());
static MERGER_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(merger|combination)\s+(?:of|between)\s+([A-Z][A-Za-z\s&.]+)").unwrap());
static ACQUISITION_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:acquired|acquisition)\s+(?:of|by)?\s*([A-Z][A-Za-z\s&.]+(?:PLC|Ltd|Inc|Corp|LLC)?)").unwrap()
});

/// Priority-ordered: the first trigger word present anywhere in the body
/// wins. Mirrors the single-event-per-filing behavior of the source, which
/// matches on lowercased substrings rather than whole-word patterns.
fn classify_event(accession: &str, body: &str) -> (EventType, String) {
    let lower = body.to_lowercase();

    if lower.contains("quarterly") || lower.contains("q1") || lower.contains("q2") || lower.contains("q3") || lower.contains("q4") {
        let title = match QUARTER_RE.captures(body) {
            Some(caps) => format!("Q{} {} Results", &caps[1], &caps[2]),
            None => format!("6-K Filing {accession}"),
        };
        (EventType::FinancialResults, title)
    } else if lower.contains("merger") || lower.contains("combine") {
        let title = match MERGER_TITLE_RE.captures(body) {
            Some(caps) => format!("{} - {}", &caps[1], caps[2].trim()),
            None => format!("6-K Filing {accession}"),
        };
        (EventType::Merger, title)
    } else if lower.contains("acquisition") || lower.contains("acquired") {
        let title = match ACQUISITION_TITLE_RE.captures(body) {
            Some(caps) => format!("Acquisition of {}", caps[1].trim()),
            None => "Corporate Acquisition".to_string(),
        };
        (EventType::Acquisition, title)
    } else if lower.contains("restructuring") || lower.contains("legal structure") {
        (EventType::Restructuring, "Corporate Restructuring".to_string())
    } else {
        (EventType::Filing, format!("6-K Filing {accession}"))
    }
}

fn truncated_description(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= DESCRIPTION_MAX_CHARS {
        trimmed.to_string()
    } else {
        trimmed.chars().take(DESCRIPTION_MAX_CHARS).collect()
    }
}

/// Build the single event this filing represents.
pub fn extract_event(accession: &str, filing_date: &str, body: &str) -> Event {
    let (event_type, title) = classify_event(accession, body);
    Event {
        id: Event::make_id(accession, event_type),
        event_type,
        title,
        date: filing_date.to_string(),
        filing_id: accession.to_string(),
        description: truncated_description(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_financial_results_over_generic_filing() {
        let event = extract_event("0001-23-000001", "2023-05-01", "We report our quarterly results today.");
        assert_eq!(event.event_type, EventType::FinancialResults);
    }

    #[test]
    fn captures_quarter_and_year_into_title() {
        let event = extract_event("0001-23-000001", "2009-10-15", "Our Q3 2009 Results are attached as an exhibit.");
        assert_eq!(event.event_type, EventType::FinancialResults);
        assert_eq!(event.title, "Q3 2009 Results");
    }

    #[test]
    fn merger_takes_priority_over_acquisition_mention() {
        let body = "The merger agreement also follows our earlier acquisition of a subsidiary.";
        let event = extract_event("0001-23-000002", "2023-06-01", body);
        assert_eq!(event.event_type, EventType::Merger);
    }

    #[test]
    fn merger_title_captures_counterparty_name() {
        let body = "This filing describes the merger of Acme Corp and Widgets Inc.";
        let event = extract_event("0001-23-000002", "2023-06-01", body);
        assert_eq!(event.title, "merger - Acme Corp and Widgets Inc.");
    }

    #[test]
    fn defaults_to_filing_event_when_no_keywords_present() {
        let event = extract_event("0001-23-000003", "2023-07-01", "Routine disclosure with no notable events.");
        assert_eq!(event.event_type, EventType::Filing);
    }

    #[test]
    fn event_id_is_deterministic_for_same_inputs() {
        let a = extract_event("0001-23-000004", "2023-08-01", "restructuring plan announced");
        let b = extract_event("0001-23-000004", "2023-08-01", "restructuring plan announced");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn description_is_truncated_to_max_chars() {
        let long_body = "x".repeat(900);
        let event = extract_event("0001-23-000005", "2023-09-01", &long_body);
        assert_eq!(event.description.chars().count(), DESCRIPTION_MAX_CHARS);
    }
}
