//! Person extraction: a fixed ordered family of regex patterns, each
//! tagged with a role classification, iterated once per filing body. Kept
//! as separate records rather than a single mega-regex — readability and
//! test surface outweigh the minor perf gain of fusing them.

use once_cell::sync::Lazy;
use orion_core::{Person, Role};
use regex::Regex;

const NAME: &str = r"[A-Z][a-z]+(?:\s+[A-Z]\.?)?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?";

static SIGNATORY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)By\s*/\s*s\s*/\s*({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)Signed:\s*({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)Signature:\s*({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)Authorised\s+Signatory[:\s]+({NAME})")).unwrap(),
    ]
});

static DIRECTOR_PATTERNS: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(&format!(r"(?i)({NAME})\s*,\s*([^,\n]*Director[^,\n]*)")).unwrap(),
            true,
        ),
        (
            Regex::new(&format!(r"(?i)({NAME})\s*\(([^)]*Director[^)]*)\)")).unwrap(),
            true,
        ),
        (
            Regex::new(&format!(r"(?i)({NAME})\s*-\s*([^-\n]*Director[^-\n]*)")).unwrap(),
            true,
        ),
        (
            Regex::new(&format!(r"(?i)Board\s+of\s+Directors[:\s]+({NAME})")).unwrap(),
            false,
        ),
    ]
});

static CEO_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(r"(?i)Chief Executive Officer[:\s]+({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)CEO[:\s]+({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)({NAME}),\s*Chief Executive")).unwrap(),
        Regex::new(&format!(r"(?i)({NAME}),\s*CEO")).unwrap(),
        Regex::new(&format!(r"(?i)Chief Executive[:\s]+({NAME})")).unwrap(),
        Regex::new(&format!(r"(?i)Executive Officer[:\s]+({NAME})")).unwrap(),
    ]
});

static OFFICER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(&format!(
            r"(?i)({NAME})\s*,\s*([^,\n]*(?:Chief|President|Vice|Senior|Executive)\s+[^,\n]*Officer[^,\n]*)"
        ))
        .unwrap(),
        Regex::new(&format!(r"(?i)({NAME})\s*\(([^)]*Officer[^)]*)\)")).unwrap(),
        Regex::new(&format!(
            r"(?i)({NAME})\s*-\s*([^-\n]*(?:Chief|President|Vice|Senior|Executive)\s+[^-\n]*Officer[^-\n]*)"
        ))
        .unwrap(),
    ]
});

static CONTACT_PATTERNS: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(&format!(r"(?i)Contact[:\s]+({NAME})\s*[,\-]\s*([^,\n]+)")).unwrap(),
            true,
        ),
        (
            Regex::new(&format!(
                r"(?i)({NAME})\s*[,\-]\s*([^,\n]*(?:Contact|Investor Relations|IR)[^,\n]*)"
            ))
            .unwrap(),
            true,
        ),
        (
            Regex::new(&format!(r"(?i)Communications\s+Director[:\s]+({NAME})")).unwrap(),
            false,
        ),
    ]
});

const NAME_STOP_LIST: &[&str] = &[
    "authorised signatory",
    "signatory",
    "company",
    "corporation",
    "incorporated",
    "limited",
    "plc",
    "ltd",
    "inc",
    "corp",
    "bank account",
    "account openings",
    "adult bank",
    "branded adult",
    "000s",
    "000",
    "million",
    "thousand",
    "united states",
    "securities",
    "exchange",
    "commission",
    "form 6-k",
    "report of",
    "foreign private",
    "issuer",
    "pursuant to",
    "section 13a",
    "securities exchange act",
];

const TITLE_STOP_LIST: &[&str] = &[
    "000s", "000", "million", "thousand", "hundred", "percent", "%", "usd", "eur", "gbp", "cad", "q1", "q2", "q3",
    "q4", "quarter", "year", "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

const TITLE_KEYWORDS: &[&str] = &[
    "director", "officer", "executive", "president", "vice", "chief", "manager", "secretary", "treasurer",
    "chairman", "ceo", "cfo", "coo", "cto", "cmo", "head", "lead", "senior", "junior", "assistant", "deputy",
    "general",
];

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{3,}").unwrap());
static LEADING_DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+").unwrap());

/// 2-4 tokens, each leading-uppercase and mostly alphabetic, no ≥3-digit
/// numeric runs, not in the stop list.
pub fn is_valid_person_name(name: &str) -> bool {
    if name.len() < 3 {
        return false;
    }
    let lower = name.to_lowercase();
    if NAME_STOP_LIST.iter().any(|fp| lower.contains(fp)) {
        return false;
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    if !(2..=4).contains(&words.len()) {
        return false;
    }

    for word in &words {
        let Some(first) = word.chars().next() else { return false };
        if !first.is_uppercase() {
            return false;
        }
        let letters_only: String = word.chars().filter(|c| c.is_ascii_alphabetic()).collect();
        if letters_only.len() < 2 {
            return false;
        }
        let non_letter_count = word.chars().filter(|c| !c.is_ascii_alphabetic()).count();
        if non_letter_count as f64 > word.len() as f64 * 0.3 {
            return false;
        }
    }

    if DIGIT_RUN_RE.is_match(name) {
        return false;
    }

    true
}

/// Reject pure numbers/units; require a title keyword unless ≥10 chars.
pub fn is_valid_title(title: &str) -> bool {
    if title.len() < 3 {
        return false;
    }
    let lower = title.to_lowercase();
    if TITLE_STOP_LIST.iter().any(|fp| lower.contains(fp)) {
        return false;
    }
    if LEADING_DIGITS_RE.is_match(title) || DIGIT_RUN_RE.is_match(title) {
        return false;
    }

    let has_keyword = TITLE_KEYWORDS.iter().any(|kw| lower.contains(kw));
    if title.len() < 10 && !has_keyword {
        return false;
    }

    true
}

fn normalize_name(name: &str) -> String {
    static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    WHITESPACE_RE.replace_all(name.trim(), " ").to_string()
}

/// Classify a free-text title into a `Role`, mirroring the teacher's
/// `_classify_role` keyword-priority chain.
pub fn classify_role(title: &str) -> Role {
    let lower = title.to_lowercase();
    if lower.contains("chief executive") || lower.contains("ceo") {
        Role::Ceo
    } else if lower.contains("director") {
        Role::Director
    } else if lower.contains("officer") {
        Role::Officer
    } else if lower.contains("signatory") {
        Role::Signatory
    } else if lower.contains("contact") || lower.contains("relations") {
        Role::Contact
    } else {
        Role::Executive
    }
}

/// Run every pattern family against the filing body, validate, classify,
/// and deduplicate by case-folded name (first occurrence wins).
pub fn extract_people(body: &str) -> Vec<Person> {
    let mut people = Vec::new();

    for pattern in SIGNATORY_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let Some(name) = caps.get(1) else { continue };
            let name = normalize_name(name.as_str());
            if is_valid_person_name(&name) {
                people.push(Person {
                    name,
                    title: "Authorised Signatory".to_string(),
                    role: Role::Signatory,
                });
            }
        }
    }

    for (pattern, has_title_group) in DIRECTOR_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let Some(name) = caps.get(1) else { continue };
            let name = normalize_name(name.as_str());
            let title = if *has_title_group {
                caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_else(|| "Director".to_string())
            } else {
                "Director".to_string()
            };
            let title_ok = !has_title_group || is_valid_title(&title);
            if is_valid_person_name(&name) && title_ok {
                people.push(Person { name, title, role: Role::Director });
            }
        }
    }

    for pattern in CEO_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let Some(name) = caps.get(1) else { continue };
            let name = normalize_name(name.as_str());
            if is_valid_person_name(&name) {
                people.push(Person {
                    name,
                    title: "Chief Executive Officer".to_string(),
                    role: Role::Ceo,
                });
            }
        }
    }

    for pattern in OFFICER_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let (Some(name), Some(title)) = (caps.get(1), caps.get(2)) else { continue };
            let name = normalize_name(name.as_str());
            let title = title.as_str().trim().to_string();
            if is_valid_person_name(&name) && is_valid_title(&title) {
                let role = classify_role(&title);
                people.push(Person { name, title, role });
            }
        }
    }

    for (pattern, has_title_group) in CONTACT_PATTERNS.iter() {
        for caps in pattern.captures_iter(body) {
            let Some(name) = caps.get(1) else { continue };
            let name = normalize_name(name.as_str());
            let title = if *has_title_group {
                caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_else(|| "Contact".to_string())
            } else {
                "Communications Director".to_string()
            };
            let title_ok = !has_title_group || is_valid_title(&title);
            if is_valid_person_name(&name) && title_ok {
                people.push(Person { name, title, role: Role::Contact });
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    people.retain(|p| seen.insert(p.dedup_key()));
    people
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_signatory_from_by_s_pattern() {
        let people = extract_people("By /s/ Jane A. Doe, duly authorized.");
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].name, "Jane A. Doe");
        assert_eq!(people[0].role, Role::Signatory);
        assert_eq!(people[0].title, "Authorised Signatory");
    }

    #[test]
    fn extracts_director_with_comma_form() {
        let people = extract_people("John Smith, Director of the company");
        assert!(people.iter().any(|p| p.name == "John Smith" && p.role == Role::Director));
    }

    #[test]
    fn extracts_ceo_from_colon_pattern() {
        let people = extract_people("Chief Executive Officer: Mark Anthony Price");
        assert!(people.iter().any(|p| p.role == Role::Ceo));
    }

    #[test]
    fn dedupes_duplicate_name_within_filing() {
        let body = "By /s/ Jane A. Doe\nJane A. Doe, Director of finance";
        let people = extract_people(body);
        let jane_count = people.iter().filter(|p| p.name == "Jane A. Doe").count();
        assert_eq!(jane_count, 1);
    }

    #[test]
    fn rejects_stop_list_names() {
        assert!(!is_valid_person_name("Securities Exchange Commission"));
        assert!(!is_valid_person_name("Form 6-K Report"));
    }

    #[test]
    fn rejects_names_with_long_digit_runs() {
        assert!(!is_valid_person_name("John 12345"));
    }

    #[test]
    fn title_keyword_required_when_short() {
        assert!(!is_valid_title("abc"));
        assert!(is_valid_title("CEO"));
        assert!(is_valid_title("A very long descriptive title text"));
    }

    #[test]
    fn classify_role_follows_keyword_priority() {
        assert_eq!(classify_role("Chief Executive Officer"), Role::Ceo);
        assert_eq!(classify_role("Executive Director"), Role::Director);
        assert_eq!(classify_role("Chief Financial Officer"), Role::Officer);
        assert_eq!(classify_role("Investor Relations"), Role::Contact);
        assert_eq!(classify_role("Something Else"), Role::Executive);
    }
}
