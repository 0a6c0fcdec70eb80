//! C3 — Filing Parser. Turns an on-disk filing text file into a fully (or
//! partially) populated `FilingRecord`. A missing CIK disqualifies the
//! record from downstream use but is never itself an error — this parser
//! never fails, it degrades.

use once_cell::sync::Lazy;
use orion_core::FilingRecord;
use regex::Regex;
use std::path::Path;

const HEADER_BYTES: usize = 10_000;

static COMPANY_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"COMPANY CONFORMED NAME:\s+(.+)").unwrap());
static CIK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CENTRAL INDEX KEY:\s+(\d+)").unwrap());
static SIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"STANDARD INDUSTRIAL CLASSIFICATION:\s+(.+?)\s*\[(\d+)\]").unwrap());
static ACCESSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ACCESSION NUMBER:\s+(.+)").unwrap());
static FILED_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"FILED AS OF DATE:\s+(\d{8})").unwrap());
static FORM_TYPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"FORM TYPE:\s+(.+)").unwrap());
static STREET1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"STREET 1:\s+(.+)").unwrap());
static CITY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CITY:\s+(.+)").unwrap());
static STATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"STATE:\s+(.+)").unwrap());
static ZIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"ZIP:\s+(.+)").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"BUSINESS PHONE:\s+(.+)").unwrap());
static FILE_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"SEC FILE NUMBER:\s+(.+)").unwrap());
static FISCAL_YEAR_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"FISCAL YEAR END:\s+(\d{4})").unwrap());
static PERIOD_OF_REPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CONFORMED PERIOD OF REPORT:\s+(\d{4})").unwrap());
static TEXT_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<TEXT>(.*?)</TEXT>").unwrap());

fn capture1(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack).map(|c| c[1].trim().to_string())
}

/// Read the first 10 KiB and extract header fields by line-anchored
/// label:value pattern match. Missing fields yield empty strings.
fn parse_header(header: &str, record: &mut FilingRecord) {
    if let Some(name) = capture1(&COMPANY_NAME_RE, header) {
        record.company_name = name;
    }
    if let Some(cik) = capture1(&CIK_RE, header) {
        record.cik = orion_core::pad_cik(&cik);
    }
    if let Some(caps) = SIC_RE.captures(header) {
        record.sic_description = caps[1].trim().to_string();
        record.sic_code = caps[2].trim().to_string();
    }
    if let Some(accession) = capture1(&ACCESSION_RE, header) {
        record.accession_number = accession;
    }
    if let Some(raw_date) = capture1(&FILED_DATE_RE, header) {
        record.filing_date = format_yyyymmdd(&raw_date).unwrap_or(raw_date);
    }
    if let Some(form_type) = capture1(&FORM_TYPE_RE, header) {
        record.form_type = form_type;
    }
    if let Some(street1) = capture1(&STREET1_RE, header) {
        record.street1 = street1;
    }
    if let Some(city) = capture1(&CITY_RE, header) {
        record.city = city;
    }
    if let Some(state) = capture1(&STATE_RE, header) {
        record.state = state;
    }
    if let Some(zip) = capture1(&ZIP_RE, header) {
        record.zip = zip;
    }
    if let Some(phone) = capture1(&PHONE_RE, header) {
        record.business_phone = phone;
    }
    if let Some(file_number) = capture1(&FILE_NUMBER_RE, header) {
        record.file_number = file_number;
    }
    if let Some(fiscal_year_end) = capture1(&FISCAL_YEAR_END_RE, header) {
        record.fiscal_year_end = fiscal_year_end;
    }
}

fn format_yyyymmdd(raw: &str) -> Option<String> {
    if raw.len() != 8 {
        return None;
    }
    Some(format!("{}-{}-{}", &raw[0..4], &raw[4..6], &raw[6..8]))
}

/// Read the whole file, derive `year`, and extract the first `<TEXT>` block.
fn parse_body(content: &str, directory_name: &str, record: &mut FilingRecord) {
    record.raw_text = content.to_string();

    record.year = capture1(&PERIOD_OF_REPORT_RE, content)
        .or_else(|| directory_name.chars().all(|c| c.is_ascii_digit()).then(|| directory_name.to_string()))
        .unwrap_or_default();

    if let Some(caps) = TEXT_BLOCK_RE.captures(content) {
        record.html_content = caps[1].to_string();
    }
}

/// Parse a filing's text file into a `FilingRecord`. Decoder errors are
/// ignored — the file is read as best-effort UTF-8 with replacement.
pub fn parse_filing(path: &Path) -> FilingRecord {
    let mut record = FilingRecord::default();

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::info!("could not read filing {:?}: {}", path, e);
            return record;
        }
    };
    let content = String::from_utf8_lossy(&bytes);

    let header_slice_end = content.len().min(HEADER_BYTES);
    let header = &content[..header_slice_end];
    parse_header(header, &mut record);

    let directory_name = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    parse_body(&content, directory_name, &mut record);

    if !orion_core::is_valid_cik(&orion_core::unpad_cik(&record.cik)) && !record.cik.is_empty() {
        tracing::debug!("filing {:?} has a malformed CIK {:?}", path, record.cik);
    }

    record
}

/// List every top-level filing `.txt` file under `filings_dir`, optionally
/// restricted to one year subdirectory. Exhibit files (`EX-99*`) and
/// worker-claimed copies (names containing `_`) are excluded.
pub fn list_filings(filings_dir: &Path, year: Option<i32>) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    if !filings_dir.exists() {
        return out;
    }

    let year_dirs: Vec<std::path::PathBuf> = match year {
        Some(y) => vec![filings_dir.join(y.to_string())],
        None => {
            let mut dirs: Vec<_> = std::fs::read_dir(filings_dir)
                .map(|rd| {
                    rd.filter_map(|e| e.ok())
                        .map(|e| e.path())
                        .filter(|p| p.is_dir())
                        .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.chars().all(|c| c.is_ascii_digit())))
                        .collect()
                })
                .unwrap_or_default();
            dirs.sort();
            dirs
        }
    };

    for dir in year_dirs {
        if !dir.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&dir).max_depth(1).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            if !name.ends_with(".txt") || name.starts_with("EX-99") || name.contains('_') {
                continue;
            }
            out.push(path.to_path_buf());
        }
    }

    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_filing() -> &'static str {
        "COMPANY CONFORMED NAME:\t\tExample Corp\nCENTRAL INDEX KEY:\t\t0000123456\n\
         STANDARD INDUSTRIAL CLASSIFICATION: COMMERCIAL BANKS [6029]\n\
         ACCESSION NUMBER:\t\t0001234567-09-000123\nFILED AS OF DATE:\t\t20090715\n\
         FORM TYPE:\t\t6-K\nSTREET 1:\t\t1 Example Way\nCITY:\t\tLondon\nSTATE:\t\tX0\n\
         ZIP:\t\tEC1 1AA\nBUSINESS PHONE:\t\t011-44-20-1234-5678\nSEC FILE NUMBER:\t\t001-12345\n\
         FISCAL YEAR END:\t\t1231\nCONFORMED PERIOD OF REPORT:\t\t20090930\n\
         <DOCUMENT>\n<TYPE>6-K\n<TEXT>\n<p>By /s/ Jane A. Doe</p>\nQ3 2009 Results\n</TEXT>\n"
    }

    #[test]
    fn parses_all_header_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("0001234567-09-000123.txt");
        std::fs::write(&path, sample_filing()).unwrap();

        let record = parse_filing(&path);
        assert_eq!(record.cik, "0000123456");
        assert_eq!(record.company_name, "Example Corp");
        assert_eq!(record.sic_code, "6029");
        assert_eq!(record.sic_description, "COMMERCIAL BANKS");
        assert_eq!(record.accession_number, "0001234567-09-000123");
        assert_eq!(record.filing_date, "2009-07-15");
        assert_eq!(record.form_type, "6-K");
        assert_eq!(record.street1, "1 Example Way");
        assert_eq!(record.city, "London");
        assert_eq!(record.zip, "EC1 1AA");
        assert_eq!(record.file_number, "001-12345");
        assert_eq!(record.fiscal_year_end, "1231");
        assert!(record.is_usable());
    }

    #[test]
    fn derives_year_from_period_of_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filing.txt");
        std::fs::write(&path, sample_filing()).unwrap();
        let record = parse_filing(&path);
        assert_eq!(record.year, "2009");
    }

    #[test]
    fn falls_back_to_directory_name_for_year() {
        let dir = tempdir().unwrap();
        let year_dir = dir.path().join("2009");
        std::fs::create_dir_all(&year_dir).unwrap();
        let path = year_dir.join("filing.txt");
        let content = sample_filing().replace("CONFORMED PERIOD OF REPORT:\t\t20090930\n", "");
        std::fs::write(&path, content).unwrap();

        let record = parse_filing(&path);
        assert_eq!(record.year, "2009");
    }

    #[test]
    fn extracts_first_text_block_as_html_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filing.txt");
        std::fs::write(&path, sample_filing()).unwrap();
        let record = parse_filing(&path);
        assert!(record.html_content.contains("By /s/ Jane A. Doe"));
        assert!(record.html_content.contains("Q3 2009 Results"));
    }

    #[test]
    fn missing_file_yields_empty_unusable_record() {
        let record = parse_filing(Path::new("/nonexistent/path/filing.txt"));
        assert!(!record.is_usable());
    }

    #[test]
    fn missing_fields_yield_empty_strings_not_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("filing.txt");
        std::fs::write(&path, "COMPANY CONFORMED NAME:\t\tExample Corp\n").unwrap();
        let record = parse_filing(&path);
        assert_eq!(record.company_name, "Example Corp");
        assert_eq!(record.cik, "");
        assert!(!record.is_usable());
    }

    #[test]
    fn list_filings_excludes_exhibits_and_claimed_copies() {
        let dir = tempdir().unwrap();
        let year_dir = dir.path().join("2009");
        std::fs::create_dir_all(&year_dir).unwrap();
        std::fs::write(year_dir.join("0001234567-09-000123.txt"), "x").unwrap();
        std::fs::write(year_dir.join("EX-99.1.txt"), "x").unwrap();
        std::fs::write(year_dir.join("worker1_0001234567-09-000123.txt"), "x").unwrap();

        let filings = list_filings(dir.path(), Some(2009));
        assert_eq!(filings.len(), 1);
        assert!(filings[0].ends_with("0001234567-09-000123.txt"));
    }
}
