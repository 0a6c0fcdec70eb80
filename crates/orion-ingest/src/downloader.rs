//! C2 — Rate-Limited Downloader. Given a CIK and a year range, fetches
//! every matching 6-K filing's index page, main text, and EX-99 exhibits,
//! and materializes them on disk in the deterministic layout described by
//! the data model: `<root>/<company>/<year>_<company>_<cik>/<accession>/`.

use crate::ledger::{self, MetadataRow};
use crate::rate_limiter::RateRegulator;
use orion_core::{pad_cik, unpad_cik, AppConfig, OrionError, OrionResult};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

const SUBMISSIONS_URL_TEMPLATE: &str = "https://data.sec.gov/submissions/CIK{cik}.json";
const ARCHIVE_BASE: &str = "https://www.sec.gov/Archives/edgar/data";
const INDEX_TIMEOUT: Duration = Duration::from_secs(30);
const TEXT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CikFilingEntry {
    pub cik: String,
    pub company_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct DownloadStats {
    pub downloaded: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl std::ops::AddAssign for DownloadStats {
    fn add_assign(&mut self, rhs: Self) {
        self.downloaded += rhs.downloaded;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    filings: Filings,
}

#[derive(Debug, Deserialize)]
struct Filings {
    recent: RecentFilings,
}

#[derive(Debug, Deserialize, Default)]
struct RecentFilings {
    #[serde(default)]
    form: Vec<String>,
    #[serde(default, rename = "filingDate")]
    filing_date: Vec<String>,
    #[serde(default, rename = "accessionNumber")]
    accession_number: Vec<String>,
}

pub struct DownloaderConfig {
    pub download_dir: PathBuf,
    pub skip_existing: bool,
    pub max_workers: usize,
    pub start_year: i32,
    pub end_year: i32,
}

pub struct Downloader {
    client: reqwest::Client,
    regulator: RateRegulator,
    user_agent: String,
    metadata_ledger_path: PathBuf,
}

impl Downloader {
    pub fn new(config: &AppConfig, regulator: RateRegulator) -> Self {
        Self {
            client: reqwest::Client::new(),
            regulator,
            user_agent: config.user_agent.clone(),
            metadata_ledger_path: config.metadata_dir().join("fpi_6k_metadata.csv"),
        }
    }

    async fn get_submission_json(&self, cik: &str) -> OrionResult<SubmissionsResponse> {
        let url = SUBMISSIONS_URL_TEMPLATE.replace("{cik}", &pad_cik(cik));
        self.regulator.acquire().await;

        let response = self
            .client
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .timeout(INDEX_TIMEOUT)
            .send()
            .await?;

        let response = if response.status().as_u16() == 429 {
            self.regulator.backoff_429().await;
            self.regulator.acquire().await;
            self.client
                .get(&url)
                .header("User-Agent", &self.user_agent)
                .timeout(INDEX_TIMEOUT)
                .send()
                .await?
        } else {
            response
        };

        if !response.status().is_success() {
            return Err(OrionError::ExternalApi(format!(
                "submissions fetch for CIK {} returned {}",
                cik,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    fn target_folder(download_dir: &Path, company_name: &str, cik: &str, accession: &str, year: &str) -> PathBuf {
        download_dir
            .join(company_name)
            .join(format!("{}_{}_{}", year, company_name, cik))
            .join(accession)
    }

    fn filing_index_url(cik: &str, accession: &str) -> String {
        let acc_nodash = accession.replace('-', "");
        format!(
            "{}/{}/{}/{}-index.html",
            ARCHIVE_BASE,
            unpad_cik(cik),
            acc_nodash,
            accession
        )
    }

    /// Download one filing's index page, main text, and exhibits.
    /// Returns `Ok(None)` for a clean skip (skip-existing short-circuit) and
    /// `Ok(Some(stats_delta))` otherwise.
    pub async fn download_filing(
        &self,
        download_dir: &Path,
        company_name: &str,
        cik: &str,
        accession: &str,
        filing_date: &str,
        skip_existing: bool,
    ) -> OrionResult<bool> {
        let year = filing_date.get(0..4).unwrap_or("0000").to_string();
        let folder = Self::target_folder(download_dir, company_name, cik, accession, &year);
        std::fs::create_dir_all(&folder)?;

        let html_path = folder.join("filing.html");
        let txt_path = folder.join(format!("{}.txt", accession));

        if skip_existing && html_path.exists() && txt_path.exists() {
            debug!("skip-existing: {} already on disk", accession);
            self.append_ledger_row(company_name, cik, filing_date, accession, &html_path, &txt_path, &[])?;
            return Ok(false);
        }

        let index_url = Self::filing_index_url(cik, accession);
        self.regulator.acquire().await;
        let index_response = self
            .client
            .get(&index_url)
            .header("User-Agent", &self.user_agent)
            .timeout(INDEX_TIMEOUT)
            .send()
            .await?;

        let index_response = if index_response.status().as_u16() == 429 {
            self.regulator.backoff_429().await;
            self.regulator.acquire().await;
            self.client
                .get(&index_url)
                .header("User-Agent", &self.user_agent)
                .timeout(INDEX_TIMEOUT)
                .send()
                .await?
        } else {
            index_response
        };

        if !index_response.status().is_success() {
            return Err(OrionError::ExternalApi(format!(
                "filing index fetch for {} returned {}",
                accession,
                index_response.status()
            )));
        }

        let index_html = index_response.text().await?;
        let rewritten = rewrite_relative_links(&index_html);
        stage_then_write(&html_path, rewritten.as_bytes())?;

        let txt_link = find_complete_submission_link(&index_html);

        let mut exhibits = Vec::new();
        if let Some(txt_url) = txt_link {
            self.regulator.acquire().await;
            let txt_response = self
                .client
                .get(&txt_url)
                .header("User-Agent", &self.user_agent)
                .timeout(TEXT_TIMEOUT)
                .send()
                .await?;

            let txt_response = if txt_response.status().as_u16() == 429 {
                self.regulator.backoff_429().await;
                self.regulator.acquire().await;
                self.client
                    .get(&txt_url)
                    .header("User-Agent", &self.user_agent)
                    .timeout(TEXT_TIMEOUT)
                    .send()
                    .await?
            } else {
                txt_response
            };

            if txt_response.status().is_success() {
                let text = txt_response.text().await?;
                stage_then_write(&txt_path, text.as_bytes())?;
                exhibits = extract_exhibits(&text, &folder)?;
            } else {
                warn!("complete submission text fetch for {} returned {}", accession, txt_response.status());
            }
        }

        self.append_ledger_row(company_name, cik, filing_date, accession, &html_path, &txt_path, &exhibits)?;
        Ok(true)
    }

    fn append_ledger_row(
        &self,
        company_name: &str,
        cik: &str,
        filing_date: &str,
        accession: &str,
        html_path: &Path,
        txt_path: &Path,
        exhibits: &[PathBuf],
    ) -> OrionResult<()> {
        let row = MetadataRow {
            company_name: company_name.replace('_', " "),
            cik: pad_cik(cik),
            date: filing_date.to_string(),
            accession: accession.to_string(),
            html_file: html_path.to_string_lossy().to_string(),
            txt_file: txt_path.to_string_lossy().to_string(),
            exhibits: exhibits
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join(";"),
        };
        ledger::append_row(&self.metadata_ledger_path, &row)
    }

    /// Process one CIK end-to-end: fetch its submissions manifest, find
    /// every 6-K in the year range, download each. Errors on an individual
    /// filing are logged and swallowed; the CIK task continues.
    pub async fn process_cik(
        &self,
        entry: &CikFilingEntry,
        download_dir: &Path,
        start_year: i32,
        end_year: i32,
        skip_existing: bool,
        running: &AtomicBool,
    ) -> DownloadStats {
        let mut stats = DownloadStats::default();

        let manifest = match self.get_submission_json(&entry.cik).await {
            Ok(m) => m,
            Err(e) => {
                e.log_with_context(&format!("submissions manifest for CIK {}", entry.cik));
                return stats;
            }
        };

        let recent = manifest.filings.recent;
        for ((form, date), accession) in recent
            .form
            .iter()
            .zip(recent.filing_date.iter())
            .zip(recent.accession_number.iter())
        {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            if form != "6-K" {
                continue;
            }
            let Some(filing_year) = date.get(0..4).and_then(|y| y.parse::<i32>().ok()) else {
                continue;
            };
            if filing_year < start_year || filing_year > end_year {
                continue;
            }

            match self
                .download_filing(download_dir, &entry.company_name, &entry.cik, accession, date, skip_existing)
                .await
            {
                Ok(true) => stats.downloaded += 1,
                Ok(false) => stats.skipped += 1,
                Err(e) => {
                    e.log_with_context(&format!("download {} for CIK {}", accession, entry.cik));
                    stats.failed += 1;
                }
            }
        }

        stats
    }

    /// Fan out over CIKs with a bounded worker pool. Parallelism is over
    /// CIKs, not filings within a CIK — the regulator keeps aggregate QPS
    /// in check regardless of pool size.
    pub async fn download_all(
        self: Arc<Self>,
        entries: Vec<CikFilingEntry>,
        options: DownloaderConfig,
        running: Arc<AtomicBool>,
    ) -> DownloadStats {
        let semaphore = Arc::new(Semaphore::new(options.max_workers.max(1)));
        let mut handles = Vec::new();
        let download_dir = Arc::new(options.download_dir);

        for entry in entries {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            let permit = semaphore.clone().acquire_owned().await.expect("semaphore not closed");
            let downloader = self.clone();
            let download_dir = download_dir.clone();
            let running = running.clone();
            let start_year = options.start_year;
            let end_year = options.end_year;
            let skip_existing = options.skip_existing;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                downloader
                    .process_cik(&entry, &download_dir, start_year, end_year, skip_existing, &running)
                    .await
            }));
        }

        let mut total = DownloadStats::default();
        for handle in handles {
            if let Ok(stats) = handle.await {
                total += stats;
            }
        }
        info!(
            "download pass complete: {} downloaded, {} skipped, {} failed",
            total.downloaded, total.skipped, total.failed
        );
        total
    }
}

fn stage_then_write(path: &Path, bytes: &[u8]) -> OrionResult<()> {
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn rewrite_relative_links(html: &str) -> String {
    static ATTR_RE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r#"(?i)(href|src)="(/[^"]*)""#).unwrap()
    });
    ATTR_RE
        .replace_all(html, |caps: &regex::Captures| {
            format!(r#"{}="https://www.sec.gov{}""#, &caps[1], &caps[2])
        })
        .into_owned()
}

fn find_complete_submission_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("tr").ok()?;
    let cell_selector = Selector::parse("td").ok()?;
    let link_selector = Selector::parse("a").ok()?;

    for row in document.select(&row_selector) {
        let cells: Vec<_> = row.select(&cell_selector).collect();
        if cells.len() < 3 {
            continue;
        }
        let label = cells[1].text().collect::<String>();
        if label.contains("Complete submission text file") {
            if let Some(link) = cells[2].select(&link_selector).next() {
                if let Some(href) = link.value().attr("href") {
                    return Some(if href.starts_with('/') {
                        format!("https://www.sec.gov{}", href)
                    } else {
                        href.to_string()
                    });
                }
            }
        }
    }
    None
}

/// Split a filing's complete-submission text on `<DOCUMENT>` boundaries and
/// persist every `EX-99*` section as its own stripped-text file, suffixing
/// collisions `_1`, `_2`, ...
fn extract_exhibits(text: &str, folder: &Path) -> OrionResult<Vec<PathBuf>> {
    static TYPE_RE: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"(?i)<TYPE>([^\r\n]+)").unwrap());
    static TEXT_RE: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"(?is)<TEXT>(.*?)</TEXT>").unwrap());
    static TAG_RE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

    let mut saved = Vec::new();
    let mut counters: std::collections::HashMap<String, u32> = std::collections::HashMap::new();

    for doc in text.split("<DOCUMENT>") {
        let Some(type_caps) = TYPE_RE.captures(doc) else { continue };
        let doctype = type_caps[1].trim().to_uppercase();
        if !doctype.starts_with("EX-99") {
            continue;
        }
        let Some(text_caps) = TEXT_RE.captures(doc) else { continue };
        let raw_html = &text_caps[1];
        let clean_text = TAG_RE.replace_all(raw_html, "\n");
        let clean_text = clean_text.trim();

        let filename = match counters.get_mut(&doctype) {
            Some(count) => {
                *count += 1;
                format!("{}_{}.txt", doctype, count)
            }
            None => {
                counters.insert(doctype.clone(), 0);
                format!("{}.txt", doctype)
            }
        };

        let exhibit_path = folder.join(filename);
        stage_then_write(&exhibit_path, clean_text.as_bytes())?;
        saved.push(exhibit_path);
    }

    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn filing_index_url_matches_archive_layout() {
        let url = Downloader::filing_index_url("0000320193", "0000320193-23-000006");
        assert_eq!(
            url,
            "https://www.sec.gov/Archives/edgar/data/320193/000032019323000006/0000320193-23-000006-index.html"
        );
    }

    #[test]
    fn rewrites_root_relative_links() {
        let html = r#"<a href="/cgi-bin/browse">link</a><img src="/icon.png">"#;
        let rewritten = rewrite_relative_links(html);
        assert!(rewritten.contains(r#"href="https://www.sec.gov/cgi-bin/browse""#));
        assert!(rewritten.contains(r#"src="https://www.sec.gov/icon.png""#));
    }

    #[test]
    fn finds_complete_submission_row() {
        let html = r#"
            <table>
              <tr><td>1</td><td>Complete submission text file</td><td><a href="/Archives/data/foo.txt">foo.txt</a></td></tr>
            </table>
        "#;
        let link = find_complete_submission_link(html).unwrap();
        assert_eq!(link, "https://www.sec.gov/Archives/data/foo.txt");
    }

    #[test]
    fn extracts_multiple_ex99_with_collision_suffixes() {
        let dir = tempdir().unwrap();
        let text = concat!(
            "<DOCUMENT>\n<TYPE>EX-99.1\n<TEXT>\n<p>First</p>\n</TEXT>\n",
            "<DOCUMENT>\n<TYPE>EX-99.1\n<TEXT>\n<p>Second</p>\n</TEXT>\n",
            "<DOCUMENT>\n<TYPE>10-K\n<TEXT>\nignored\n</TEXT>\n",
        );
        let saved = extract_exhibits(text, dir.path()).unwrap();
        assert_eq!(saved.len(), 2);
        assert!(saved[0].ends_with("EX-99.1.txt"));
        assert!(saved[1].ends_with("EX-99.1_1.txt"));

        let first = std::fs::read_to_string(&saved[0]).unwrap();
        assert!(first.contains("First"));
    }

    #[test]
    fn target_folder_matches_layout_contract() {
        let folder = Downloader::target_folder(
            Path::new("/data/filings"),
            "Example_Corp",
            "0000123456",
            "0001234567-09-000123",
            "2009",
        );
        assert_eq!(
            folder,
            PathBuf::from("/data/filings/Example_Corp/2009_Example_Corp_0000123456/0001234567-09-000123")
        );
    }
}
