//! CIK (Central Index Key) normalization helpers.

/// Left-pad a CIK to the canonical 10-digit zero-padded form used in every
/// persisted artifact (node keys, ledger rows, on-disk paths).
pub fn pad_cik(cik: &str) -> String {
    let trimmed = cik.trim();
    if trimmed.len() >= 10 {
        trimmed.to_string()
    } else {
        format!("{:0>10}", trimmed)
    }
}

/// Strip leading zeros, e.g. for building archive URLs that expect the bare
/// numeric CIK. Returns `"0"` for an all-zero input rather than an empty string.
pub fn unpad_cik(cik: &str) -> String {
    let stripped = cik.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// `company_<cik>` with the CIK normalized to its 10-digit padded form —
/// the node id every graph write keys a `Company` on.
pub fn company_id(cik: &str) -> String {
    format!("company_{}", pad_cik(cik))
}

/// A valid CIK is non-empty, all-decimal, and at most 10 digits before padding.
pub fn is_valid_cik(cik: &str) -> bool {
    let trimmed = cik.trim();
    !trimmed.is_empty() && trimmed.len() <= 10 && trimmed.chars().all(|c| c.is_ascii_digit())
}
