use std::sync::LazyLock;

use regex::Regex;

const COUNTRY_CODE: &str = "254";

static CANONICAL_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+254[17]\d{8}$").expect("Invalid regex"));

/// Rewrites Kenyan mobile numbers to `+254XXXXXXXXX`.
///
/// Handles `0712345678`, `254712345678`, `+254712345678` and the bare
/// subscriber number `712345678`; spaces and dashes are dropped. Anything else
/// comes back with only the separators removed. Applying it twice gives the
/// same result as applying it once.
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();

    if compact.starts_with('+') {
        return compact;
    }
    if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit()) {
        if let Some(rest) = compact.strip_prefix(COUNTRY_CODE) {
            return format!("+{COUNTRY_CODE}{rest}");
        }
        if let Some(rest) = compact.strip_prefix('0') {
            return format!("+{COUNTRY_CODE}{rest}");
        }
        if compact.len() == 9 && (compact.starts_with('7') || compact.starts_with('1')) {
            return format!("+{COUNTRY_CODE}{compact}");
        }
    }
    compact
}

pub fn is_valid_phone(normalized: &str) -> bool {
    CANONICAL_PHONE.is_match(normalized)
}

/// Digits only, as the gateway's `PhoneNumber` field expects.
pub fn gateway_msisdn(normalized: &str) -> &str {
    normalized.trim_start_matches('+')
}
