use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::date::{find_date_token, normalize_date};
use crate::error::Result;
use crate::source::ParsedFields;

/// Lower-case fragments that mark a line as carrying the expiry date.
pub const EXPIRY_KEYWORDS: &[&str] = &[
    "expiry",
    "expiration",
    "expire",
    "paid-till",
    "valid-until",
    "renewal date",
    "expira",
    "vencimiento",
    "scadenza",
    "vervaldatum",
    "ablauf",
    "échéance",
    "utløp",
];

const UNREGISTERED_MARKERS: &[&str] = &[
    "no match",
    "not found",
    "no data found",
    "no entries found",
    "status: free",
    "status: available",
    "domain not found",
    "no object found",
];

static REGISTRAR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?im)^\s*Registrar:[ \t]*(.+)$",
        r"(?im)^\s*Registrar Name:[ \t]*(.+)$",
        r"(?im)^\s*Sponsoring Registrar:[ \t]*(.+)$",
    ])
});

static EXPIRATION_FIELD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?im)^\s*(?:Registry )?Expir(?:y|ation) Date:[ \t]*(.+)$",
        r"(?im)^\s*Registrar Registration Expiration Date:[ \t]*(.+)$",
        r"(?im)^\s*Expires On:[ \t]*(.+)$",
        r"(?im)^\s*Expires:[ \t]*(.+)$",
        r"(?im)^\s*paid-till:[ \t]*(.+)$",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

/// Scans WHOIS text for the expiry date.
///
/// Only the first line mentioning an expiry keyword is considered. A
/// keyword line without a recognizable date is "not found" rather than an
/// error; a token that looks like a date but is out of range is an error.
pub fn extract_expiry(text: &str) -> Result<Option<NaiveDate>> {
    let Some(line) = text.lines().find(|line| {
        let lower = line.to_lowercase();
        EXPIRY_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }) else {
        debug!("No expiry keyword in WHOIS text");
        return Ok(None);
    };

    match find_date_token(line) {
        Some(token) => normalize_date(token).map(Some),
        None => {
            debug!(line = %line.trim(), "Expiry line has no date token");
            Ok(None)
        }
    }
}

pub fn extract_registrar(text: &str) -> Option<String> {
    extract_field(text, &REGISTRAR_PATTERNS)
}

/// True when the registry answered that the domain is not registered.
///
/// Markers only count at the start of a line (after comment prefixes), so
/// the same words inside a legal notice do not match.
pub fn is_unregistered(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line
            .trim_start_matches(|c: char| c == '%' || c == '#' || c.is_whitespace())
            .to_lowercase();
        UNREGISTERED_MARKERS.iter().any(|p| line.starts_with(p))
    })
}

/// Reads the labeled fields common to gTLD WHOIS output.
///
/// The labels are stricter than the keyword scan but the dates may be in
/// any layout registries commonly print, so this is tried first by the
/// port 43 client.
pub fn parse_labeled_fields(raw: &str) -> ParsedFields {
    ParsedFields {
        expiration_date: extract_field(raw, &EXPIRATION_FIELD_PATTERNS)
            .and_then(|value| parse_loose_date(&value)),
        registrar: extract_registrar(raw),
    }
}

fn extract_field(text: &str, patterns: &[Regex]) -> Option<String> {
    for re in patterns {
        if let Some(caps) = re.captures(text) {
            if let Some(m) = caps.get(1) {
                let value = m.as_str().trim().to_string();
                if !value.is_empty() && !value.to_lowercase().contains("redacted") {
                    return Some(value);
                }
            }
        }
    }
    None
}

fn parse_loose_date(date_str: &str) -> Option<NaiveDate> {
    let formats = [
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d",
        "%d-%b-%Y",
        "%d-%B-%Y",
        "%Y.%m.%d",
        "%Y/%m/%d",
        "%d.%m.%Y",
        "%b %d %Y",
    ];

    let cleaned = date_str
        .trim()
        .replace(" (UTC)", "")
        .replace(" UTC", "Z")
        .replace(" +0000", "Z");

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt.date());
        }
        if let Ok(d) = NaiveDate::parse_from_str(&cleaned, fmt) {
            return Some(d);
        }
    }

    // Offsets are ignored: the calendar date as printed
    DateTime::parse_from_rfc3339(&cleaned)
        .ok()
        .map(|dt| dt.date_naive())
        .or_else(|| find_date_token(&cleaned).and_then(|token| normalize_date(token).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LapseError;

    const VERISIGN: &str = "   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Registrar IANA ID: 376
";

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_extract_expiry_gtld() {
        assert_eq!(extract_expiry(VERISIGN).unwrap(), Some(ymd(2025, 8, 13)));
        assert_eq!(
            extract_registrar(VERISIGN).as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
    }

    #[test]
    fn test_extract_expiry_localized() {
        let ru = "domain: EXAMPLE.RU\nstate: REGISTERED\npaid-till: 2026.03.15\n";
        assert_eq!(extract_expiry(ru).unwrap(), Some(ymd(2026, 3, 15)));

        let it = "Domain: esempio.it\nScadenza: 14-08-2025\n";
        assert_eq!(extract_expiry(it).unwrap(), Some(ymd(2025, 8, 14)));

        let us = "EXPIRES ON ......... 08/14/2025\n";
        assert_eq!(extract_expiry(us).unwrap(), Some(ymd(2025, 8, 14)));
    }

    #[test]
    fn test_extract_expiry_not_found() {
        assert_eq!(extract_expiry("Domain Name: EXAMPLE.COM\n").unwrap(), None);
        assert_eq!(extract_expiry("").unwrap(), None);
        // Only the first keyword line counts
        let text = "Expiration Date: see registrar\nRegistry Expiry Date: 2030-01-01\n";
        assert_eq!(extract_expiry(text).unwrap(), None);
    }

    #[test]
    fn test_extract_expiry_bad_token_is_format_error() {
        let text = "Registry Expiry Date: 2030-14-01\n";
        assert!(matches!(
            extract_expiry(text),
            Err(LapseError::FormatError(_))
        ));
    }

    #[test]
    fn test_registrar_redacted_is_ignored() {
        let text = "Registrar: REDACTED FOR PRIVACY\nSponsoring Registrar: Example Registrar, Inc.\n";
        assert_eq!(
            extract_registrar(text).as_deref(),
            Some("Example Registrar, Inc.")
        );
        assert_eq!(extract_registrar("Registrar IANA ID: 376\n"), None);
    }

    #[test]
    fn test_is_unregistered() {
        assert!(is_unregistered("No match for \"UNREGISTERED-XYZ.COM\".\n"));
        assert!(is_unregistered("%% NOT FOUND\n"));
        assert!(is_unregistered("\n  Domain not found.\n"));
        assert!(!is_unregistered(VERISIGN));

        let notice = "Domain Name: EXAMPLE.COM\n\
                      Registry Expiry Date: 2025-08-13T04:00:00Z\n\
                      NOTICE: if a record is not found, contact the registrar.\n";
        assert!(!is_unregistered(notice));
    }

    #[test]
    fn test_parse_labeled_fields() {
        let fields = parse_labeled_fields(VERISIGN);
        assert_eq!(fields.expiration_date, Some(ymd(2025, 8, 13)));

        let fields = parse_labeled_fields("Expiry Date: 14-Aug-2026\n");
        assert_eq!(fields.expiration_date, Some(ymd(2026, 8, 14)));

        let fields = parse_labeled_fields("Expires: 2027-01-31 12:00:00 UTC\n");
        assert_eq!(fields.expiration_date, Some(ymd(2027, 1, 31)));

        let fields = parse_labeled_fields("Domain: example.de\nStatus: connect\n");
        assert_eq!(fields, ParsedFields::default());
    }

    #[test]
    fn test_labeled_offset_keeps_printed_day() {
        let text = "Registry Expiry Date: 2025-08-13T23:00:00-05:00\n";
        assert_eq!(
            parse_labeled_fields(text).expiration_date,
            Some(ymd(2025, 8, 13))
        );
        assert_eq!(extract_expiry(text).unwrap(), Some(ymd(2025, 8, 13)));

        let text = "Expiration Date: 2026-01-01T01:30:00+09:00\n";
        assert_eq!(
            parse_labeled_fields(text).expiration_date,
            Some(ymd(2026, 1, 1))
        );
    }

    #[test]
    fn test_non_ascii_digits_yield_no_date() {
        let text = "Expiry Date: \u{662}\u{660}\u{662}\u{665}-08-14\n";
        assert_eq!(extract_expiry(text).unwrap(), None);
        assert_eq!(parse_labeled_fields(text).expiration_date, None);
    }
}
