//! Canonical comparison forms for identifying fields.
//!
//! # Responsibility
//! - Turn raw kiosk input into values that can be compared bit-exactly.
//! - Treat invalid input as absent (`None`) instead of erroring.
//!
//! # Invariants
//! - A normalized phone is always exactly 10 ASCII digits.
//! - A normalized email is trimmed, lower-cased and non-empty.
//! - DOB parsing accepts only `MM-DD-YYYY` naming a real calendar date.
//!
//! # See also
//! - `crate::matching` for how these forms are compared.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static NON_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^0-9]+").expect("valid non-digit regex"));
static KIOSK_DOB_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{2})-([0-9]{2})-([0-9]{4})$").expect("valid kiosk dob regex")
});
static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("valid iso date regex"));

const PHONE_DIGITS: usize = 10;

/// Normalizes a name for comparison only.
///
/// Trims, lower-cases and collapses internal whitespace runs to one space.
/// Stored display names are never replaced by this form.
pub fn normalize_name(value: &str) -> String {
    let lowered = value.trim().to_lowercase();
    WHITESPACE_RE.replace_all(&lowered, " ").into_owned()
}

/// Normalizes an email address. Blank input is absent.
pub fn normalize_email(value: &str) -> Option<String> {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Normalizes a US phone number to its 10 digits.
///
/// Formatting characters are stripped. Anything other than exactly 10
/// remaining digits is absent, including non-empty garbage.
pub fn normalize_phone(value: &str) -> Option<String> {
    let digits = NON_DIGIT_RE.replace_all(value, "");
    if digits.len() == PHONE_DIGITS {
        Some(digits.into_owned())
    } else {
        None
    }
}

/// Parses the kiosk date-of-birth entry format `MM-DD-YYYY`.
///
/// Leading zeros are mandatory and the date must exist on the calendar.
/// Matching depends on exact DOB equality, so nothing looser is accepted.
pub fn normalize_dob(value: &str) -> Option<NaiveDate> {
    let caps = KIOSK_DOB_RE.captures(value.trim())?;
    let month = caps[1].parse::<u32>().ok()?;
    let day = caps[2].parse::<u32>().ok()?;
    let year = caps[3].parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a canonical `YYYY-MM-DD` date as written to the flat files.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let caps = ISO_DATE_RE.captures(value.trim())?;
    let year = caps[1].parse::<i32>().ok()?;
    let month = caps[2].parse::<u32>().ok()?;
    let day = caps[3].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Formats a DOB the way it is stored and exported.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        format_iso_date, normalize_dob, normalize_email, normalize_name, normalize_phone,
        parse_iso_date,
    };
    use chrono::NaiveDate;

    #[test]
    fn name_is_trimmed_lowered_and_collapsed() {
        assert_eq!(normalize_name("  Mary   Ann\tSMITH "), "mary ann smith");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn email_blank_is_absent() {
        assert_eq!(normalize_email("   "), None);
        assert_eq!(
            normalize_email(" Jane@X.COM ").as_deref(),
            Some("jane@x.com")
        );
    }

    #[test]
    fn phone_accepts_exactly_ten_digits() {
        assert_eq!(
            normalize_phone("215-555-1234").as_deref(),
            Some("2155551234")
        );
        assert_eq!(
            normalize_phone("(215) 555 1234").as_deref(),
            Some("2155551234")
        );
        assert_eq!(normalize_phone("555-1234"), None);
        assert_eq!(normalize_phone("1-215-555-1234"), None);
        assert_eq!(normalize_phone("call me"), None);
        assert_eq!(normalize_phone(""), None);
    }

    #[test]
    fn dob_requires_strict_kiosk_format() {
        let expected = NaiveDate::from_ymd_opt(2007, 3, 14);
        assert_eq!(normalize_dob("03-14-2007"), expected);
        assert_eq!(normalize_dob(" 03-14-2007 "), expected);
        assert_eq!(
            format_iso_date(normalize_dob("03-14-2007").expect("valid dob")),
            "2007-03-14"
        );

        assert_eq!(normalize_dob("3-14-2007"), None);
        assert_eq!(normalize_dob("03/14/2007"), None);
        assert_eq!(normalize_dob("2007-03-14"), None);
        assert_eq!(normalize_dob("03-14-07"), None);
        assert_eq!(normalize_dob("03-14"), None);
        assert_eq!(normalize_dob("02-30-2007"), None);
        assert_eq!(normalize_dob("13-01-2007"), None);
        assert_eq!(normalize_dob(""), None);
    }

    #[test]
    fn iso_date_parsing_is_strict() {
        assert_eq!(parse_iso_date("2000-01-01"), NaiveDate::from_ymd_opt(2000, 1, 1));
        assert_eq!(parse_iso_date("2000-1-1"), None);
        assert_eq!(parse_iso_date("01-01-2000"), None);
        assert_eq!(parse_iso_date(""), None);
    }
}
