// ABOUTME: Validated strip requests: comic slug plus calendar date.
// ABOUTME: Rejects malformed slugs and dates with Validation errors before any fetch happens.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::StripError;

/// Longest accepted comic slug.
pub const MAX_SLUG_LEN: usize = 100;

static DATE_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})$").expect("valid date regex"));

/// Check a comic slug: 1 to 100 characters, no path separators or whitespace.
pub fn validate_slug(slug: &str) -> Result<(), StripError> {
    let len = slug.chars().count();
    if len == 0 || len > MAX_SLUG_LEN {
        return Err(StripError::validation(
            "ValidateSlug",
            Some(anyhow::anyhow!(
                "slug must be 1 to {} characters, got {}",
                MAX_SLUG_LEN,
                len
            )),
        ));
    }
    if slug.contains(['/', '?', '#']) || slug.chars().any(char::is_whitespace) {
        return Err(StripError::validation(
            "ValidateSlug",
            Some(anyhow::anyhow!("slug {:?} contains reserved characters", slug)),
        ));
    }
    Ok(())
}

/// Check that a date is within the range the site can have strips for.
pub fn validate_date(date: NaiveDate) -> Result<(), StripError> {
    if date.year() <= 1800 || date.year() >= 3000 {
        return Err(StripError::validation(
            "ValidateDate",
            Some(anyhow::anyhow!("year {} is out of range", date.year())),
        ));
    }
    Ok(())
}

/// Parse a `YYYY-M-D` or `YYYY-MM-DD` date into a real calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate, StripError> {
    let invalid = |reason: String| StripError::validation("ParseDate", Some(anyhow::anyhow!(reason)));

    let caps = DATE_SHAPE_RE
        .captures(s.trim())
        .ok_or_else(|| invalid(format!("{:?} is not shaped like YYYY-MM-DD", s)))?;
    let num = |i: usize| {
        caps[i]
            .parse::<u32>()
            .map_err(|e| invalid(format!("{:?}: {}", s, e)))
    };
    let (year, month, day) = (num(1)? as i32, num(2)?, num(3)?);

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(invalid(format!("{:?} has an out-of-range month or day", s)));
    }
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| invalid(format!("{:?} is not a calendar date", s)))?;
    validate_date(date)?;
    Ok(date)
}

/// A comic slug and the date of the installment wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripRequest {
    pub slug: String,
    pub date: NaiveDate,
}

impl StripRequest {
    pub fn new(slug: impl Into<String>, date: NaiveDate) -> Result<Self, StripError> {
        let slug = slug.into();
        validate_slug(&slug)?;
        validate_date(date)?;
        Ok(Self { slug, date })
    }

    /// Build a request from textual input, e.g. `("garfield", "2024-1-2")`.
    pub fn parse(slug: &str, date: &str) -> Result<Self, StripError> {
        Self::new(slug, parse_date(date)?)
    }

    /// The dated page path, `/{slug}/{year}/{month}/{day}` without zero padding.
    pub fn path(&self) -> String {
        format!(
            "/{}/{}/{}/{}",
            self.slug,
            self.date.year(),
            self.date.month(),
            self.date.day()
        )
    }
}

impl fmt::Display for StripRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slug, self.date.format("%Y-%m-%d"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_padded_and_unpadded_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_date("2024-01-02").unwrap(), expected);
        assert_eq!(parse_date("2024-1-2").unwrap(), expected);
    }

    #[test]
    fn rejects_bad_date_shapes() {
        for bad in [
            "2024/01/02",
            "24-1-2",
            "2024-13-01",
            "2024-02-30",
            "1700-01-01",
            "",
            "\u{662}\u{660}\u{662}\u{664}-1-2",
            "2024-\u{967}-2",
        ] {
            let err = parse_date(bad).unwrap_err();
            assert!(err.is_validation(), "{:?} should be a validation error", bad);
        }
    }

    #[test]
    fn slug_constraints() {
        assert!(validate_slug("garfield").is_ok());
        assert!(validate_slug("").unwrap_err().is_validation());
        assert!(validate_slug(&"x".repeat(101)).unwrap_err().is_validation());
        assert!(validate_slug("a/b").unwrap_err().is_validation());
    }

    #[test]
    fn path_is_unpadded() {
        let req = StripRequest::parse("garfield", "2024-01-02").unwrap();
        assert_eq!(req.path(), "/garfield/2024/1/2");
        assert_eq!(req.to_string(), "garfield@2024-01-02");
    }
}
