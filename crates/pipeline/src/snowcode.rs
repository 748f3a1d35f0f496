// ABOUTME: Snowcode codec: a reversible opaque token carrying a comic slug and a date string.
// ABOUTME: Encodes compact JSON as URL-safe base64; decoding distinguishes codec from validation failures.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StripError;
use crate::request::{parse_date, StripRequest, MAX_SLUG_LEN};

static DATE_SHAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}$").expect("valid snowcode date regex"));

/// The structured content of a snowcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snowcode {
    /// Comic slug.
    #[serde(rename = "c")]
    pub slug: String,
    /// `YYYY-M-D` or `YYYY-MM-DD`.
    #[serde(rename = "d")]
    pub date: String,
}

impl Snowcode {
    pub fn new(slug: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            date: date.into(),
        }
    }

    /// The strip request this token points at.
    pub fn to_request(&self) -> Result<StripRequest, StripError> {
        StripRequest::parse(&self.slug, &self.date)
    }
}

impl From<&StripRequest> for Snowcode {
    fn from(request: &StripRequest) -> Self {
        Self::new(
            request.slug.clone(),
            request.date.format("%Y-%m-%d").to_string(),
        )
    }
}

/// Encode `code` into an opaque URL-safe token.
pub fn encode(code: &Snowcode) -> Result<String, StripError> {
    let json = serde_json::to_vec(code)
        .map_err(|e| StripError::codec("EncodeSnowcode", Some(anyhow::Error::new(e))))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

/// Decode a token produced by [`encode`].
///
/// Structural failures (bad base64, bad JSON, missing fields) are `Codec`
/// errors and are reported before any shape check. A slug or date of the
/// wrong shape is a `Validation` error.
pub fn decode(token: &str) -> Result<Snowcode, StripError> {
    const OP: &str = "DecodeSnowcode";

    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim().trim_end_matches('='))
        .map_err(|e| StripError::codec(OP, Some(anyhow::Error::new(e))))?;
    let code: Snowcode = serde_json::from_slice(&bytes)
        .map_err(|e| StripError::codec(OP, Some(anyhow::Error::new(e))))?;

    let slug_len = code.slug.chars().count();
    if slug_len == 0 || slug_len > MAX_SLUG_LEN {
        return Err(StripError::validation(
            OP,
            Some(anyhow::anyhow!("slug length {} out of range", slug_len)),
        ));
    }
    if !DATE_SHAPE_RE.is_match(&code.date) {
        return Err(StripError::validation(
            OP,
            Some(anyhow::anyhow!("date {:?} is not YYYY-M-D", code.date)),
        ));
    }
    Ok(code)
}

/// Upstream page for a token: `{origin}/{slug}/{year}/{month}/{day}`.
pub fn redirect_target(token: &str, origin: &str) -> Result<String, StripError> {
    let code = decode(token)?;
    parse_date(&code.date)?;
    Ok(format!(
        "{}/{}/{}",
        origin.trim_end_matches('/'),
        code.slug,
        code.date.replace('-', "/")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_inverts_encode() {
        for code in [
            Snowcode::new("garfield", "2024-01-02"),
            Snowcode::new("calvinandhobbes", "1995-12-31"),
            Snowcode::new("peanuts", "2024-1-2"),
        ] {
            let token = encode(&code).unwrap();
            assert!(!token.contains(['+', '/', '=']));
            assert_eq!(decode(&token).unwrap(), code);
        }
    }

    #[test]
    fn structural_garbage_is_a_codec_error() {
        assert!(decode("!!!not base64!!!").unwrap_err().is_codec());
        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert!(decode(&not_json).unwrap_err().is_codec());
        let wrong_fields = URL_SAFE_NO_PAD.encode(r#"{"slug":"x","date":"2024-01-02"}"#);
        assert!(decode(&wrong_fields).unwrap_err().is_codec());
    }

    #[test]
    fn bad_shapes_are_validation_errors() {
        let bad_date = encode(&Snowcode::new("garfield", "January 2")).unwrap();
        assert!(decode(&bad_date).unwrap_err().is_validation());
        let empty_slug = encode(&Snowcode::new("", "2024-01-02")).unwrap();
        assert!(decode(&empty_slug).unwrap_err().is_validation());
    }

    #[test]
    fn non_ascii_digits_are_rejected() {
        // Arabic-Indic digits for 2024.
        let date = "\u{662}\u{660}\u{662}\u{664}-1-2";
        let token = encode(&Snowcode::new("garfield", date)).unwrap();
        assert!(decode(&token).unwrap_err().is_validation());
        assert!(redirect_target(&token, "https://www.gocomics.com")
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn redirect_replaces_dashes_with_slashes() {
        let token = encode(&Snowcode::new("garfield", "2024-01-02")).unwrap();
        assert_eq!(
            redirect_target(&token, "https://www.gocomics.com/").unwrap(),
            "https://www.gocomics.com/garfield/2024/01/02"
        );
    }

    #[test]
    fn request_conversion() {
        let request = StripRequest::parse("garfield", "2024-1-2").unwrap();
        let code = Snowcode::from(&request);
        assert_eq!(code.date, "2024-01-02");
        assert_eq!(code.to_request().unwrap(), request);
    }
}
