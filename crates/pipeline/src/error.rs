// ABOUTME: Error types for the comic pipeline including ErrorCode enum and StripError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing the categories of pipeline failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The transport could not complete the request (connect, read, body too large).
    Fetch,
    /// The transport gave up waiting for the upstream.
    Timeout,
    /// Non-success status or content-type mismatch from the site or the relay.
    UpstreamHttp,
    /// The fetch succeeded but no usable structured record was found.
    NoStructuredData,
    /// A single JSON fragment failed to parse. Recovered locally, never surfaced.
    MalformedFragment,
    /// An extractor query ran without a response bound to it.
    NoResponse,
    /// Caller-supplied slug, date or decoded token failed shape constraints.
    Validation,
    /// A snowcode token could not be decoded.
    Codec,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::UpstreamHttp => "upstream HTTP error",
            ErrorCode::NoStructuredData => "no structured data",
            ErrorCode::MalformedFragment => "malformed fragment",
            ErrorCode::NoResponse => "no response available",
            ErrorCode::Validation => "validation error",
            ErrorCode::Codec => "codec error",
        };
        write!(f, "{}", s)
    }
}

/// The main error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub struct StripError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fxcomics: {}", self.op)?;
        if !self.url.is_empty() {
            write!(f, " {}", self.url)?;
        }
        write!(f, ": {}", self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

impl StripError {
    fn new(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create a Fetch error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Fetch, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::Timeout, url, op, source)
    }

    /// Create an UpstreamHttp error.
    pub fn upstream_http(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::UpstreamHttp, url, op, source)
    }

    /// Create a NoStructuredData error.
    pub fn no_structured_data(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::new(ErrorCode::NoStructuredData, url, op, source)
    }

    /// Create a MalformedFragment error.
    pub fn malformed_fragment(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::new(ErrorCode::MalformedFragment, String::new(), op, source)
    }

    /// Create a NoResponse error.
    pub fn no_response(op: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::NoResponse,
            String::new(),
            op,
            Some(anyhow::anyhow!("no response bound to the extractor")),
        )
    }

    /// Create a Validation error.
    pub fn validation(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::new(ErrorCode::Validation, String::new(), op, source)
    }

    /// Create a Codec error.
    pub fn codec(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::new(ErrorCode::Codec, String::new(), op, source)
    }

    /// Returns true if this is a Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is an UpstreamHttp error.
    pub fn is_upstream_http(&self) -> bool {
        self.code == ErrorCode::UpstreamHttp
    }

    /// Returns true if this is a NoStructuredData error.
    pub fn is_no_structured_data(&self) -> bool {
        self.code == ErrorCode::NoStructuredData
    }

    /// Returns true if this is a Validation error.
    pub fn is_validation(&self) -> bool {
        self.code == ErrorCode::Validation
    }

    /// Returns true if this is a Codec error.
    pub fn is_codec(&self) -> bool {
        self.code == ErrorCode::Codec
    }

    /// Returns true if the caller supplied bad input (validation or codec).
    ///
    /// Adapters report these distinctly from resolution failures.
    pub fn is_caller_error(&self) -> bool {
        self.is_validation() || self.is_codec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_url_and_source() {
        let err = StripError::upstream_http(
            "https://www.gocomics.com/garfield/2024/1/2",
            "PrimaryHtml",
            Some(anyhow::anyhow!("HTTP status 404")),
        );
        assert_eq!(
            err.to_string(),
            "fxcomics: PrimaryHtml https://www.gocomics.com/garfield/2024/1/2: upstream HTTP error: HTTP status 404"
        );
    }

    #[test]
    fn display_omits_empty_url() {
        let err = StripError::codec("DecodeSnowcode", None);
        assert_eq!(err.to_string(), "fxcomics: DecodeSnowcode: codec error");
    }

    #[test]
    fn caller_errors_are_validation_or_codec() {
        assert!(StripError::validation("x", None).is_caller_error());
        assert!(StripError::codec("x", None).is_caller_error());
        assert!(!StripError::no_structured_data("", "x", None).is_caller_error());
    }
}
