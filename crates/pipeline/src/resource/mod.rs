// ABOUTME: Transport module for fetching upstream pages with the configured header profile.
// ABOUTME: Handles status/edge classification, streaming bodies with a size cap, and charset decoding.

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures::stream::{BoxStream, StreamExt};

use crate::error::StripError;
use crate::options::HeaderProfile;

/// A response body delivered chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, StripError>>;

/// Statuses the transport edge answers with on its own behalf.
const EDGE_STATUSES: &[u16] = &[400, 403, 502, 503, 530];

/// Options for a single fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions<'a> {
    pub headers: &'a HeaderProfile,
    /// Request-specific headers applied after the profile.
    pub extra_headers: &'a [(&'a str, &'a str)],
    pub max_content_length: usize,
    /// Operation name used in error reports.
    pub op: &'a str,
}

/// A successful (2xx) response whose body has not been read yet.
pub struct FetchResponse {
    pub status: u16,
    pub url: String,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl FetchResponse {
    /// Returns true if the response's media type equals `mime` (parameters ignored).
    pub fn has_media_type(&self, mime: &str) -> bool {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case(mime))
            .unwrap_or(false)
    }

    /// Encoding declared by the Content-Type charset parameter, UTF-8 otherwise.
    pub fn encoding(&self) -> &'static Encoding {
        encoding_for(self.content_type.as_deref())
    }

    /// Read the whole body and decode it to text.
    pub async fn text(self) -> Result<String, StripError> {
        let encoding = self.encoding();
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        let (decoded, _, _) = encoding.decode(&buf);
        Ok(decoded.into_owned())
    }
}

/// Encoding named by a Content-Type header's charset, defaulting to UTF-8.
pub fn encoding_for(content_type: Option<&str>) -> &'static Encoding {
    content_type
        .and_then(extract_charset)
        .and_then(|charset| Encoding::for_label(charset.as_bytes()))
        .unwrap_or(UTF_8)
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    for part in lower.split(';') {
        let trimmed = part.trim();
        if let Some(charset) = trimmed.strip_prefix("charset=") {
            let charset = charset.trim_matches('"').trim_matches('\'');
            return Some(charset.to_string());
        }
    }
    None
}

/// Returns true when a failure status was produced by the transport edge
/// rather than by the target site.
///
/// Redirects always count, since the client never follows them. The listed
/// error statuses only count when the `Server` header is absent or names the
/// edge itself.
pub fn is_edge_error(status: u16, server: Option<&str>) -> bool {
    let edge_server = match server {
        None => true,
        Some(s) => s.eq_ignore_ascii_case("cloudflare"),
    };
    (300..400).contains(&status) || (EDGE_STATUSES.contains(&status) && edge_server)
}

/// Fetch `url` with the header profile and return the unread body stream.
///
/// Any non-2xx status is an `UpstreamHttp` error. Transport failures map to
/// `Fetch` or `Timeout`. The body stream enforces `max_content_length` as
/// chunks arrive.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    opts: FetchOptions<'_>,
) -> Result<FetchResponse, StripError> {
    let parsed = url::Url::parse(url).map_err(|e| {
        StripError::fetch(url, opts.op, Some(anyhow::anyhow!("invalid URL: {}", e)))
    })?;

    let mut request = client.get(parsed);
    for (key, value) in opts.headers.pairs() {
        request = request.header(key, value);
    }
    for (key, value) in opts.extra_headers {
        request = request.header(*key, *value);
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            StripError::timeout(url, opts.op, Some(anyhow::anyhow!("request timed out: {}", e)))
        } else {
            StripError::fetch(url, opts.op, Some(anyhow::anyhow!("request failed: {}", e)))
        }
    })?;

    let status = response.status().as_u16();
    let header = |name: &str| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };
    let content_type = header("content-type").map(|s| s.to_lowercase());
    let server = header("server");

    if !response.status().is_success() {
        let detail = if is_edge_error(status, server.as_deref()) {
            anyhow::anyhow!("status {} from transport edge", status)
        } else {
            anyhow::anyhow!("HTTP status {}", status)
        };
        return Err(StripError::upstream_http(url, opts.op, Some(detail)));
    }

    if let Some(len) = response.content_length() {
        if len as usize > opts.max_content_length {
            return Err(StripError::fetch(
                url,
                opts.op,
                Some(anyhow::anyhow!("content too large")),
            ));
        }
    }

    let final_url = response.url().to_string();
    let max = opts.max_content_length;
    let op = opts.op.to_string();
    let err_url = url.to_string();
    let mut seen = 0usize;
    let body = response
        .bytes_stream()
        .map(move |chunk| {
            let chunk = chunk.map_err(|e| {
                StripError::fetch(
                    &err_url,
                    op.as_str(),
                    Some(anyhow::anyhow!("failed to read body: {}", e)),
                )
            })?;
            seen += chunk.len();
            if seen > max {
                return Err(StripError::fetch(
                    &err_url,
                    op.as_str(),
                    Some(anyhow::anyhow!("content too large")),
                ));
            }
            Ok(chunk)
        })
        .boxed();

    Ok(FetchResponse {
        status,
        url: final_url,
        content_type,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn opts(profile: &HeaderProfile) -> FetchOptions<'_> {
        FetchOptions {
            headers: profile,
            extra_headers: &[],
            max_content_length: 1024,
            op: "Fetch",
        }
    }

    #[test]
    fn edge_error_classification() {
        assert!(is_edge_error(302, Some("nginx")));
        assert!(is_edge_error(503, None));
        assert!(is_edge_error(530, Some("cloudflare")));
        assert!(!is_edge_error(503, Some("nginx")));
        assert!(!is_edge_error(404, None));
    }

    #[test]
    fn charset_defaults_to_utf8() {
        assert_eq!(encoding_for(None), UTF_8);
        assert_eq!(encoding_for(Some("text/html")), UTF_8);
        assert_eq!(
            encoding_for(Some("text/html; charset=ISO-8859-1")).name(),
            "windows-1252"
        );
    }

    #[tokio::test]
    async fn fetch_sends_header_profile() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/garfield")
                .header("user-agent", "test-agent")
                .header("x-route", "blue");
            then.status(200)
                .header("content-type", "text/plain; charset=utf-8")
                .body("hello");
        });

        let profile = HeaderProfile {
            user_agent: "test-agent".to_string(),
            routing_hint: Some(("x-route".to_string(), "blue".to_string())),
            ..HeaderProfile::default()
        };
        let client = reqwest::Client::new();
        let response = fetch(&client, &server.url("/garfield"), opts(&profile))
            .await
            .expect("fetch should succeed");
        mock.assert();

        assert!(response.has_media_type("text/plain"));
        assert_eq!(response.text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn fetch_rejects_non_success_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).header("server", "nginx");
        });

        let profile = HeaderProfile::default();
        let client = reqwest::Client::new();
        let err = fetch(&client, &server.url("/missing"), opts(&profile))
            .await
            .expect_err("404 should fail");
        assert!(err.is_upstream_http());
    }

    #[tokio::test]
    async fn body_stream_enforces_size_cap() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/big");
            then.status(200).body("x".repeat(4096));
        });

        let profile = HeaderProfile::default();
        let client = reqwest::Client::new();
        let result = match fetch(&client, &server.url("/big"), opts(&profile)).await {
            Ok(response) => response.text().await,
            Err(err) => Err(err),
        };
        assert!(result.expect_err("oversized body should fail").is_fetch());
    }
}
