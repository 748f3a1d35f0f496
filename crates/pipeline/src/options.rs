// ABOUTME: Configuration for the comic pipeline including HeaderProfile, Options, and ClientBuilder.
// ABOUTME: ClientBuilder provides a fluent API for constructing Client instances with custom settings.

use std::time::Duration;

use crate::client::Client;
use crate::error::StripError;

/// Default upstream site origin.
pub const DEFAULT_ORIGIN: &str = "https://www.gocomics.com";

/// Default outbound User-Agent.
pub const DEFAULT_USER_AGENT: &str = "fxgocomics/1.0.0 (+https://github.com/shayypy/fxgocomics)";

/// Maximum allowed body size (10 MB).
pub const MAX_CONTENT_LENGTH: usize = 10 * 1024 * 1024;

/// The fixed set of outbound headers sent with every upstream request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderProfile {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Optional `(name, value)` routing hint forwarded to the upstream edge.
    pub routing_hint: Option<(String, String)>,
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            routing_hint: None,
        }
    }
}

impl HeaderProfile {
    /// Header pairs in the order they are applied to a request.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = vec![
            ("user-agent", self.user_agent.as_str()),
            ("accept", self.accept.as_str()),
            ("accept-language", self.accept_language.as_str()),
        ];
        if let Some((name, value)) = &self.routing_hint {
            pairs.push((name.as_str(), value.as_str()));
        }
        pairs
    }

    /// The same profile minus the routing hint, for hosts other than the origin.
    pub fn without_routing_hint(&self) -> Self {
        Self {
            routing_hint: None,
            ..self.clone()
        }
    }
}

/// Configuration options for the pipeline client.
#[derive(Debug, Clone)]
pub struct Options {
    pub origin: String,
    pub headers: HeaderProfile,
    pub timeout: Duration,
    /// Base URL of the third-party scraping relay. The relay strategy is
    /// skipped entirely when unset.
    pub relay_url: Option<String>,
    pub max_content_length: usize,
    pub http_client: Option<reqwest::Client>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            headers: HeaderProfile::default(),
            timeout: Duration::from_secs(30),
            relay_url: None,
            max_content_length: MAX_CONTENT_LENGTH,
            http_client: None,
        }
    }
}

/// Builder for constructing Client instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    opts: Options,
}

impl ClientBuilder {
    /// Create a new ClientBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Set the upstream site origin (scheme + host, no trailing slash needed).
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.opts.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.headers.user_agent = user_agent.into();
        self
    }

    /// Set the Accept-Language header.
    pub fn accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.opts.headers.accept_language = accept_language.into();
        self
    }

    /// Add a routing hint header sent with every upstream request.
    pub fn routing_hint(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.routing_hint = Some((name.into(), value.into()));
        self
    }

    /// Enable the proxy relay strategy with the given relay base URL.
    pub fn relay_url(mut self, relay_url: impl Into<String>) -> Self {
        self.opts.relay_url = Some(relay_url.into());
        self
    }

    /// Override the maximum accepted body size.
    pub fn max_content_length(mut self, max: usize) -> Self {
        self.opts.max_content_length = max;
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Build the Client with the configured options.
    pub fn build(self) -> Result<Client, StripError> {
        Client::new(self.opts)
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_hint_is_appended_last() {
        let mut profile = HeaderProfile::default();
        assert_eq!(profile.pairs().len(), 3);

        profile.routing_hint = Some(("x-route".to_string(), "edge-2".to_string()));
        let pairs = profile.pairs();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[3], ("x-route", "edge-2"));

        let external = profile.without_routing_hint();
        assert_eq!(external.pairs().len(), 3);
        assert_eq!(external.user_agent, profile.user_agent);
    }

    #[test]
    fn builder_trims_trailing_slash_from_origin() {
        let builder = ClientBuilder::new().origin("http://127.0.0.1:9000/");
        assert_eq!(builder.opts.origin, "http://127.0.0.1:9000");
    }
}
