// ABOUTME: The Client facade that owns the HTTP client and configuration for the pipeline.
// ABOUTME: Exposes strip, series and calendar resolution on top of the strategy modules.

use chrono::Utc;

use crate::calendar::{self, CalendarWindow};
use crate::error::StripError;
use crate::extractors::stream::Page;
use crate::options::{ClientBuilder, Options};
use crate::request::{validate_slug, StripRequest};
use crate::resource::{fetch, FetchOptions, FetchResponse};
use crate::result::{SeriesRecord, StripRecord};
use crate::series;
use crate::strip::{self, Strategy};

/// Client for resolving comic strips and series from the upstream site.
#[derive(Debug, Clone)]
pub struct Client {
    opts: Options,
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new ClientBuilder for configuring the client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a new Client with the given options.
    ///
    /// Redirects are never followed: a 3xx from the site is a strategy failure.
    pub fn new(opts: Options) -> Result<Self, StripError> {
        let http_client = match opts.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .timeout(opts.timeout)
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| {
                    StripError::fetch(
                        "",
                        "BuildClient",
                        Some(anyhow::anyhow!("failed to build HTTP client: {}", e)),
                    )
                })?,
        };

        Ok(Self { opts, http_client })
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Absolute URL of `path` on the configured origin.
    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.opts.origin, path)
    }

    /// Strip strategies in priority order. The relay is only included when configured.
    pub fn strategies(&self) -> Vec<Strategy> {
        strip::STRIP_STRATEGIES
            .iter()
            .copied()
            .filter(|s| *s != Strategy::ProxyRelay || self.opts.relay_url.is_some())
            .collect()
    }

    /// Resolve the strip for `slug` on `date` (`YYYY-M-D` or `YYYY-MM-DD`).
    pub async fn strip(&self, slug: &str, date: &str) -> Result<StripRecord, StripError> {
        let request = StripRequest::parse(slug, date)?;
        self.resolve_strip(&request).await
    }

    /// Resolve a validated request through every configured strategy.
    pub async fn resolve_strip(&self, request: &StripRequest) -> Result<StripRecord, StripError> {
        strip::resolve(self, request, &self.strategies()).await
    }

    /// Resolve a validated request through an explicit strategy list.
    pub async fn resolve_strip_with(
        &self,
        request: &StripRequest,
        strategies: &[Strategy],
    ) -> Result<StripRecord, StripError> {
        strip::resolve(self, request, strategies).await
    }

    /// Resolve the "about" information for `slug`.
    pub async fn series(&self, slug: &str) -> Result<SeriesRecord, StripError> {
        validate_slug(slug)?;
        series::resolve(self, slug).await
    }

    /// Resolve the most recent strips for `slug`, newest first.
    pub async fn calendar(&self, slug: &str) -> Result<Vec<StripRecord>, StripError> {
        let window = CalendarWindow::ending(slug, Utc::now().date_naive())?;
        self.calendar_window(&window).await
    }

    /// Resolve strips across an explicit window, newest first, stopping at the first gap.
    pub async fn calendar_window(
        &self,
        window: &CalendarWindow,
    ) -> Result<Vec<StripRecord>, StripError> {
        Ok(calendar::resolve(self, window).await)
    }

    /// GET `url` with the header profile plus `extra_headers`.
    pub(crate) async fn get(
        &self,
        url: &str,
        extra_headers: &[(&str, &str)],
        op: &str,
    ) -> Result<FetchResponse, StripError> {
        let fetch_opts = FetchOptions {
            headers: &self.opts.headers,
            extra_headers,
            max_content_length: self.opts.max_content_length,
            op,
        };
        fetch(&self.http_client, url, fetch_opts).await
    }

    /// GET a third-party `url`. The routing hint only ever goes to the origin.
    pub(crate) async fn get_external(
        &self,
        url: &str,
        op: &str,
    ) -> Result<FetchResponse, StripError> {
        let headers = self.opts.headers.without_routing_hint();
        let fetch_opts = FetchOptions {
            headers: &headers,
            extra_headers: &[],
            max_content_length: self.opts.max_content_length,
            op,
        };
        fetch(&self.http_client, url, fetch_opts).await
    }

    /// GET `url` and bind the unread body to a queryable page.
    pub(crate) async fn get_page(&self, url: &str, op: &str) -> Result<Page, StripError> {
        let response = self.get(url, &[], op).await?;
        tracing::debug!(url, status = response.status, "bound page");
        Ok(Page::from_response(response))
    }
}
