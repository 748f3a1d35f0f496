// ABOUTME: Streaming selector extractor that evaluates selectors with lol_html as the body arrives.
// ABOUTME: Page owns the fetched body and replays the buffered bytes for every query after the first.

//! Streaming selector extraction.
//!
//! A [`Page`] wraps one fetched document. Each query runs a single forward
//! pass of a streaming HTML rewriter over the document, so no DOM is ever
//! built. Text queries for several selectors share one pass; the text of a
//! selector is split wherever a new matching element starts.
//!
//! The network body can only be read once. When a query is made with
//! [`Replay::Keep`], the raw bytes seen during the pass are retained and the
//! next query runs over that copy instead of re-fetching. [`Replay::Final`]
//! skips retaining the copy; after it the page has no body and further
//! queries fail with `NoResponse`.

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use encoding_rs::{Encoding, UTF_8};
use futures::stream::StreamExt;
use lol_html::html_content::{Element, TextChunk};
use lol_html::{ElementContentHandlers, HandlerResult, HtmlRewriter, Settings};

use crate::error::StripError;
use crate::extractors::selector::{get_or_compile, split_selector_list, Selector};
use crate::resource::{ByteStream, FetchResponse};

/// Whether a query should leave a replayable copy of the body behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replay {
    /// Keep the raw bytes so another query can run after this one.
    Keep,
    /// This is the last query; do not duplicate the body.
    Final,
}

/// Text extracted per selector, in the order the selectors were requested.
///
/// Every requested selector has an entry, even when nothing matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorResult {
    entries: Vec<(String, Vec<String>)>,
}

impl SelectorResult {
    /// Texts extracted for `selector`, or an empty slice if it was not requested.
    pub fn get(&self, selector: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == selector)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// Remove and return the texts extracted for `selector`.
    pub fn take(&mut self, selector: &str) -> Vec<String> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == selector)
            .map(|(_, v)| std::mem::take(v))
            .unwrap_or_default()
    }

    /// Requested selectors, in request order.
    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

enum Source {
    Network(ByteStream),
    Buffered(Bytes),
}

/// A fetched document that selector queries run against.
pub struct Page {
    url: String,
    encoding: &'static Encoding,
    source: Option<Source>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url)
            .field("encoding", &self.encoding.name())
            .field("can_replay", &self.can_replay())
            .finish()
    }
}

impl Page {
    /// Bind a page to a fetched response. The body is not read until the first query.
    pub fn from_response(response: FetchResponse) -> Self {
        let encoding = response.encoding();
        Self {
            url: response.url,
            encoding,
            source: Some(Source::Network(response.body)),
        }
    }

    /// Bind a page to a stream of UTF-8 body chunks.
    pub fn from_stream(url: impl Into<String>, body: ByteStream) -> Self {
        Self {
            url: url.into(),
            encoding: UTF_8,
            source: Some(Source::Network(body)),
        }
    }

    /// Bind a page to an in-memory UTF-8 document.
    pub fn from_bytes(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            encoding: UTF_8,
            source: Some(Source::Buffered(body.into())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true while a body is bound, i.e. another query can run.
    pub fn can_replay(&self) -> bool {
        self.source.is_some()
    }

    /// Extract the normalized text of every element matching each selector.
    ///
    /// Entries in `selectors` may themselves be comma-separated lists; all are
    /// split, trimmed and deduplicated. Text inside one matched element is
    /// concatenated across chunk boundaries and whitespace-normalized; empty
    /// texts are dropped. A selector that does not compile yields no texts.
    pub async fn query(
        &mut self,
        selectors: &[&str],
        replay: Replay,
    ) -> Result<SelectorResult, StripError> {
        let mut names: Vec<String> = Vec::new();
        for list in selectors {
            for selector in split_selector_list(list) {
                if !names.contains(&selector) {
                    names.push(selector);
                }
            }
        }

        let selectors = names.iter().map(|name| get_or_compile(name)).collect();
        let targets = names.iter().map(|_| Target::text_query()).collect();
        let targets = self.run_pass(selectors, targets, replay, "Query").await?;

        let entries = names
            .into_iter()
            .zip(targets)
            .map(|(name, target)| match target {
                Target::Text { out, .. } => (name, out),
                Target::Attribute { .. } => (name, Vec::new()),
            })
            .collect();
        Ok(SelectorResult { entries })
    }

    /// Return `attribute` of the first element matching `selector` that carries
    /// a non-empty value for it, or an empty string.
    pub async fn query_attribute(
        &mut self,
        selector: &str,
        attribute: &str,
        replay: Replay,
    ) -> Result<String, StripError> {
        let target = Target::Attribute {
            name: attribute.to_ascii_lowercase(),
            value: None,
        };
        let targets = self
            .run_pass(
                vec![get_or_compile(selector.trim())],
                vec![target],
                replay,
                "QueryAttribute",
            )
            .await?;
        Ok(targets
            .into_iter()
            .next()
            .and_then(|t| match t {
                Target::Attribute { value, .. } => value,
                Target::Text { .. } => None,
            })
            .unwrap_or_default())
    }

    /// Run one rewriter pass over the bound body.
    ///
    /// The rewriter is not `Send`, so it lives on the blocking pool and is fed
    /// chunks over a channel as they arrive from the network.
    async fn run_pass(
        &mut self,
        selectors: Vec<Option<Selector>>,
        targets: Vec<Target>,
        replay: Replay,
        op: &'static str,
    ) -> Result<Vec<Target>, StripError> {
        let source = self
            .source
            .take()
            .ok_or_else(|| StripError::no_response(op))?;

        let encoding = self.encoding;
        let (tx, rx) = std::sync::mpsc::channel::<Bytes>();
        let worker =
            tokio::task::spawn_blocking(move || rewrite(rx, encoding, selectors, targets, op));

        let kept = match source {
            Source::Buffered(bytes) => {
                let kept = (replay == Replay::Keep).then(|| bytes.clone());
                let _ = tx.send(bytes);
                kept
            }
            Source::Network(mut body) => {
                let mut copy = BytesMut::new();
                while let Some(chunk) = body.next().await {
                    let chunk = chunk?;
                    if replay == Replay::Keep {
                        copy.extend_from_slice(&chunk);
                    }
                    if tx.send(chunk).is_err() {
                        break;
                    }
                }
                (replay == Replay::Keep).then(|| copy.freeze())
            }
        };
        drop(tx);

        let targets = worker.await.map_err(|e| {
            StripError::fetch(
                self.url.as_str(),
                op,
                Some(anyhow::anyhow!("extractor task failed: {}", e)),
            )
        })??;
        self.source = kept.map(Source::Buffered);
        Ok(targets)
    }
}

/// Pass every decoded chunk received on `rx` through a rewriter that feeds
/// the targets, then close the document.
fn rewrite(
    rx: std::sync::mpsc::Receiver<Bytes>,
    encoding: &'static Encoding,
    selectors: Vec<Option<Selector>>,
    targets: Vec<Target>,
    op: &str,
) -> Result<Vec<Target>, StripError> {
    let state = Rc::new(RefCell::new(targets));

    let handlers = selectors
        .into_iter()
        .enumerate()
        .filter_map(|(i, selector)| Some((i, selector?)))
        .map(|(i, selector)| {
            let on_start = Rc::clone(&state);
            let on_text = Rc::clone(&state);
            (
                Cow::Owned(selector),
                ElementContentHandlers::default()
                    .element(element_handler(move |el| {
                        on_start.borrow_mut()[i].enter(el);
                        Ok(())
                    }))
                    .text(text_handler(move |chunk| {
                        on_text.borrow_mut()[i].text(chunk.as_str());
                        Ok(())
                    })),
            )
        })
        .collect();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            strict: false,
            ..Settings::new()
        },
        |_: &[u8]| {},
    );
    let failed = |e: lol_html::errors::RewritingError| {
        StripError::malformed_fragment(op, Some(anyhow::anyhow!("rewriter failed: {}", e)))
    };

    let mut decoder = encoding.new_decoder();
    let mut decode = |bytes: &[u8], last: bool| {
        let capacity = decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 16);
        let mut text = String::with_capacity(capacity);
        let _ = decoder.decode_to_string(bytes, &mut text, last);
        text
    };

    for chunk in rx {
        rewriter.write(decode(&chunk, false).as_bytes()).map_err(failed)?;
    }
    rewriter.write(decode(&[], true).as_bytes()).map_err(failed)?;
    rewriter.end().map_err(failed)?;

    let mut targets = std::mem::take(&mut *state.borrow_mut());
    for target in &mut targets {
        target.flush();
    }
    Ok(targets)
}

/// Pins the closure signature the rewriter expects for element handlers.
fn element_handler<'h, F>(f: F) -> F
where
    F: FnMut(&mut Element<'_, '_>) -> HandlerResult + 'h,
{
    f
}

fn text_handler<'h, F>(f: F) -> F
where
    F: FnMut(&mut TextChunk<'_>) -> HandlerResult + 'h,
{
    f
}

/// Per-selector extraction state.
#[derive(Debug)]
enum Target {
    Text {
        acc: String,
        out: Vec<String>,
    },
    Attribute {
        name: String,
        value: Option<String>,
    },
}

impl Target {
    fn text_query() -> Self {
        Target::Text {
            acc: String::new(),
            out: Vec::new(),
        }
    }

    /// Element boundary: move accumulated text into the output.
    fn flush(&mut self) {
        if let Target::Text { acc, out } = self {
            let cleaned = normalize_whitespace(acc);
            if !cleaned.is_empty() {
                out.push(cleaned);
            }
            acc.clear();
        }
    }

    /// A matching element starts.
    fn enter(&mut self, element: &Element<'_, '_>) {
        match self {
            Target::Text { .. } => self.flush(),
            Target::Attribute { name, value } => {
                if value.is_none() {
                    *value = element.get_attribute(name.as_str()).filter(|v| !v.is_empty());
                }
            }
        }
    }

    /// Text inside a matching element, possibly split mid-word.
    fn text(&mut self, chunk: &str) {
        if let Target::Text { acc, .. } = self {
            acc.push_str(chunk);
        }
    }
}
