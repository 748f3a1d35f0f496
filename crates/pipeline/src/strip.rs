// ABOUTME: Strip resolution: an ordered list of fetch-and-parse strategies tried until one succeeds.
// ABOUTME: Holds the image tie-break, follower parsing, series-name fallback and stream merge rules.

//! Strip resolver.
//!
//! Each [`Strategy`] performs its own fetch and parse. Strategies run one
//! after another in priority order; a failure of any kind advances to the
//! next one and only exhaustion of the list surfaces an error.

use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::client::Client;
use crate::error::StripError;
use crate::events::{find_matches, parse_events, StreamMatch, COMPONENT_STREAM_MIME};
use crate::extractors::stream::Replay;
use crate::linked_data::{
    classify, parse_fragment, parse_published, ComicStory, ImageObject, StructuredRecord,
};
use crate::request::StripRequest;
use crate::result::{StripRecord, StripSeries};

pub const LINKED_DATA_SELECTOR: &str = r#"script[type="application/ld+json"]"#;
pub const SUBTITLE_SELECTOR: &str = r#"h3[class*="Typography"]"#;
pub const BADGE_SELECTOR: &str = r#"img[class*="Badge"]"#;

static FOLLOWERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^By .+ \| (\d+) Followers$").expect("valid followers regex")
});

/// One self-contained way of resolving a strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Server-rendered dated page, linked-data scripts.
    PrimaryHtml,
    /// Same page requested as a component stream.
    StreamProtocol,
    /// Third-party scraping relay running the primary selector for us.
    ProxyRelay,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::PrimaryHtml => "primary-html",
            Strategy::StreamProtocol => "stream-protocol",
            Strategy::ProxyRelay => "proxy-relay",
        }
    }
}

/// Every strip strategy, highest priority first.
pub const STRIP_STRATEGIES: &[Strategy] = &[
    Strategy::PrimaryHtml,
    Strategy::StreamProtocol,
    Strategy::ProxyRelay,
];

/// Try `strategies` in order and return the first record produced.
pub(crate) async fn resolve(
    client: &Client,
    request: &StripRequest,
    strategies: &[Strategy],
) -> Result<StripRecord, StripError> {
    let url = client.page_url(&request.path());
    let mut failures = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        tracing::debug!(strategy = strategy.name(), %request, "trying strategy");
        let attempt = match strategy {
            Strategy::PrimaryHtml => primary_html(client, request, &url).await,
            Strategy::StreamProtocol => stream_protocol(client, request, &url).await,
            Strategy::ProxyRelay => proxy_relay(client, request, &url).await,
        };
        match attempt {
            Ok(record) => {
                tracing::info!(
                    strategy = strategy.name(),
                    %request,
                    image = %record.image_url,
                    "resolved strip"
                );
                return Ok(record);
            }
            Err(err) => {
                tracing::warn!(strategy = strategy.name(), %request, %err, "strategy failed");
                failures.push(format!("{}: {}", strategy.name(), err.code));
            }
        }
    }

    Err(StripError::no_structured_data(
        url,
        "ResolveStrip",
        Some(anyhow::anyhow!(
            "all strategies failed [{}]",
            failures.join(", ")
        )),
    ))
}

async fn primary_html(
    client: &Client,
    request: &StripRequest,
    url: &str,
) -> Result<StripRecord, StripError> {
    const OP: &str = "PrimaryHtml";

    let mut page = client.get_page(url, OP).await?;
    let mut texts = page
        .query(&[LINKED_DATA_SELECTOR, SUBTITLE_SELECTOR], Replay::Keep)
        .await?;
    let icon = page
        .query_attribute(BADGE_SELECTOR, "src", Replay::Final)
        .await?;

    let scripts = texts.take(LINKED_DATA_SELECTOR);
    if scripts.is_empty() {
        return Err(StripError::no_structured_data(
            url,
            OP,
            Some(anyhow::anyhow!("no linked-data scripts on page")),
        ));
    }

    let records = classify(&scripts);
    let selection = select_strip(&records, request.date).ok_or_else(|| {
        StripError::no_structured_data(
            url,
            OP,
            Some(anyhow::anyhow!(
                "no representative image among {} scripts",
                scripts.len()
            )),
        )
    })?;

    let mut record = build_record(request, url, &selection);
    record.series.icon_url = Some(icon).filter(|s| !s.is_empty());
    record.series.followers = parse_followers(texts.get(SUBTITLE_SELECTOR));
    Ok(record)
}

async fn stream_protocol(
    client: &Client,
    request: &StripRequest,
    url: &str,
) -> Result<StripRecord, StripError> {
    const OP: &str = "StreamProtocol";

    let response = client.get(url, &[("rsc", "1")], OP).await?;
    if !response.has_media_type(COMPONENT_STREAM_MIME) {
        return Err(StripError::upstream_http(
            url,
            OP,
            Some(anyhow::anyhow!(
                "expected {}, got {}",
                COMPONENT_STREAM_MIME,
                response.content_type.as_deref().unwrap_or("no content type")
            )),
        ));
    }

    let raw = response.text().await?;
    let events = parse_events(&raw);
    tracing::debug!(url, events = events.len(), "parsed component stream");
    merge_stream_matches(request, url, &find_matches(&events))
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    result: RelayResult,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelayResult {
    Texts(Vec<String>),
    BySelector(HashMap<String, Vec<String>>),
}

async fn proxy_relay(
    client: &Client,
    request: &StripRequest,
    url: &str,
) -> Result<StripRecord, StripError> {
    const OP: &str = "ProxyRelay";

    let relay = client.options().relay_url.as_deref().ok_or_else(|| {
        StripError::no_structured_data(url, OP, Some(anyhow::anyhow!("no relay configured")))
    })?;
    let relay_url = url::Url::parse_with_params(
        relay,
        &[
            ("url", url),
            ("selector", LINKED_DATA_SELECTOR),
            ("scrape", "text"),
        ],
    )
    .map_err(|e| {
        StripError::fetch(relay, OP, Some(anyhow::anyhow!("invalid relay URL: {}", e)))
    })?;

    let body = client.get_external(relay_url.as_str(), OP).await?.text().await?;
    let parsed: RelayResponse = serde_json::from_str(&body).map_err(|e| {
        StripError::upstream_http(
            relay_url.as_str(),
            OP,
            Some(anyhow::anyhow!("unexpected relay response: {}", e)),
        )
    })?;
    let scripts = match parsed.result {
        RelayResult::Texts(texts) => texts,
        RelayResult::BySelector(mut by_selector) => by_selector
            .remove(LINKED_DATA_SELECTOR)
            .unwrap_or_default(),
    };

    let records = classify(&scripts);
    let selection = select_strip(&records, request.date).ok_or_else(|| {
        StripError::no_structured_data(
            url,
            OP,
            Some(anyhow::anyhow!("relay returned no representative image")),
        )
    })?;
    Ok(build_record(request, url, &selection))
}

/// The story and image chosen from a page's linked data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    pub story: Option<&'a ComicStory>,
    pub image: &'a ImageObject,
}

/// Pick the first story and the strip image.
///
/// The image is the first representative candidate published on `date`,
/// falling back to the first representative candidate of any date, since the
/// stored publish date of reprints can disagree with the page date.
pub fn select_strip(records: &[StructuredRecord], date: NaiveDate) -> Option<Selection<'_>> {
    let story = records.iter().find_map(StructuredRecord::as_story);
    let mut candidates = records
        .iter()
        .filter_map(StructuredRecord::as_image)
        .filter(|image| image.is_strip_candidate());

    let first = candidates.clone().next()?;
    let image = candidates
        .find(|image| image.published() == Some(date))
        .unwrap_or(first);
    Some(Selection { story, image })
}

/// Follower count from subtitle texts; the last matching text wins.
pub fn parse_followers<S: AsRef<str>>(candidates: &[S]) -> Option<u64> {
    candidates
        .iter()
        .filter_map(|c| FOLLOWERS_RE.captures(c.as_ref()))
        .filter_map(|caps| caps[1].parse().ok())
        .last()
}

/// Series name: the story's enclosing series, then the story itself, then
/// the part of the image title before the first hyphen.
pub fn series_name(story: Option<&ComicStory>, image_title: &str) -> String {
    let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.trim().is_empty());
    story
        .and_then(|s| s.is_part_of.as_ref().and_then(|p| non_empty(&p.name)))
        .or_else(|| story.and_then(|s| non_empty(&s.name)))
        .unwrap_or_else(|| {
            image_title
                .split('-')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
}

fn build_record(request: &StripRequest, canonical_url: &str, selection: &Selection<'_>) -> StripRecord {
    let Selection { story, image } = *selection;
    let title = image
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| request.slug.clone());
    let author = image
        .author_name()
        .or_else(|| story.and_then(ComicStory::author_name))
        .unwrap_or_default()
        .to_string();
    let published = story
        .and_then(ComicStory::published)
        .or_else(|| image.published())
        .unwrap_or(request.date);

    StripRecord {
        canonical_url: canonical_url.to_string(),
        image_url: image.content_url().unwrap_or_default().to_string(),
        published,
        series: StripSeries {
            name: series_name(story, &title),
            author,
            genre: story.and_then(|s| s.genre.clone()),
            language: story.and_then(|s| s.in_language.clone()),
            icon_url: None,
            followers: None,
        },
        title,
    }
}

/// Fold component-stream matches into a record, in encounter order.
///
/// The last comic payload wins as a whole: its URL is the image and its date,
/// when it parses, is the published date. Linked-data images overwrite title
/// and author and supply the image URL only when no payload was seen.
pub fn merge_stream_matches(
    request: &StripRequest,
    canonical_url: &str,
    matches: &[StreamMatch],
) -> Result<StripRecord, StripError> {
    let mut title = request.slug.clone();
    let mut author = String::new();
    let mut payload: Option<(&str, Option<&str>)> = None;
    let mut linked_image: Option<String> = None;
    let mut story: Option<ComicStory> = None;

    for m in matches {
        match m {
            StreamMatch::ComicPayload { url, date } => {
                payload = Some((url.as_str(), date.as_deref()));
            }
            StreamMatch::LinkedData(raw) => match parse_fragment(raw) {
                Ok(StructuredRecord::ImageObject(image)) => {
                    if let Some(name) = image.name.as_deref().filter(|n| !n.is_empty()) {
                        title = name.to_string();
                    }
                    if let Some(name) = image.author_name() {
                        author = name.to_string();
                    }
                    if linked_image.is_none() {
                        linked_image = image.content_url().map(str::to_string);
                    }
                }
                Ok(StructuredRecord::ComicStory(s)) => {
                    story.get_or_insert(s);
                }
                Ok(StructuredRecord::ComicSeries(_)) => {}
                Err(err) => tracing::debug!(%err, "dropping stream linked-data fragment"),
            },
        }
    }

    let published = payload
        .and_then(|(_, date)| date)
        .and_then(parse_published)
        .unwrap_or(request.date);
    let image_url = payload
        .map(|(url, _)| url.to_string())
        .or(linked_image)
        .ok_or_else(|| {
            StripError::no_structured_data(
                canonical_url,
                "StreamProtocol",
                Some(anyhow::anyhow!("no comic payload in stream")),
            )
        })?;
    if author.is_empty() {
        if let Some(name) = story.as_ref().and_then(ComicStory::author_name) {
            author = name.to_string();
        }
    }

    Ok(StripRecord {
        canonical_url: canonical_url.to_string(),
        image_url,
        published,
        series: StripSeries {
            name: series_name(story.as_ref(), &title),
            author,
            genre: story.as_ref().and_then(|s| s.genre.clone()),
            language: story.as_ref().and_then(|s| s.in_language.clone()),
            icon_url: None,
            followers: None,
        },
        title,
    })
}
