// ABOUTME: Classifies raw JSON-LD fragments into the closed set of comic structured-data records.
// ABOUTME: Also holds the lenient date parsing used for the records' publication dates.

//! Linked-data classification.
//!
//! Pages describe themselves with `application/ld+json` scripts. Only three
//! `@type`s matter here; anything else, and any fragment that is not valid
//! JSON, is dropped without failing the caller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StripError;

/// A person reference (`{"@type": "Person", "name": ...}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Person {
    pub name: Option<String>,
}

/// The enclosing series a story belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartOf {
    pub name: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComicSeries {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub genre: Option<String>,
    pub in_language: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub author: Vec<Person>,
    #[serde(deserialize_with = "image_url")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ComicStory {
    pub name: Option<String>,
    pub url: Option<String>,
    pub genre: Option<String>,
    pub in_language: Option<String>,
    /// `YYYY-MM-DD`
    pub date_published: Option<String>,
    pub is_part_of: Option<PartOf>,
    #[serde(deserialize_with = "one_or_many")]
    pub author: Vec<Person>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageObject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub content_url: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub author: Vec<Person>,
    /// Usually `MMM D, YYYY`.
    pub date_published: Option<String>,
    pub representative_of_page: bool,
}

impl ImageObject {
    /// The image's content URL when present and non-empty.
    pub fn content_url(&self) -> Option<&str> {
        self.content_url.as_deref().filter(|u| !u.is_empty())
    }

    /// Content URL, falling back to the page URL.
    pub fn any_url(&self) -> Option<&str> {
        self.content_url()
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
    }

    pub fn author_name(&self) -> Option<&str> {
        first_name(&self.author)
    }

    pub fn published(&self) -> Option<NaiveDate> {
        self.date_published.as_deref().and_then(parse_published)
    }

    /// Representative-of-page with a usable content URL.
    pub fn is_strip_candidate(&self) -> bool {
        self.representative_of_page && self.content_url().is_some()
    }
}

impl ComicStory {
    pub fn published(&self) -> Option<NaiveDate> {
        self.date_published.as_deref().and_then(parse_published)
    }

    pub fn author_name(&self) -> Option<&str> {
        first_name(&self.author)
    }
}

impl ComicSeries {
    pub fn author_name(&self) -> Option<&str> {
        first_name(&self.author)
    }
}

fn first_name(people: &[Person]) -> Option<&str> {
    people
        .iter()
        .filter_map(|p| p.name.as_deref())
        .find(|n| !n.is_empty())
}

/// A classified linked-data fragment, discriminated by `@type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum StructuredRecord {
    ComicSeries(ComicSeries),
    ComicStory(ComicStory),
    ImageObject(ImageObject),
}

impl StructuredRecord {
    pub fn as_series(&self) -> Option<&ComicSeries> {
        match self {
            StructuredRecord::ComicSeries(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_story(&self) -> Option<&ComicStory> {
        match self {
            StructuredRecord::ComicStory(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageObject> {
        match self {
            StructuredRecord::ImageObject(i) => Some(i),
            _ => None,
        }
    }
}

/// Parse one fragment. Unknown `@type`s fail like malformed JSON does.
pub fn parse_fragment(raw: &str) -> Result<StructuredRecord, StripError> {
    serde_json::from_str(raw).map_err(|e| {
        StripError::malformed_fragment("ClassifyFragment", Some(anyhow::Error::new(e)))
    })
}

/// Classify fragments independently, keeping input order and dropping any
/// fragment that does not parse into a known record.
pub fn classify<S: AsRef<str>>(fragments: &[S]) -> Vec<StructuredRecord> {
    fragments
        .iter()
        .filter_map(|raw| match parse_fragment(raw.as_ref()) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(%err, "dropping linked-data fragment");
                None
            }
        })
        .collect()
}

/// Parse a publication date, accepting ISO dates, RFC 3339 timestamps and
/// the long-form `January 2, 2024` style the site uses on image records.
pub fn parse_published(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }

    // Date-only forms are parsed without a timezone so the day never shifts.
    const LOOSE_PATTERNS: &[&str] = &[
        "%B %e, %Y", // January 2, 2024
        "%B %d, %Y", // January 02, 2024
        "%b %e, %Y", // Jan 2, 2024
        "%b %d, %Y", // Jan 02, 2024
        "%e %B %Y",  // 2 January 2024
        "%d %b %Y",  // 02 Jan 2024
        "%Y-%m-%dT%H:%M:%S",
    ];
    for pat in LOOSE_PATTERNS {
        if let Ok(date) = NaiveDate::parse_from_str(s, pat) {
            return Some(date);
        }
    }

    dateparser::parse(s)
        .ok()
        .map(|dt: DateTime<Utc>| dt.date_naive())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<Person>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Person),
        Many(Vec<Person>),
        Name(String),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(p)) => vec![p],
        Some(OneOrMany::Many(v)) => v,
        Some(OneOrMany::Name(name)) => vec![Person { name: Some(name) }],
    })
}

fn image_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ImageRef {
        Url(String),
        Object {
            #[serde(default, rename = "contentUrl")]
            content_url: Option<String>,
            #[serde(default)]
            url: Option<String>,
        },
    }

    Ok(match Option::<ImageRef>::deserialize(deserializer)? {
        None => None,
        Some(ImageRef::Url(u)) => Some(u),
        Some(ImageRef::Object { content_url, url }) => content_url.or(url),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_known_types_in_order() {
        let fragments = [
            r#"{"@context": "https://schema.org", "@type": "ComicSeries", "name": "Garfield", "author": [{"@type": "Person", "name": "Jim Davis"}], "image": "https://example.com/social.png"}"#,
            r#"{"@type": "ImageObject", "name": "Garfield - January 2, 2024", "contentUrl": "https://example.com/strip.gif", "author": {"@type": "Person", "name": "Jim Davis"}, "datePublished": "January 2, 2024", "representativeOfPage": true}"#,
            r#"{"@type": "ComicStory", "name": "Garfield", "datePublished": "2024-01-02", "isPartOf": {"@type": "ComicSeries", "name": "Garfield"}}"#,
        ];

        let records = classify(&fragments);
        assert_eq!(records.len(), 3);

        let series = records[0].as_series().unwrap();
        assert_eq!(series.author_name(), Some("Jim Davis"));
        assert_eq!(series.image.as_deref(), Some("https://example.com/social.png"));

        let image = records[1].as_image().unwrap();
        assert!(image.is_strip_candidate());
        assert_eq!(image.author_name(), Some("Jim Davis"));
        assert_eq!(image.published(), NaiveDate::from_ymd_opt(2024, 1, 2));

        let story = records[2].as_story().unwrap();
        assert_eq!(story.is_part_of.as_ref().unwrap().name.as_deref(), Some("Garfield"));
        assert_eq!(story.published(), NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn malformed_and_unknown_fragments_are_dropped() {
        let fragments = [
            "{not json",
            r#"{"@type": "BreadcrumbList", "itemListElement": []}"#,
            r#"{"name": "no discriminator"}"#,
            r#"{"@type": "ImageObject", "name": "kept"}"#,
        ];
        let records = classify(&fragments);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].as_image().unwrap().name.as_deref(), Some("kept"));
    }

    #[test]
    fn parse_fragment_reports_malformed_fragment() {
        let err = parse_fragment("[]").unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MalformedFragment);
    }

    #[test]
    fn image_without_content_url_is_not_a_candidate() {
        let image = ImageObject {
            representative_of_page: true,
            url: Some("https://example.com/page".to_string()),
            ..Default::default()
        };
        assert!(!image.is_strip_candidate());
        assert_eq!(image.any_url(), Some("https://example.com/page"));
    }

    #[test]
    fn series_image_may_be_an_object() {
        let records = classify(&[
            r#"{"@type": "ComicSeries", "name": "X", "image": {"@type": "ImageObject", "url": "https://example.com/i.png"}}"#,
        ]);
        assert_eq!(
            records[0].as_series().unwrap().image.as_deref(),
            Some("https://example.com/i.png")
        );
    }

    #[test]
    fn published_date_formats() {
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2);
        assert_eq!(parse_published("2024-01-02"), jan2);
        assert_eq!(parse_published("January 2, 2024"), jan2);
        assert_eq!(parse_published("Jan 2, 2024"), jan2);
        assert_eq!(parse_published("2024-01-02T12:00:00Z"), jan2);
        assert_eq!(parse_published(""), None);
        assert_eq!(parse_published("not a date"), None);
    }
}
