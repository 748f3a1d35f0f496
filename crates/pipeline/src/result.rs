// ABOUTME: Normalized records produced by the pipeline: StripRecord and SeriesRecord.
// ABOUTME: Serialized with camelCase keys so JSON adapters can emit them verbatim.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Series details attached to a single strip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripSeries {
    pub name: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
}

/// One day's installment of a comic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StripRecord {
    pub title: String,
    pub canonical_url: String,
    pub image_url: String,
    /// Serialized as `YYYY-MM-DD`.
    pub published: NaiveDate,
    pub series: StripSeries,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Banners {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hero: Option<String>,
    pub social: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesAuthor {
    pub name: String,
    pub bio: String,
    /// Always serialized, `null` when the creator has no picture.
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Character {
    pub name: String,
    pub bio: String,
    pub image_url: String,
}

/// Aggregate "about" information for a comic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRecord {
    pub title: String,
    pub canonical_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    pub genre: String,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers: Option<u64>,
    pub banners: Banners,
    pub author: SeriesAuthor,
    pub characters: Vec<Character>,
}
