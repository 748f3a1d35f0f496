// ABOUTME: Series resolution from a comic's "about" page into a SeriesRecord.
// ABOUTME: Single strategy: any fetch or parse failure surfaces to the caller.

use crate::client::Client;
use crate::error::StripError;
use crate::extractors::stream::Replay;
use crate::linked_data::{classify, ImageObject, StructuredRecord};
use crate::result::{Banners, Character, SeriesAuthor, SeriesRecord};
use crate::strip::{parse_followers, BADGE_SELECTOR, LINKED_DATA_SELECTOR, SUBTITLE_SELECTOR};

pub const DESCRIPTION_SELECTOR: &str = r#"div[class*="RichTextParser"]>p"#;
pub const CREATOR_SELECTOR: &str =
    r#"div[class*="AboutCreator"]>script[type="application/ld+json"]"#;
pub const CHARACTER_SELECTOR: &str =
    r#"div[class*="AboutCharacter"]>script[type="application/ld+json"]"#;

pub(crate) async fn resolve(client: &Client, slug: &str) -> Result<SeriesRecord, StripError> {
    const OP: &str = "ResolveSeries";

    let url = client.page_url(&format!("/{}/about", slug));
    let mut page = client.get_page(&url, OP).await?;
    let mut texts = page
        .query(
            &[
                LINKED_DATA_SELECTOR,
                DESCRIPTION_SELECTOR,
                SUBTITLE_SELECTOR,
                CREATOR_SELECTOR,
                CHARACTER_SELECTOR,
            ],
            Replay::Keep,
        )
        .await?;
    let icon = page
        .query_attribute(BADGE_SELECTOR, "src", Replay::Final)
        .await?;

    let scripts = texts.take(LINKED_DATA_SELECTOR);
    if scripts.is_empty() {
        return Err(StripError::no_structured_data(
            &url,
            OP,
            Some(anyhow::anyhow!("no linked-data scripts on about page")),
        ));
    }
    let records = classify(&scripts);
    let series = records
        .iter()
        .find_map(StructuredRecord::as_series)
        .ok_or_else(|| {
            StripError::no_structured_data(
                &url,
                OP,
                Some(anyhow::anyhow!("no ComicSeries record for {}", slug)),
            )
        })?;

    let creator = classify(&texts.take(CREATOR_SELECTOR))
        .into_iter()
        .find_map(into_image);
    let characters = classify(&texts.take(CHARACTER_SELECTOR))
        .into_iter()
        .filter_map(into_image)
        .map(|c| Character {
            image_url: c.any_url().unwrap_or_default().to_string(),
            name: c.name.unwrap_or_default(),
            bio: c.description.unwrap_or_default(),
        })
        .collect();

    // Positional: the first representative image anywhere on the page.
    let hero = records
        .iter()
        .filter_map(StructuredRecord::as_image)
        .find(|image| image.representative_of_page)
        .and_then(|image| image.any_url().map(str::to_string));

    let description = texts
        .get(DESCRIPTION_SELECTOR)
        .first()
        .cloned()
        .or_else(|| series.description.clone());

    let record = SeriesRecord {
        title: series.name.clone().unwrap_or_else(|| slug.to_string()),
        canonical_url: series.url.clone().unwrap_or_else(|| url.clone()),
        description,
        icon_url: Some(icon).filter(|s| !s.is_empty()),
        genre: series.genre.clone().unwrap_or_default(),
        language: series.in_language.clone().unwrap_or_default(),
        followers: parse_followers(texts.get(SUBTITLE_SELECTOR)),
        banners: Banners {
            hero,
            social: series.image.clone().unwrap_or_default(),
        },
        author: SeriesAuthor {
            name: series.author_name().unwrap_or_default().to_string(),
            bio: creator
                .as_ref()
                .and_then(|c| c.description.clone())
                .unwrap_or_default(),
            image_url: creator
                .as_ref()
                .and_then(|c| c.any_url())
                .map(str::to_string),
        },
        characters,
    };
    tracing::info!(slug, characters = record.characters.len(), "resolved series");
    Ok(record)
}

fn into_image(record: StructuredRecord) -> Option<ImageObject> {
    match record {
        StructuredRecord::ImageObject(image) => Some(image),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use pretty_assertions::assert_eq;

    use crate::client::Client;
    use crate::result::Character;

    const ABOUT_PAGE: &str = r#"<!doctype html>
<html><head>
<script type="application/ld+json">{"@type":"ComicSeries","name":"Garfield","url":"https://www.gocomics.com/garfield","description":"Fallback description","genre":"Humor","inLanguage":"en","author":[{"@type":"Person","name":"Jim Davis"}],"image":"https://example.com/social.png"}</script>
<script type="application/ld+json">{"@type":"ImageObject","name":"banner","contentUrl":"https://example.com/hero.png","representativeOfPage":true}</script>
</head><body>
<img class="Badge_icon" src="https://example.com/badge.png">
<h3 class="Typography_t">By Jim Davis | 4200 Followers</h3>
<div class="RichTextParser_x"><p>
  Lasagna   enthusiast.
</p><p>Second paragraph.</p></div>
<div class="AboutCreator_y"><script type="application/ld+json">{"@type":"ImageObject","name":"Jim Davis","description":"Cartoonist.","url":"https://example.com/jim.png"}</script></div>
<div class="AboutCharacter_z"><script type="application/ld+json">{"@type":"ImageObject","name":"Odie","description":"A dog.","contentUrl":"https://example.com/odie.png"}</script></div>
<div class="AboutCharacter_z"><script type="application/ld+json">{"@type":"ImageObject","name":"Nermal","description":"A kitten.","url":"https://example.com/nermal.png"}</script></div>
</body></html>"#;

    #[tokio::test]
    async fn resolves_about_page() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/garfield/about");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(ABOUT_PAGE);
        });
        let client = Client::builder().origin(server.base_url()).build().unwrap();

        let series = client.series("garfield").await.unwrap();
        mock.assert();

        assert_eq!(series.title, "Garfield");
        assert_eq!(series.canonical_url, "https://www.gocomics.com/garfield");
        assert_eq!(series.description.as_deref(), Some("Lasagna enthusiast."));
        assert_eq!(series.icon_url.as_deref(), Some("https://example.com/badge.png"));
        assert_eq!(series.followers, Some(4200));
        assert_eq!(series.banners.hero.as_deref(), Some("https://example.com/hero.png"));
        assert_eq!(series.banners.social, "https://example.com/social.png");
        assert_eq!(series.author.name, "Jim Davis");
        assert_eq!(series.author.bio, "Cartoonist.");
        assert_eq!(series.author.image_url.as_deref(), Some("https://example.com/jim.png"));
        assert_eq!(
            series.characters,
            vec![
                Character {
                    name: "Odie".to_string(),
                    bio: "A dog.".to_string(),
                    image_url: "https://example.com/odie.png".to_string(),
                },
                Character {
                    name: "Nermal".to_string(),
                    bio: "A kitten.".to_string(),
                    image_url: "https://example.com/nermal.png".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_series_record_is_a_hard_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/garfield/about");
            then.status(200).body(
                r#"<html><head><script type="application/ld+json">{"@type":"ImageObject","name":"x"}</script></head></html>"#,
            );
        });
        let client = Client::builder().origin(server.base_url()).build().unwrap();

        let err = client.series("garfield").await.unwrap_err();
        assert!(err.is_no_structured_data());
    }

    #[tokio::test]
    async fn page_without_linked_data_is_a_hard_failure() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/garfield/about");
            then.status(200).body(
                r#"<html><body><h3 class="Typography_t">By Jim Davis | 10 Followers</h3></body></html>"#,
            );
        });
        let client = Client::builder().origin(server.base_url()).build().unwrap();

        let err = client.series("garfield").await.unwrap_err();
        assert!(err.is_no_structured_data());
        assert!(err.to_string().contains("no linked-data scripts"));
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn upstream_failure_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/garfield/about");
            then.status(500);
        });
        let client = Client::builder().origin(server.base_url()).build().unwrap();

        let err = client.series("garfield").await.unwrap_err();
        assert!(err.is_upstream_http());
        mock.assert_hits(1);
    }
}
