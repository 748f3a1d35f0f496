// ABOUTME: Presentation adapters over resolved strips: unfurl HTML, federated status JSON, redirects.
// ABOUTME: Also derives the host-independent cache key used in front of every route.

use chrono::{Duration, NaiveTime};
use serde_json::{json, Value};

use crate::error::StripError;
use crate::result::StripRecord;
use crate::snowcode::{self, Snowcode};

pub const THEME_COLOR: &str = "#2F46AB";
pub const SITE_NAME: &str = "FxGoComics";

/// Hours added to the published date to form the status timestamp.
const STATUS_HOUR_OFFSET: i64 = 10;

/// One `<meta>` or `<link>` element with its attributes in output order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
    element: &'static str,
    attrs: Vec<(&'static str, String)>,
}

impl Tag {
    fn meta(key: &'static str, name: &str, content: impl Into<String>) -> Self {
        Self {
            element: "meta",
            attrs: vec![(key, name.to_string()), ("content", content.into())],
        }
    }

    fn link(attrs: Vec<(&'static str, String)>) -> Self {
        Self {
            element: "link",
            attrs,
        }
    }

    fn render(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.element);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&html_escape::encode_double_quoted_attribute(value));
            out.push('"');
        }
        out.push('>');
    }
}

fn icon(origin: &str, file: &str, sizes: &str, mime: &str) -> Tag {
    Tag::link(vec![
        ("href", format!("{}/assets/{}", origin, file)),
        ("rel", "icon".to_string()),
        ("sizes", sizes.to_string()),
        ("type", mime.to_string()),
    ])
}

/// Build the unfurl page for a strip: preview meta tags plus an immediate
/// refresh to the canonical page for human visitors.
///
/// `origin` is this service's own origin, used for icons and the
/// activity-stream alternate link.
pub fn render_embed(strip: &StripRecord, slug: &str, origin: &str) -> Result<String, StripError> {
    let origin = origin.trim_end_matches('/');
    let token = snowcode::encode(&Snowcode::new(
        slug,
        strip.published.format("%Y-%m-%d").to_string(),
    ))?;
    let display = format!("{} (@{})", strip.series.name, slug);

    let tags = [
        Tag::meta("name", "theme-color", THEME_COLOR),
        Tag::meta("property", "og:image", strip.image_url.as_str()),
        Tag::meta(
            "http-equiv",
            "refresh",
            format!("0; url={}", strip.canonical_url),
        ),
        Tag::link(vec![
            ("rel", "canonical".to_string()),
            ("href", strip.canonical_url.clone()),
        ]),
        Tag::meta("property", "og:url", strip.canonical_url.as_str()),
        Tag::meta("property", "twitter:site", "gocomics"),
        Tag::meta("property", "twitter:card", "summary_large_image"),
        Tag::meta("property", "twitter:title", display.as_str()),
        Tag::meta("property", "og:title", display.as_str()),
        Tag::meta("property", "og:site_name", SITE_NAME),
        icon(origin, "fxgocomics.svg", "svgxsvg", "image/svg+xml"),
        icon(origin, "fxgocomics-64w.png", "64x64", "image/png"),
        icon(origin, "fxgocomics-32w.png", "32x32", "image/png"),
        icon(origin, "fxgocomics-16w.png", "16x16", "image/png"),
        Tag::link(vec![
            ("rel", "alternate".to_string()),
            ("type", "application/activity+json".to_string()),
            ("href", format!("{}/users/{}/statuses/{}", origin, slug, token)),
        ]),
    ];

    let mut html = String::from("<!doctype html><html lang=\"en\"><head><meta charset=\"UTF-8\"><title>");
    html.push_str(&html_escape::encode_text(&strip.title));
    html.push_str("</title>");
    for tag in &tags {
        tag.render(&mut html);
    }
    html.push_str("</head><body><p>Hello, you should be redirected shortly. If not, <a href=\"");
    html.push_str(&html_escape::encode_double_quoted_attribute(&strip.canonical_url));
    html.push_str("\" rel=\"noreferrer\">click here.</a></p></body></html>");
    Ok(html)
}

/// Mastodon-style status object describing one strip.
pub fn status_document(strip: &StripRecord, slug: &str, token: &str, origin: &str) -> Value {
    let created_at = (strip.published.and_time(NaiveTime::MIN)
        + Duration::hours(STATUS_HOUR_OFFSET))
    .and_utc()
    .format("%Y-%m-%dT%H:%M:%S%.3fZ")
    .to_string();
    let avatar = strip
        .series
        .icon_url
        .clone()
        .unwrap_or_else(|| format!("{}/assets/fxgocomics-64w.png", origin.trim_end_matches('/')));

    json!({
        "id": token,
        "url": strip.canonical_url,
        "uri": strip.canonical_url,
        "created_at": created_at,
        "edited_at": null,
        "reblog": null,
        "in_reply_to_account_id": null,
        "language": strip.series.language.as_deref().unwrap_or("en"),
        "content": "",
        "spoiler_text": "",
        "visibility": "public",
        "application": { "name": "GoComics", "website": null },
        "media_attachments": [{
            "id": token,
            "type": "image",
            "url": strip.image_url,
            "remote_url": null,
            "preview_url": null,
            "preview_remote_url": null,
            "text_url": null,
            "description": null,
            "meta": { "original": { "width": 0, "height": 0 } },
        }],
        "account": {
            "id": token,
            "display_name": strip.series.name,
            "username": slug,
            "acct": slug,
            "url": strip.canonical_url,
            "uri": strip.canonical_url,
            "created_at": created_at,
            "locked": false,
            "bot": false,
            "discoverable": true,
            "indexable": false,
            "group": false,
            "avatar": avatar,
            "avatar_static": avatar,
            "header": null,
            "header_static": null,
            "followers_count": strip.series.followers.unwrap_or(0),
            "following_count": 0,
            "statuses_count": 0,
            "hide_collections": false,
            "noindex": false,
            "emojis": [],
            "roles": [],
            "fields": [],
        },
        "mentions": [],
        "tags": [],
        "emojis": [],
        "card": null,
        "poll": null,
    })
}

/// Where a status link for `token` should send a browser.
pub fn status_redirect(token: &str, origin: &str) -> Result<String, StripError> {
    snowcode::redirect_target(token, origin)
}

/// Cache key for a request URL: the path on a fixed host, query and host dropped.
pub fn cache_key(request_url: &str) -> Result<String, StripError> {
    let parsed = url::Url::parse(request_url).map_err(|e| {
        StripError::validation(
            "CacheKey",
            Some(anyhow::anyhow!("invalid request URL {:?}: {}", request_url, e)),
        )
    })?;
    Ok(format!("http://localhost{}", parsed.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::StripSeries;
    use chrono::NaiveDate;

    fn strip() -> StripRecord {
        StripRecord {
            title: "Garfield & \"Friends\"".to_string(),
            canonical_url: "https://www.gocomics.com/garfield/2024/1/2".to_string(),
            image_url: "https://example.com/strip.gif".to_string(),
            published: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            series: StripSeries {
                name: "Garfield".to_string(),
                author: "Jim Davis".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn embed_contains_preview_tags_and_escapes_values() {
        let html = render_embed(&strip(), "garfield", "https://fx.example/").unwrap();
        assert!(html.contains(r#"<meta property="og:image" content="https://example.com/strip.gif">"#));
        assert!(html.contains(r#"<meta property="og:title" content="Garfield (@garfield)">"#));
        assert!(html.contains(
            r#"<meta http-equiv="refresh" content="0; url=https://www.gocomics.com/garfield/2024/1/2">"#
        ));
        assert!(html.contains(r#"<link rel="canonical" href="https://www.gocomics.com/garfield/2024/1/2">"#));
        assert!(html.contains(r#"href="https://fx.example/assets/fxgocomics-16w.png""#));
        assert!(html.contains("<title>Garfield &amp; "));

        let token = snowcode::encode(&Snowcode::new("garfield", "2024-01-02")).unwrap();
        assert!(html.contains(&format!(
            r#"href="https://fx.example/users/garfield/statuses/{}""#,
            token
        )));
    }

    #[test]
    fn attribute_values_cannot_break_out() {
        let mut hostile = strip();
        hostile.series.name = r#"Bad "Name" <x>"#.to_string();
        let html = render_embed(&hostile, "garfield", "https://fx.example").unwrap();
        assert!(html.contains(
            r#"<meta property="og:title" content="Bad &quot;Name&quot; &lt;x&gt; (@garfield)">"#
        ));
        assert!(!html.contains("<x>"));
    }

    #[test]
    fn status_uses_documented_fallbacks() {
        let doc = status_document(&strip(), "garfield", "tok", "https://fx.example");
        assert_eq!(doc["created_at"], "2024-01-02T10:00:00.000Z");
        assert_eq!(doc["media_attachments"][0]["url"], "https://example.com/strip.gif");
        assert_eq!(doc["account"]["avatar"], "https://fx.example/assets/fxgocomics-64w.png");
        assert_eq!(doc["account"]["followers_count"], 0);
        assert_eq!(doc["account"]["display_name"], "Garfield");

        let mut with_icon = strip();
        with_icon.series.icon_url = Some("https://example.com/badge.png".to_string());
        with_icon.series.followers = Some(42);
        let doc = status_document(&with_icon, "garfield", "tok", "https://fx.example");
        assert_eq!(doc["account"]["avatar_static"], "https://example.com/badge.png");
        assert_eq!(doc["account"]["followers_count"], 42);
    }

    #[test]
    fn cache_key_ignores_host_and_query() {
        assert_eq!(
            cache_key("https://www.fxgocomics.com/garfield/2024/1/2?bust=1").unwrap(),
            "http://localhost/garfield/2024/1/2"
        );
        assert_eq!(
            cache_key("https://fxgocomics.com/garfield/2024/1/2").unwrap(),
            cache_key("https://www.fxgocomics.com/garfield/2024/1/2").unwrap()
        );
        assert!(cache_key("not a url").unwrap_err().is_validation());
    }

    #[test]
    fn status_redirect_points_upstream() {
        let token = snowcode::encode(&Snowcode::new("garfield", "2024-1-2")).unwrap();
        assert_eq!(
            status_redirect(&token, "https://www.gocomics.com").unwrap(),
            "https://www.gocomics.com/garfield/2024/1/2"
        );
    }
}
