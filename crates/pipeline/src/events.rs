// ABOUTME: Decodes the site's line-delimited component-stream payload into typed events.
// ABOUTME: Walks event trees recursively to find linked-data scripts and embedded comic payloads.

//! Component-stream events.
//!
//! The alternate delivery mode answers with lines of `<id>:<json>`. Row ids
//! are hexadecimal. Lines that carry no id, or whose payload is not JSON
//! (module references, hints), are skipped.
//!
//! Rendered elements appear as arrays of the form
//! `["$", "<tag>", <key>, {<props>}]`, nested arbitrarily deep.

use serde_json::Value;

/// Media type of component-stream responses.
pub const COMPONENT_STREAM_MIME: &str = "text/x-component";

/// `type` attribute marking a script body as linked data.
pub const LINKED_DATA_MIME: &str = "application/ld+json";

/// One decoded line.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    pub id: u64,
    pub payload: Value,
}

/// A signal found while walking event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMatch {
    /// Body of a `script` element typed as linked data.
    LinkedData(String),
    /// An embedded comic object carrying the image URL and its date.
    ComicPayload { url: String, date: Option<String> },
}

/// Parse newline-delimited `<id>:<json>` records, skipping anything else.
pub fn parse_events(raw: &str) -> Vec<StreamEvent> {
    raw.lines()
        .filter_map(|line| {
            let (id, payload) = line.split_once(':')?;
            if id.is_empty() {
                return None;
            }
            let id = u64::from_str_radix(id.trim(), 16).ok()?;
            match serde_json::from_str(payload) {
                Ok(payload) => Some(StreamEvent { id, payload }),
                Err(err) => {
                    tracing::trace!(id, %err, "skipping non-JSON stream row");
                    None
                }
            }
        })
        .collect()
}

/// Collect every match across `events`, in encounter order.
pub fn find_matches(events: &[StreamEvent]) -> Vec<StreamMatch> {
    let mut out = Vec::new();
    for event in events {
        walk(&event.payload, &mut out);
    }
    out
}

fn walk(value: &Value, out: &mut Vec<StreamMatch>) {
    match value {
        Value::Array(items) => {
            if let Some(body) = linked_data_script(items) {
                out.push(StreamMatch::LinkedData(body.to_string()));
            }
            for item in items {
                walk(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(payload) = map.get("comic").and_then(comic_payload) {
                out.push(payload);
            }
            for value in map.values() {
                walk(value, out);
            }
        }
        _ => {}
    }
}

/// `["$", "script", _, {"type": "application/ld+json", "dangerouslySetInnerHTML": {"__html": ...}}]`
fn linked_data_script(items: &[Value]) -> Option<&str> {
    if items.first()?.as_str()? != "$" || items.get(1)?.as_str()? != "script" {
        return None;
    }
    let props = items.get(3)?.as_object()?;
    if props.get("type")?.as_str()? != LINKED_DATA_MIME {
        return None;
    }
    props
        .get("dangerouslySetInnerHTML")?
        .get("__html")?
        .as_str()
}

fn comic_payload(value: &Value) -> Option<StreamMatch> {
    let url = value.get("url")?.as_str().filter(|u| !u.is_empty())?;
    let date = value.get("date").and_then(Value::as_str).map(str::to_string);
    Some(StreamMatch::ComicPayload {
        url: url.to_string(),
        date,
    })
}
