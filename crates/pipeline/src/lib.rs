// ABOUTME: Library entry point for the fxcomics resolution pipeline.
// ABOUTME: Re-exports the public API: Client, ClientBuilder, Options, records, errors, codec and adapters.

//! fxcomics pipeline - resolves daily comic strips and series metadata from
//! the upstream comics site.
//!
//! Strips are resolved through an ordered list of strategies (server-rendered
//! page, component stream, optional scraping relay). Series pages and recent
//! calendars build on the same extractor and classifier.
//!
//! # Example
//!
//! ```no_run
//! use fxcomics_pipeline::{Client, StripError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StripError> {
//!     let client = Client::builder().build()?;
//!     let strip = client.strip("garfield", "2024-01-02").await?;
//!     println!("{}", strip.image_url);
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod client;
pub mod error;
pub mod events;
pub mod extractors;
pub mod linked_data;
pub mod options;
pub mod present;
pub mod request;
pub mod resource;
pub mod result;
pub mod series;
pub mod snowcode;
pub mod strip;

pub use crate::calendar::CalendarWindow;
pub use crate::client::Client;
pub use crate::error::{ErrorCode, StripError};
pub use crate::events::{find_matches, parse_events, StreamEvent, StreamMatch};
pub use crate::extractors::stream::{Page, Replay, SelectorResult};
pub use crate::linked_data::{classify, StructuredRecord};
pub use crate::options::{ClientBuilder, HeaderProfile, Options};
pub use crate::request::StripRequest;
pub use crate::result::{SeriesRecord, StripRecord, StripSeries};
pub use crate::snowcode::{decode, encode, Snowcode};
pub use crate::strip::Strategy;
