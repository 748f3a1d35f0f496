// ABOUTME: Calendar aggregation over a short window of recent dates for one comic.
// ABOUTME: Resolves dates newest first and stops at the first date that cannot be resolved.

use chrono::{Duration, NaiveDate};

use crate::client::Client;
use crate::error::StripError;
use crate::request::{validate_slug, StripRequest};
use crate::result::StripRecord;
use crate::strip::{self, Strategy};

/// Days before `to` included in the default window.
pub const WINDOW_DAYS: i64 = 3;

/// The relay is left out of this path; each date gets only the site's own strategies.
pub const CALENDAR_STRATEGIES: &[Strategy] = &[Strategy::PrimaryHtml, Strategy::StreamProtocol];

/// An inclusive date range for one comic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarWindow {
    pub slug: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl CalendarWindow {
    /// The window `[today - 3 days, today]`.
    pub fn ending(slug: impl Into<String>, today: NaiveDate) -> Result<Self, StripError> {
        let slug = slug.into();
        validate_slug(&slug)?;
        Ok(Self {
            slug,
            from: today - Duration::days(WINDOW_DAYS),
            to: today,
        })
    }

    /// Every date in the window, newest first.
    pub fn dates_newest_first(&self) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut day = self.to;
        while day >= self.from {
            dates.push(day);
            match day.pred_opt() {
                Some(prev) => day = prev,
                None => break,
            }
        }
        dates
    }
}

pub(crate) async fn resolve(client: &Client, window: &CalendarWindow) -> Vec<StripRecord> {
    let mut entries = Vec::new();
    for date in window.dates_newest_first() {
        let attempt = match StripRequest::new(window.slug.as_str(), date) {
            Ok(request) => strip::resolve(client, &request, CALENDAR_STRATEGIES).await,
            Err(err) => Err(err),
        };
        match attempt {
            Ok(record) => entries.push(record),
            Err(err) => {
                tracing::info!(slug = %window.slug, %date, %err, "calendar stopped at first gap");
                break;
            }
        }
    }
    entries
}
