//! Target date resolution and listing locator derivation
//!
//! The portal publishes one cause list per calendar day, partitioned by
//! `/<year>/<month-name>` pages with a calendar cell per day. Everything
//! here is derived from a single [`TargetDate`] resolved once at run start.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// UTC offset of the court's reference timezone (Sri Lanka, UTC+05:30).
const REFERENCE_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// How the run's target date is chosen.
///
/// Collapses the live-date, fixed-date, and offset-date run variants into
/// one injectable source so back-fill checks stay deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSelection {
    /// The current date in the reference timezone.
    Today,
    /// An explicit calendar date, independent of the real clock.
    Fixed(NaiveDate),
    /// Today shifted by a signed number of days (e.g. -1 for yesterday).
    OffsetDays(i64),
}

/// The calendar date whose published list is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDate {
    date: NaiveDate,
}

/// Where the day's document lives on the portal: the month listing page
/// and the CSS selector of the calendar cell that triggers the download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingLocator {
    pub url: String,
    pub day_cell_selector: String,
}

impl TargetDate {
    /// Resolve the target date from a selection, consulting the real clock
    /// only for the `Today` and `OffsetDays` modes.
    pub fn resolve(selection: DateSelection) -> Self {
        let date = match selection {
            DateSelection::Today => today_in_reference_tz(),
            DateSelection::Fixed(date) => date,
            DateSelection::OffsetDays(days) => today_in_reference_tz() + Duration::days(days),
        };
        Self { date }
    }

    /// Build a target date directly from a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn day(&self) -> u32 {
        self.date.day()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Lowercase English month name, as used in the portal's URL scheme.
    pub fn month_name(&self) -> String {
        self.date.format("%B").to_string().to_lowercase()
    }

    /// Path segment of the month listing page, e.g. `2025/january`.
    pub fn listing_path(&self) -> String {
        format!("{}/{}", self.year(), self.month_name())
    }

    /// Derive the full locator for the day's document under `site_base`.
    ///
    /// The calendar widget keys each day cell by plain (non-zero-padded)
    /// day/month/year data attributes.
    pub fn locator(&self, site_base: &str) -> ListingLocator {
        ListingLocator {
            url: format!("{}/{}", site_base.trim_end_matches('/'), self.listing_path()),
            day_cell_selector: format!(
                "td.cal-date-picker[data-date=\"{}\"][data-month=\"{}\"][data-year=\"{}\"]",
                self.day(),
                self.month(),
                self.year()
            ),
        }
    }

    /// Short numeric rendering for messages, e.g. `13-01-2025`.
    pub fn display(&self) -> String {
        self.date.format("%d-%m-%Y").to_string()
    }

    /// Rendering used in the spoken alert, e.g. `13 January 2025`.
    pub fn spoken(&self) -> String {
        self.date.format("%d %B %Y").to_string()
    }
}

impl std::fmt::Display for TargetDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.date)
    }
}

fn today_in_reference_tz() -> NaiveDate {
    let offset = FixedOffset::east_opt(REFERENCE_OFFSET_SECS).expect("offset is within bounds");
    Utc::now().with_timezone(&offset).date_naive()
}
