//! Timeline events: the memories that make up a page.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{EventId, PageId};

/// Title given to an event the owner has just added.
pub const PLACEHOLDER_TITLE: &str = "New Memory";

/// One memory belonging to exactly one page.
///
/// `date` keeps whatever the editor sent. It is parsed only when ordering
/// or rendering, so a half-typed date never makes the event unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event identity.
    pub id: EventId,
    /// Owning page.
    pub page_id: PageId,
    /// Short headline.
    pub title: String,
    /// Story text.
    pub story: String,
    /// Optional image reference.
    pub image: Option<String>,
    /// Calendar date as entered, usually `YYYY-MM-DD`.
    pub date: Option<String>,
    /// Explicit order hint used after the date.
    pub order: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last field mutation.
    pub updated_at: DateTime<Utc>,
}

impl TimelineEvent {
    /// Creates the placeholder event produced by the owner's "add" action.
    #[must_use]
    pub fn placeholder(
        id: EventId,
        page_id: PageId,
        order: i64,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            page_id,
            title: PLACEHOLDER_TITLE.to_string(),
            story: String::new(),
            image: None,
            date: Some(today.format("%Y-%m-%d").to_string()),
            order,
            created_at: now,
            updated_at: now,
        }
    }

    /// Parses the stored date, if it is a calendar date we understand.
    ///
    /// Accepts `YYYY-MM-DD` and full RFC 3339 timestamps (the date part is
    /// kept, the time of day is dropped).
    #[must_use]
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_event_date)
    }

    /// Applies one field mutation and bumps `updated_at`.
    pub fn apply(&mut self, patch: &EventPatch, at: DateTime<Utc>) {
        match patch {
            EventPatch::Title(v) => self.title.clone_from(v),
            EventPatch::Story(v) => self.story.clone_from(v),
            EventPatch::Image(v) => self.image.clone_from(v),
            EventPatch::Date(v) => self.date.clone_from(v),
            EventPatch::Order(v) => self.order = *v,
        }
        self.updated_at = at;
    }
}

/// Parses an event date string.
#[must_use]
pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.date_naive())
    })
}

/// A single-field event mutation, serialized as `{"field", "value"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum EventPatch {
    /// Set the title.
    Title(String),
    /// Set the story text.
    Story(String),
    /// Set or clear the image.
    Image(Option<String>),
    /// Set or clear the date string.
    Date(Option<String>),
    /// Set the order hint.
    Order(i64),
}

impl EventPatch {
    /// Returns the name of the field this patch writes.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Story(_) => "story",
            Self::Image(_) => "image",
            Self::Date(_) => "date",
            Self::Order(_) => "order",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_else(|| panic!("valid date"))
    }

    #[test]
    fn placeholder_is_dated_today() {
        let ev = TimelineEvent::placeholder(EventId::new(), PageId::new(), 3, ymd(2024, 2, 29), Utc::now());
        assert_eq!(ev.title, PLACEHOLDER_TITLE);
        assert_eq!(ev.date.as_deref(), Some("2024-02-29"));
        assert_eq!(ev.parsed_date(), Some(ymd(2024, 2, 29)));
        assert_eq!(ev.order, 3);
    }

    #[test]
    fn parse_accepts_plain_and_rfc3339() {
        assert_eq!(parse_event_date("2021-06-01"), Some(ymd(2021, 6, 1)));
        assert_eq!(parse_event_date(" 2021-06-01 "), Some(ymd(2021, 6, 1)));
        assert_eq!(
            parse_event_date("2021-06-01T23:30:00+00:00"),
            Some(ymd(2021, 6, 1))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_event_date("summer 2019"), None);
        assert_eq!(parse_event_date("2021-13-01"), None);
        assert_eq!(parse_event_date(""), None);
    }

    #[test]
    fn apply_changes_only_the_named_field() {
        let mut ev = TimelineEvent::placeholder(EventId::new(), PageId::new(), 0, ymd(2020, 1, 1), Utc::now());
        ev.apply(&EventPatch::Story("We met at the station.".into()), Utc::now());
        assert_eq!(ev.story, "We met at the station.");
        assert_eq!(ev.title, PLACEHOLDER_TITLE);
        ev.apply(&EventPatch::Date(None), Utc::now());
        assert!(ev.parsed_date().is_none());
    }
}
