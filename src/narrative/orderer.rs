//! Display order for timeline events.

use chrono::NaiveDate;

use crate::domain::TimelineEvent;

/// Orders events for display.
///
/// Sort key is the parsed event date ascending, then the order hint. Events
/// with a missing or unparsable date take the earliest possible date. The
/// sort is stable, so events with equal keys keep their arrival order.
#[must_use]
pub fn order_timeline(mut events: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
    events.sort_by_key(|e| (e.parsed_date().unwrap_or(NaiveDate::MIN), e.order));
    events
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{EventId, PageId};
    use chrono::Utc;

    fn event(date: Option<&str>, order: i64) -> TimelineEvent {
        let now = Utc::now();
        TimelineEvent {
            id: EventId::new(),
            page_id: PageId::new(),
            title: String::new(),
            story: String::new(),
            image: None,
            date: date.map(str::to_string),
            order,
            created_at: now,
            updated_at: now,
        }
    }

    fn dates(events: &[TimelineEvent]) -> Vec<Option<&str>> {
        events.iter().map(|e| e.date.as_deref()).collect()
    }

    #[test]
    fn equal_dates_keep_arrival_order() {
        let first = event(Some("2020-01-01"), 0);
        let earlier = event(Some("2019-05-05"), 0);
        let second = event(Some("2020-01-01"), 0);
        let ids = [earlier.id, first.id, second.id];

        let ordered = order_timeline(vec![first, earlier, second]);
        let got: Vec<EventId> = ordered.iter().map(|e| e.id).collect();
        assert_eq!(got, ids);
    }

    #[test]
    fn ordering_is_idempotent() {
        let input = vec![
            event(Some("2021-06-01"), 0),
            event(Some("2021-01-01"), 1),
            event(None, 2),
            event(Some("2021-03-01"), 3),
        ];
        let once = order_timeline(input);
        let twice = order_timeline(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn three_dates_render_ascending() {
        let ordered = order_timeline(vec![
            event(Some("2021-06-01"), 0),
            event(Some("2021-01-01"), 1),
            event(Some("2021-03-01"), 2),
        ]);
        assert_eq!(
            dates(&ordered),
            vec![Some("2021-01-01"), Some("2021-03-01"), Some("2021-06-01")]
        );
    }

    #[test]
    fn unparsable_and_missing_dates_sort_first() {
        let ordered = order_timeline(vec![
            event(Some("2021-01-01"), 0),
            event(Some("someday"), 5),
            event(None, 1),
        ]);
        assert_eq!(dates(&ordered), vec![None, Some("someday"), Some("2021-01-01")]);
    }

    #[test]
    fn order_hint_breaks_date_ties() {
        let ordered = order_timeline(vec![
            event(Some("2022-02-02"), 9),
            event(Some("2022-02-02"), 1),
        ]);
        let hints: Vec<i64> = ordered.iter().map(|e| e.order).collect();
        assert_eq!(hints, vec![1, 9]);
    }

    #[test]
    fn rfc3339_dates_sort_by_calendar_day() {
        let ordered = order_timeline(vec![
            event(Some("2020-03-01T23:00:00Z"), 0),
            event(Some("2020-02-01"), 0),
        ]);
        assert_eq!(
            dates(&ordered),
            vec![Some("2020-02-01"), Some("2020-03-01T23:00:00Z")]
        );
    }
}
