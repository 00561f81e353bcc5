//! Booking status state machine. Every status change goes through [`transition`].

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::models::{Booking, BookingStatus};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BookingEvent {
    Confirm,
    Start,
    Complete,
    Cancel { reason: Option<String> },
    MarkNoShow,
}

impl BookingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BookingEvent::Confirm => "confirm",
            BookingEvent::Start => "start",
            BookingEvent::Complete => "complete",
            BookingEvent::Cancel { .. } => "cancel",
            BookingEvent::MarkNoShow => "mark_no_show",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("booking is {} and can no longer change", .0.as_str())]
    Terminal(BookingStatus),

    #[error("cannot {event} a booking that is {}", .from.as_str())]
    NotAllowed {
        from: BookingStatus,
        event: &'static str,
    },
}

/// Target status for `event` from `from`, or `None` when the pair is not in the table.
pub fn next_status(from: BookingStatus, event: &BookingEvent) -> Option<BookingStatus> {
    use BookingStatus::*;

    match (from, event) {
        (Pending, BookingEvent::Confirm) => Some(Confirmed),
        (Pending, BookingEvent::Start) => Some(InProgress),
        (Pending, BookingEvent::Cancel { .. }) => Some(Cancelled),
        (Confirmed, BookingEvent::Start) => Some(InProgress),
        (Confirmed, BookingEvent::Cancel { .. }) => Some(Cancelled),
        (Confirmed, BookingEvent::MarkNoShow) => Some(NoShow),
        (InProgress, BookingEvent::Complete) => Some(Completed),
        _ => None,
    }
}

/// Applies `event`, returning the updated booking. The input is left untouched.
pub fn transition(
    booking: &Booking,
    event: BookingEvent,
    now: NaiveDateTime,
) -> Result<Booking, TransitionError> {
    if booking.status.is_terminal() {
        return Err(TransitionError::Terminal(booking.status));
    }

    let to = next_status(booking.status, &event).ok_or(TransitionError::NotAllowed {
        from: booking.status,
        event: event.name(),
    })?;

    let mut next = booking.clone();
    next.status = to;
    next.updated_at = now;
    match event {
        BookingEvent::Complete => next.completed_at = Some(now),
        BookingEvent::Cancel { reason } => {
            next.cancelled_at = Some(now);
            next.cancellation_reason = reason;
        }
        _ => {}
    }

    tracing::info!(
        booking_id = %booking.id,
        from = booking.status.as_str(),
        to = to.as_str(),
        "booking status changed"
    );
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn booking(status: BookingStatus) -> Booking {
        let created = NaiveDate::from_ymd_opt(2024, 5, 30)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        Booking {
            id: "b1".to_string(),
            user_id: "u1".to_string(),
            service_id: "basic".to_string(),
            booking_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            time_slot: "09:00".to_string(),
            status,
            base_amount: 2500,
            add_on_amount: 0,
            total_amount: 2500,
            notes: None,
            cancellation_reason: None,
            completed_at: None,
            cancelled_at: None,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn test_happy_path() {
        let b = booking(BookingStatus::Pending);
        let b = transition(&b, BookingEvent::Confirm, now()).unwrap();
        assert_eq!(b.status, BookingStatus::Confirmed);
        let b = transition(&b, BookingEvent::Start, now()).unwrap();
        assert_eq!(b.status, BookingStatus::InProgress);
        let b = transition(&b, BookingEvent::Complete, now()).unwrap();
        assert_eq!(b.status, BookingStatus::Completed);
        assert_eq!(b.completed_at, Some(now()));
        assert_eq!(b.updated_at, now());
    }

    #[test]
    fn test_cancel_records_reason_and_time() {
        let b = booking(BookingStatus::Confirmed);
        let cancelled = transition(
            &b,
            BookingEvent::Cancel {
                reason: Some("car broke down".to_string()),
            },
            now(),
        )
        .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.cancelled_at, Some(now()));
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("car broke down"));
        assert_eq!(b.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let events = [
            BookingEvent::Confirm,
            BookingEvent::Start,
            BookingEvent::Complete,
            BookingEvent::Cancel { reason: None },
            BookingEvent::MarkNoShow,
        ];
        for status in [
            BookingStatus::Completed,
            BookingStatus::Cancelled,
            BookingStatus::NoShow,
        ] {
            for event in events.clone() {
                let err = transition(&booking(status), event, now()).unwrap_err();
                assert_eq!(err, TransitionError::Terminal(status));
            }
        }
    }

    #[test]
    fn test_disallowed_pairs() {
        let err = transition(&booking(BookingStatus::Pending), BookingEvent::Complete, now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotAllowed { .. }));
        assert_eq!(err.to_string(), "cannot complete a booking that is pending");

        assert!(transition(&booking(BookingStatus::InProgress), BookingEvent::Cancel { reason: None }, now()).is_err());
        assert!(transition(&booking(BookingStatus::Pending), BookingEvent::MarkNoShow, now()).is_err());
        assert!(transition(&booking(BookingStatus::Confirmed), BookingEvent::Confirm, now()).is_err());
    }

    #[test]
    fn test_event_deserializes_from_tagged_json() {
        let event: BookingEvent =
            serde_json::from_str(r#"{"event":"cancel","reason":"rain"}"#).unwrap();
        assert_eq!(event, BookingEvent::Cancel { reason: Some("rain".to_string()) });
        let event: BookingEvent = serde_json::from_str(r#"{"event":"mark_no_show"}"#).unwrap();
        assert_eq!(event, BookingEvent::MarkNoShow);
    }
}
