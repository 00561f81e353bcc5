use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub service_id: String,
    pub booking_date: NaiveDate,
    pub time_slot: String,
    pub status: BookingStatus,
    pub base_amount: i64,
    pub add_on_amount: i64,
    pub total_amount: i64,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddOn {
    pub name: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    /// Statuses that consume slot capacity.
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Confirmed, BookingStatus::InProgress];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Accepts both the stored form (`in_progress`) and the API form (`IN_PROGRESS`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }
}

impl Booking {
    /// Scheduled start: the booking date at the slot's time of day.
    pub fn start_at(&self) -> Option<NaiveDateTime> {
        parse_time_slot(&self.time_slot).map(|t| self.booking_date.and_time(t))
    }

    /// Sets base and add-on amounts, keeping `total_amount == base_amount + add_on_amount`.
    /// Returns `None` and leaves the booking untouched when the sum overflows.
    #[must_use]
    pub fn set_amounts(&mut self, base_amount: i64, add_ons: &[AddOn]) -> Option<()> {
        let add_on_amount = add_ons
            .iter()
            .try_fold(0i64, |acc, a| acc.checked_add(a.amount))?;
        let total_amount = base_amount.checked_add(add_on_amount)?;
        self.base_amount = base_amount;
        self.add_on_amount = add_on_amount;
        self.total_amount = total_amount;
        Some(())
    }
}

/// Canonical `HH:MM` spelling of a slot label, so `9:00 AM` and `09:00:00` share one bucket.
pub fn canonical_time_slot(s: &str) -> Option<String> {
    parse_time_slot(s).map(|t| t.format("%H:%M").to_string())
}

/// Parses a slot label such as `09:00`, `14:30:00` or `9:30 AM`.
pub fn parse_time_slot(s: &str) -> Option<NaiveTime> {
    let s = s.trim().to_uppercase();
    ["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&s, fmt).ok())
}

/// Parses `YYYY-MM-DD`, also accepting a full ISO timestamp by keeping its date part.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let date_part = match s.get(10..11) {
        Some("T") | Some(" ") => &s[..10],
        _ => s,
    };
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_slot_formats() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(parse_time_slot("09:00"), Some(nine));
        assert_eq!(parse_time_slot("9:00 am"), Some(nine));
        assert_eq!(
            parse_time_slot("2:30 PM"),
            NaiveTime::from_hms_opt(14, 30, 0)
        );
        assert_eq!(parse_time_slot("25:00"), None);
        assert_eq!(parse_time_slot("noon"), None);
    }

    #[test]
    fn test_parse_date_accepts_iso_timestamp() {
        let d = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(parse_date("2024-06-01"), Some(d));
        assert_eq!(parse_date("2024-06-01T00:00:00.000Z"), Some(d));
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("not-a-date"), None);
    }

    #[test]
    fn test_status_round_trip_and_flags() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("IN_PROGRESS"), Some(BookingStatus::InProgress));
        assert!(BookingStatus::Confirmed.is_active());
        assert!(!BookingStatus::Pending.is_active());
        assert!(BookingStatus::NoShow.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_set_amounts_keeps_total_invariant() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut booking = Booking {
            id: "b1".to_string(),
            user_id: "u1".to_string(),
            service_id: "basic".to_string(),
            booking_date: now.date(),
            time_slot: "09:00".to_string(),
            status: BookingStatus::Pending,
            base_amount: 0,
            add_on_amount: 0,
            total_amount: 0,
            notes: None,
            cancellation_reason: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        booking.set_amounts(
            2500,
            &[
                AddOn { name: "Tyre shine".to_string(), amount: 500 },
                AddOn { name: "Air freshener".to_string(), amount: 200 },
            ],
        )
        .unwrap();
        assert_eq!(booking.add_on_amount, 700);
        assert_eq!(booking.total_amount, 3200);
        assert_eq!(
            booking.start_at(),
            Some(now.date().and_hms_opt(9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_set_amounts_rejects_overflow() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut booking = Booking {
            id: "b1".to_string(),
            user_id: "u1".to_string(),
            service_id: "basic".to_string(),
            booking_date: now.date(),
            time_slot: "09:00".to_string(),
            status: BookingStatus::Pending,
            base_amount: 2500,
            add_on_amount: 0,
            total_amount: 2500,
            notes: None,
            cancellation_reason: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        let huge = [
            AddOn { name: "Gold plating".to_string(), amount: i64::MAX },
            AddOn { name: "Tip".to_string(), amount: 1 },
        ];
        assert!(booking.set_amounts(2500, &huge).is_none());
        assert!(booking.set_amounts(1, &huge[..1]).is_none());
        assert_eq!(booking.total_amount, 2500);
    }

    #[test]
    fn test_canonical_time_slot() {
        for spelling in ["09:00", "9:00 AM", "09:00:00", "9:00am"] {
            assert_eq!(canonical_time_slot(spelling).as_deref(), Some("09:00"));
        }
        assert_eq!(canonical_time_slot("2:30 pm").as_deref(), Some("14:30"));
        assert_eq!(canonical_time_slot("lunchtime"), None);
    }
}
