use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    canonical_time_slot, parse_time_slot, AddOn, Booking, BookingStatus, Service,
    DEFAULT_DURATION_MINUTES,
};
use crate::services::availability::{self, CapacityVerdict};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("invalid time slot: {0}")]
    InvalidTimeSlot(String),

    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("invalid add-on: {0}")]
    InvalidAddOn(String),

    #[error("that slot has already started")]
    InThePast,

    #[error("that time is outside our opening hours. We're open: {hours}")]
    OutsideOpeningHours { hours: String },

    #[error("that slot is fully booked ({capacity} bookings)")]
    SlotFull { capacity: u32 },

    #[error("no more {category} bookings fit in that slot ({capacity} max)")]
    CategoryFull { category: String, capacity: u32 },

    #[error("booking is {} and can no longer be modified", .0.as_str())]
    Terminal(BookingStatus),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<BookingError> for AppError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::InvalidTimeSlot(_) | BookingError::InvalidAddOn(_) => {
                AppError::Validation(e.to_string())
            }
            BookingError::UnknownService(id) => AppError::NotFound(format!("service {id}")),
            BookingError::Internal(e) => AppError::Internal(e),
            _ => AppError::BusinessRule(e.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub service_id: String,
    pub booking_date: NaiveDate,
    pub time_slot: String,
    pub notes: Option<String>,
    pub add_ons: Vec<AddOn>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingChanges {
    pub booking_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub notes: Option<String>,
    pub add_ons: Option<Vec<AddOn>>,
}

/// Checks that `service` can run at `date`/`time_slot`: the slot parses, the full duration
/// fits the opening hours, and capacity allows one more booking.
///
/// Returns the start time together with the slot's canonical `HH:MM` label, which is the
/// spelling bookings are stored and counted under.
pub fn validate_schedule(
    conn: &Connection,
    config: &AppConfig,
    service: &Service,
    date: NaiveDate,
    time_slot: &str,
) -> Result<(NaiveDateTime, String), BookingError> {
    let time = parse_time_slot(time_slot)
        .ok_or_else(|| BookingError::InvalidTimeSlot(time_slot.to_string()))?;
    let starts_at = date.and_time(time);
    let slot = time.format("%H:%M").to_string();

    if let Some(hours) = config.opening_hours.as_ref().filter(|h| !h.is_unrestricted()) {
        let duration = if service.duration_minutes > 0 {
            service.duration_minutes
        } else {
            DEFAULT_DURATION_MINUTES
        };
        if !hours.fits(&starts_at, duration) {
            return Err(BookingError::OutsideOpeningHours {
                hours: hours.to_human_readable(),
            });
        }
    }

    match availability::can_accept(conn, date, &slot, &service.category, &config.capacity)? {
        CapacityVerdict::Available => Ok((starts_at, slot)),
        CapacityVerdict::SlotFull { capacity } => Err(BookingError::SlotFull { capacity }),
        CapacityVerdict::CategoryFull { category, capacity } => {
            Err(BookingError::CategoryFull { category, capacity })
        }
    }
}

fn validate_add_ons(add_ons: &[AddOn]) -> Result<(), BookingError> {
    for add_on in add_ons {
        if add_on.name.trim().is_empty() {
            return Err(BookingError::InvalidAddOn("name is required".to_string()));
        }
        if add_on.amount < 0 {
            return Err(BookingError::InvalidAddOn(format!(
                "{} has a negative amount",
                add_on.name
            )));
        }
    }
    Ok(())
}

fn add_on_overflow() -> BookingError {
    BookingError::InvalidAddOn("add-on amounts exceed the supported total".to_string())
}

pub fn create_booking(
    conn: &Connection,
    config: &AppConfig,
    new: NewBooking,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    let service = queries::get_service(conn, &new.service_id)?
        .ok_or_else(|| BookingError::UnknownService(new.service_id.clone()))?;
    validate_add_ons(&new.add_ons)?;

    let (starts_at, time_slot) =
        validate_schedule(conn, config, &service, new.booking_date, &new.time_slot)?;
    if starts_at <= now {
        return Err(BookingError::InThePast);
    }

    let status = if config.auto_confirm_bookings {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };

    let mut booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: new.user_id,
        service_id: service.id.clone(),
        booking_date: new.booking_date,
        time_slot,
        status,
        base_amount: 0,
        add_on_amount: 0,
        total_amount: 0,
        notes: new.notes,
        cancellation_reason: None,
        completed_at: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    };
    booking
        .set_amounts(service.price, &new.add_ons)
        .ok_or_else(add_on_overflow)?;

    queries::create_booking(conn, &booking, &new.add_ons)?;
    tracing::info!(
        booking_id = %booking.id,
        service_id = %booking.service_id,
        date = %booking.booking_date,
        time_slot = %booking.time_slot,
        status = booking.status.as_str(),
        "booking created"
    );
    Ok(booking)
}

/// Applies `changes` to a non-terminal booking. A new slot is revalidated; the current one is not,
/// since the booking itself already occupies it.
pub fn modify_booking(
    conn: &Connection,
    config: &AppConfig,
    current: &Booking,
    changes: BookingChanges,
    now: NaiveDateTime,
) -> Result<Booking, BookingError> {
    if current.status.is_terminal() {
        return Err(BookingError::Terminal(current.status));
    }

    let mut next = current.clone();
    if let Some(date) = changes.booking_date {
        next.booking_date = date;
    }
    if let Some(slot) = changes.time_slot {
        next.time_slot = canonical_time_slot(&slot)
            .ok_or_else(|| BookingError::InvalidTimeSlot(slot.clone()))?;
    }
    if let Some(notes) = changes.notes {
        next.notes = Some(notes);
    }

    let service = queries::get_service(conn, &next.service_id)?;
    let moved = next.booking_date != current.booking_date || next.time_slot != current.time_slot;
    if moved {
        let service = service
            .as_ref()
            .ok_or_else(|| BookingError::UnknownService(next.service_id.clone()))?;
        let (starts_at, _) =
            validate_schedule(conn, config, service, next.booking_date, &next.time_slot)?;
        if starts_at <= now {
            return Err(BookingError::InThePast);
        }
    }

    if let Some(add_ons) = &changes.add_ons {
        validate_add_ons(add_ons)?;
        let base = service.as_ref().map(|s| s.price).unwrap_or(current.base_amount);
        next.set_amounts(base, add_ons).ok_or_else(add_on_overflow)?;
    }
    next.updated_at = now;

    queries::modify_booking(conn, &next, changes.add_ons.as_deref())?;
    tracing::info!(booking_id = %next.id, moved, "booking modified");
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapacityPolicy;
    use crate::db;
    use crate::models::{OpeningHours, Role, User};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config() -> AppConfig {
        AppConfig {
            port: 0,
            database_url: ":memory:".to_string(),
            admin_token: "admin".to_string(),
            admin_password: String::new(),
            cron_secret: String::new(),
            webhook_secret: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_phone_number: String::new(),
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: String::new(),
            capacity: CapacityPolicy::default(),
            max_batch_combinations: 200,
            opening_hours: None,
            auto_confirm_bookings: true,
            login_max_attempts: 5,
            login_lockout_minutes: 15,
        }
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::create_user(
            &conn,
            &User {
                id: "u1".to_string(),
                name: "Sam".to_string(),
                email: None,
                phone: None,
                sms_opt_in: false,
                role: Role::Customer,
                api_token: None,
            },
        )
        .unwrap();
        conn
    }

    fn new_booking(service_id: &str, day: &str, slot: &str) -> NewBooking {
        NewBooking {
            user_id: "u1".to_string(),
            service_id: service_id.to_string(),
            booking_date: date(day),
            time_slot: slot.to_string(),
            notes: None,
            add_ons: vec![],
        }
    }

    #[test]
    fn test_create_computes_amounts() {
        let conn = setup_db();
        let mut new = new_booking("premium", "2025-06-16", "10:00");
        new.add_ons = vec![
            AddOn { name: "Tyre shine".to_string(), amount: 500 },
            AddOn { name: "Air freshener".to_string(), amount: 250 },
        ];
        let booking = create_booking(&conn, &config(), new, at("2025-06-10 08:00")).unwrap();

        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.base_amount, 4500);
        assert_eq!(booking.add_on_amount, 750);
        assert_eq!(booking.total_amount, 5250);
        assert_eq!(queries::get_add_ons(&conn, &booking.id).unwrap().len(), 2);
    }

    #[test]
    fn test_create_pending_without_auto_confirm() {
        let conn = setup_db();
        let mut cfg = config();
        cfg.auto_confirm_bookings = false;
        let booking = create_booking(&conn, &cfg, new_booking("basic", "2025-06-16", "10:00"), at("2025-06-10 08:00"))
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_rejects_unknown_service_and_bad_slot() {
        let conn = setup_db();
        let now = at("2025-06-10 08:00");
        let err = create_booking(&conn, &config(), new_booking("hover-wash", "2025-06-16", "10:00"), now)
            .unwrap_err();
        assert!(matches!(err, BookingError::UnknownService(_)));

        let err = create_booking(&conn, &config(), new_booking("basic", "2025-06-16", "lunchtime"), now)
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidTimeSlot(_)));
    }

    #[test]
    fn test_rejects_past_slot() {
        let conn = setup_db();
        let err = create_booking(&conn, &config(), new_booking("basic", "2025-06-10", "07:00"), at("2025-06-10 08:00"))
            .unwrap_err();
        assert!(matches!(err, BookingError::InThePast));
    }

    #[test]
    fn test_duration_must_fit_opening_hours() {
        let conn = setup_db();
        let mut cfg = config();
        cfg.opening_hours = Some(
            OpeningHours::from_json(r#"{"slots":[{"day":"mon","start":"08:00","end":"17:00"}]}"#).unwrap(),
        );
        let now = at("2025-06-10 08:00");

        // 2025-06-16 is a Monday; a 180 minute detail at 15:00 runs past closing
        let err = create_booking(&conn, &cfg, new_booking("full-detail", "2025-06-16", "15:00"), now)
            .unwrap_err();
        assert!(matches!(err, BookingError::OutsideOpeningHours { .. }));

        assert!(create_booking(&conn, &cfg, new_booking("express", "2025-06-16", "16:30"), now).is_ok());
    }

    #[test]
    fn test_slot_capacity_enforced() {
        let conn = setup_db();
        let mut cfg = config();
        cfg.capacity.default_per_slot = 1;
        let now = at("2025-06-10 08:00");

        create_booking(&conn, &cfg, new_booking("basic", "2025-06-16", "10:00"), now).unwrap();
        let err = create_booking(&conn, &cfg, new_booking("express", "2025-06-16", "10:00"), now)
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotFull { capacity: 1 }));
    }

    #[test]
    fn test_slot_spellings_share_capacity() {
        let conn = setup_db();
        let mut cfg = config();
        cfg.capacity.default_per_slot = 1;
        let now = at("2025-06-10 08:00");

        let booking = create_booking(&conn, &cfg, new_booking("basic", "2025-06-16", "9:00 AM"), now).unwrap();
        assert_eq!(booking.time_slot, "09:00");

        for slot in ["09:00", "09:00:00", "9:00am"] {
            let err = create_booking(&conn, &cfg, new_booking("express", "2025-06-16", slot), now)
                .unwrap_err();
            assert!(matches!(err, BookingError::SlotFull { capacity: 1 }), "{slot}");
        }
    }

    #[test]
    fn test_add_on_overflow_rejected() {
        let conn = setup_db();
        let mut new = new_booking("basic", "2025-06-16", "10:00");
        new.add_ons = vec![
            AddOn { name: "Gold plating".to_string(), amount: i64::MAX },
            AddOn { name: "Wax".to_string(), amount: 1 },
        ];
        let err = create_booking(&conn, &config(), new, at("2025-06-10 08:00")).unwrap_err();
        assert!(matches!(err, BookingError::InvalidAddOn(_)));
        assert!(queries::list_bookings(&conn, None, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_modify_replaces_add_ons_and_moves_slot() {
        let conn = setup_db();
        let cfg = config();
        let mut new = new_booking("basic", "2025-06-16", "10:00");
        new.add_ons = vec![AddOn { name: "Wax".to_string(), amount: 1000 }];
        let booking = create_booking(&conn, &cfg, new, at("2025-06-10 08:00")).unwrap();

        let changes = BookingChanges {
            time_slot: Some("11:00".to_string()),
            add_ons: Some(vec![]),
            ..Default::default()
        };
        let modified = modify_booking(&conn, &cfg, &booking, changes, at("2025-06-11 08:00")).unwrap();

        assert_eq!(modified.time_slot, "11:00");
        assert_eq!(modified.total_amount, 2500);
        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored, modified);
        assert!(queries::get_add_ons(&conn, &booking.id).unwrap().is_empty());
    }

    #[test]
    fn test_modify_terminal_booking_rejected() {
        let conn = setup_db();
        let cfg = config();
        let mut booking =
            create_booking(&conn, &cfg, new_booking("basic", "2025-06-16", "10:00"), at("2025-06-10 08:00")).unwrap();
        booking.status = BookingStatus::Cancelled;

        let err = modify_booking(&conn, &cfg, &booking, BookingChanges::default(), at("2025-06-11 08:00"))
            .unwrap_err();
        assert!(matches!(err, BookingError::Terminal(BookingStatus::Cancelled)));
    }

    #[test]
    fn test_modify_cannot_move_into_past() {
        let conn = setup_db();
        let cfg = config();
        let booking =
            create_booking(&conn, &cfg, new_booking("basic", "2025-06-16", "10:00"), at("2025-06-10 08:00")).unwrap();
        let now = at("2025-06-12 08:00");

        let changes = BookingChanges {
            booking_date: Some(date("2025-06-11")),
            ..Default::default()
        };
        let err = modify_booking(&conn, &cfg, &booking, changes, now).unwrap_err();
        assert!(matches!(err, BookingError::InThePast));

        let changes = BookingChanges {
            booking_date: Some(date("2025-06-12")),
            time_slot: Some("8:00 AM".to_string()),
            ..Default::default()
        };
        let err = modify_booking(&conn, &cfg, &booking, changes, now).unwrap_err();
        assert!(matches!(err, BookingError::InThePast));

        let stored = queries::get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(stored.booking_date, date("2025-06-16"));
    }

    #[test]
    fn test_modify_same_slot_in_other_spelling_is_not_a_move() {
        let conn = setup_db();
        let mut cfg = config();
        cfg.capacity.default_per_slot = 1;
        let booking =
            create_booking(&conn, &cfg, new_booking("basic", "2025-06-16", "10:00"), at("2025-06-10 08:00")).unwrap();

        let changes = BookingChanges {
            time_slot: Some("10:00 AM".to_string()),
            notes: Some("side gate".to_string()),
            ..Default::default()
        };
        let modified = modify_booking(&conn, &cfg, &booking, changes, at("2025-06-11 08:00")).unwrap();
        assert_eq!(modified.time_slot, "10:00");
        assert_eq!(modified.notes.as_deref(), Some("side gate"));
    }
}
