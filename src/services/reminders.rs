//! Pre-appointment reminders.
//!
//! Selection finds bookings inside a reminder window with no sent marker for that window.
//! Dispatch sends over every available channel and then always writes a `booking_reminders`
//! row, which is the marker later selections check. The check and the insert are not atomic:
//! two overlapping runs can both send the same reminder.

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingReminder, BookingStatus, ReminderType, Service, User};
use crate::services::notifier::{DeliveryReport, OutboundMessage, Recipient};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReminderFilter {
    All,
    Only(ReminderType),
}

impl ReminderFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(ReminderFilter::All),
            other => ReminderType::parse(other).map(ReminderFilter::Only),
        }
    }

    fn includes(&self, reminder_type: ReminderType) -> bool {
        match self {
            ReminderFilter::All => true,
            ReminderFilter::Only(t) => *t == reminder_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DueReminder {
    pub booking_id: String,
    pub reminder_type: ReminderType,
    pub booking_date_time: NaiveDateTime,
    pub time_slot: String,
    pub status: BookingStatus,
    pub hours_until: f64,
    pub minutes_until: f64,
    pub customer_name: Option<String>,
    pub service_name: Option<String>,
}

/// Reminders due at `now`, oldest booking first.
pub fn find_due(
    conn: &Connection,
    now: NaiveDateTime,
    filter: ReminderFilter,
) -> anyhow::Result<Vec<DueReminder>> {
    let from = now - Duration::hours(24);
    let to = now + Duration::days(7);
    let candidates = queries::get_bookings_for_reminders(conn, &from, &to)?;

    let mut due = Vec::new();
    for booking in candidates {
        let Some(starts_at) = booking.start_at() else {
            tracing::warn!(booking_id = %booking.id, time_slot = %booking.time_slot, "skipping booking with unparseable time slot");
            continue;
        };
        let minutes_until = (starts_at - now).num_seconds() as f64 / 60.0;

        for reminder_type in ReminderType::ALL {
            if !filter.includes(reminder_type) || !reminder_type.is_due(minutes_until) {
                continue;
            }
            if queries::has_sent_reminder(conn, &booking.id, reminder_type)? {
                continue;
            }
            let customer_name = queries::get_user(conn, &booking.user_id)?.map(|u| u.name);
            let service_name = queries::get_service(conn, &booking.service_id)?.map(|s| s.name);
            due.push(DueReminder {
                booking_id: booking.id.clone(),
                reminder_type,
                booking_date_time: starts_at,
                time_slot: booking.time_slot.clone(),
                status: booking.status,
                hours_until: minutes_until / 60.0,
                minutes_until,
                customer_name,
                service_name,
            });
        }
    }
    Ok(due)
}

#[derive(Debug, thiserror::Error)]
pub enum ReminderError {
    #[error("booking {0}")]
    BookingNotFound(String),

    #[error("customer for booking {0}")]
    CustomerNotFound(String),

    #[error("cannot send a reminder for a cancelled booking")]
    BookingCancelled,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ReminderError> for AppError {
    fn from(e: ReminderError) -> Self {
        match e {
            ReminderError::BookingNotFound(_) | ReminderError::CustomerNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            ReminderError::BookingCancelled => AppError::BusinessRule(e.to_string()),
            ReminderError::Internal(e) => AppError::Internal(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOutcome {
    pub reminder: Option<BookingReminder>,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub already_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery: Option<DeliveryReport>,
}

/// Sends one reminder and records it. Without `force`, a type already sent is a no-op.
pub async fn send_reminder(
    state: &AppState,
    booking_id: &str,
    reminder_type: ReminderType,
    force: bool,
) -> Result<SendOutcome, ReminderError> {
    let (booking, user, service) = {
        let conn = state
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        let booking = queries::get_booking_by_id(&conn, booking_id)?
            .ok_or_else(|| ReminderError::BookingNotFound(booking_id.to_string()))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(ReminderError::BookingCancelled);
        }
        if !force && queries::has_sent_reminder(&conn, booking_id, reminder_type)? {
            tracing::info!(booking_id, reminder_type = reminder_type.as_str(), "reminder already sent");
            return Ok(SendOutcome {
                reminder: None,
                email_sent: false,
                sms_sent: false,
                already_sent: true,
                delivery: None,
            });
        }
        let user = queries::get_user(&conn, &booking.user_id)?
            .ok_or_else(|| ReminderError::CustomerNotFound(booking_id.to_string()))?;
        let service = queries::get_service(&conn, &booking.service_id)?;
        (booking, user, service)
    };

    let message = compose_message(reminder_type, &booking, &user, service.as_ref());
    let recipient = Recipient {
        email: user.email.clone(),
        phone: user.phone.clone(),
        sms_opt_in: user.sms_opt_in,
    };
    let report = state.notifier().dispatch(&recipient, &message).await;

    let reminder = BookingReminder {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        reminder_type,
        sent_at: Some(state.clock.now()),
        email_sent: report.email.delivered,
        sms_sent: report.sms.delivered,
        message: message.sms_body,
    };
    {
        let conn = state
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        queries::insert_reminder(&conn, &reminder)?;
    }

    tracing::info!(
        booking_id,
        reminder_type = reminder_type.as_str(),
        email_sent = reminder.email_sent,
        sms_sent = reminder.sms_sent,
        force,
        "reminder recorded"
    );

    Ok(SendOutcome {
        email_sent: reminder.email_sent,
        sms_sent: reminder.sms_sent,
        reminder: Some(reminder),
        already_sent: false,
        delivery: Some(report),
    })
}

pub fn compose_message(
    reminder_type: ReminderType,
    booking: &Booking,
    user: &User,
    service: Option<&Service>,
) -> OutboundMessage {
    let service_name = service.map(|s| s.name.as_str()).unwrap_or("car wash");
    let date = booking.booking_date.format("%A, %B %-d");
    let lead = reminder_type.lead_phrase();

    let subject = match reminder_type {
        ReminderType::TwentyFourHour => format!("Reminder: your {service_name} is tomorrow"),
        ReminderType::TwoHour => format!("Your {service_name} starts in 2 hours"),
        ReminderType::ThirtyMin => format!("See you in 30 minutes: {service_name}"),
    };
    let email_body = format!(
        "Hi {name},\n\n\
         This is a reminder that your {service_name} is booked {lead}, on {date} at {slot}.\n\
         Booking reference: {id}\n\n\
         Please arrive a few minutes early so we can check your vehicle in.\n",
        name = user.name,
        slot = booking.time_slot,
        id = booking.id,
    );
    let sms_body = format!(
        "Hi {}, your {service_name} is {lead} ({date}, {}). Ref {}.",
        user.name, booking.time_slot, booking.id
    );

    OutboundMessage {
        subject,
        email_body,
        sms_body,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronEntry {
    #[serde(flatten)]
    pub due: DueReminder,
    pub result: &'static str,
    pub email_sent: bool,
    pub sms_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CronSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub test_mode: bool,
    pub reminders: Vec<CronEntry>,
}

/// One stateless pass: select everything due, then dispatch each unless `test_mode`.
pub async fn run_scheduled(state: &AppState, test_mode: bool) -> Result<CronSummary, AppError> {
    let now = state.clock.now();
    let due = {
        let conn = state.db()?;
        find_due(&conn, now, ReminderFilter::All)?
    };

    let mut summary = CronSummary {
        processed: due.len(),
        sent: 0,
        failed: 0,
        test_mode,
        reminders: Vec::with_capacity(due.len()),
    };

    for item in due {
        if test_mode {
            summary.reminders.push(CronEntry {
                due: item,
                result: "pending",
                email_sent: false,
                sms_sent: false,
                error: None,
            });
            continue;
        }

        let result = send_reminder(state, &item.booking_id, item.reminder_type, false).await;
        let entry = match result {
            Ok(outcome) if outcome.already_sent => CronEntry {
                due: item,
                result: "already_sent",
                email_sent: false,
                sms_sent: false,
                error: None,
            },
            Ok(outcome) => {
                summary.sent += 1;
                CronEntry {
                    due: item,
                    result: "sent",
                    email_sent: outcome.email_sent,
                    sms_sent: outcome.sms_sent,
                    error: None,
                }
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(booking_id = %item.booking_id, error = %e, "reminder dispatch failed");
                CronEntry {
                    due: item,
                    result: "failed",
                    email_sent: false,
                    sms_sent: false,
                    error: Some(e.to_string()),
                }
            }
        };
        summary.reminders.push(entry);
    }

    tracing::info!(
        processed = summary.processed,
        sent = summary.sent,
        failed = summary.failed,
        test_mode,
        "reminder run finished"
    );
    Ok(summary)
}
