use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ReminderType {
    #[serde(rename = "24_hour")]
    TwentyFourHour,
    #[serde(rename = "2_hour")]
    TwoHour,
    #[serde(rename = "30_min")]
    ThirtyMin,
}

impl ReminderType {
    pub const ALL: [ReminderType; 3] = [
        ReminderType::TwentyFourHour,
        ReminderType::TwoHour,
        ReminderType::ThirtyMin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderType::TwentyFourHour => "24_hour",
            ReminderType::TwoHour => "2_hour",
            ReminderType::ThirtyMin => "30_min",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24_hour" => Some(ReminderType::TwentyFourHour),
            "2_hour" => Some(ReminderType::TwoHour),
            "30_min" => Some(ReminderType::ThirtyMin),
            _ => None,
        }
    }

    /// Due window in minutes before start: `(lower, upper]`.
    ///
    /// Must stay at least as wide as the cron cadence or reminders get skipped.
    pub fn window_minutes(&self) -> (f64, f64) {
        match self {
            ReminderType::TwentyFourHour => (22.0 * 60.0, 24.0 * 60.0),
            ReminderType::TwoHour => (90.0, 120.0),
            ReminderType::ThirtyMin => (25.0, 30.0),
        }
    }

    pub fn is_due(&self, minutes_until: f64) -> bool {
        let (lower, upper) = self.window_minutes();
        minutes_until > lower && minutes_until <= upper
    }

    pub fn lead_phrase(&self) -> &'static str {
        match self {
            ReminderType::TwentyFourHour => "tomorrow",
            ReminderType::TwoHour => "in 2 hours",
            ReminderType::ThirtyMin => "in 30 minutes",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReminder {
    pub id: String,
    pub booking_id: String,
    pub reminder_type: ReminderType,
    /// `None` means not yet sent.
    pub sent_at: Option<NaiveDateTime>,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub message: String,
}
