use std::collections::HashMap;
use std::env;

use crate::models::{canonical_time_slot, OpeningHours};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub admin_password: String,
    pub cron_secret: String,
    pub webhook_secret: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
    pub capacity: CapacityPolicy,
    pub max_batch_combinations: usize,
    pub opening_hours: Option<OpeningHours>,
    pub auto_confirm_bookings: bool,
    pub login_max_attempts: u32,
    pub login_lockout_minutes: i64,
}

/// How many active bookings a slot may hold.
#[derive(Clone, Debug, PartialEq)]
pub struct CapacityPolicy {
    pub default_per_slot: u32,
    pub slot_overrides: HashMap<String, u32>,
    /// Max concurrent active bookings sharing one service category in a slot.
    pub per_category: Option<u32>,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            default_per_slot: 10,
            slot_overrides: HashMap::new(),
            per_category: None,
        }
    }
}

impl CapacityPolicy {
    pub fn for_slot(&self, time_slot: &str) -> u32 {
        self.slot_overrides
            .get(time_slot)
            .copied()
            .unwrap_or(self.default_per_slot)
    }

    /// Parses `"09:00=4,12:00=6"`, keying each override by its `HH:MM` slot.
    /// Malformed pairs are skipped.
    pub fn parse_overrides(raw: &str) -> HashMap<String, u32> {
        raw.split(',')
            .filter_map(|pair| {
                let (slot, cap) = pair.split_once('=')?;
                let cap = cap.trim().parse().ok()?;
                Some((canonical_time_slot(slot.trim())?, cap))
            })
            .collect()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let opening_hours = env::var("OPENING_HOURS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| match OpeningHours::from_json(&v) {
                Ok(a) => Some(a),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring invalid OPENING_HOURS");
                    None
                }
            });

        Self {
            port: parse_var("PORT", 3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "washbay.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_default(),
            cron_secret: env::var("CRON_SECRET").unwrap_or_default(),
            webhook_secret: env::var("WEBHOOK_SECRET").unwrap_or_default(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            email_api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "bookings@washbay.local".to_string()),
            capacity: CapacityPolicy {
                default_per_slot: parse_var("SLOT_CAPACITY", 10),
                slot_overrides: env::var("SLOT_CAPACITY_OVERRIDES")
                    .map(|v| CapacityPolicy::parse_overrides(&v))
                    .unwrap_or_default(),
                per_category: env::var("CATEGORY_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            max_batch_combinations: parse_var("MAX_BATCH_COMBINATIONS", 200),
            opening_hours,
            auto_confirm_bookings: env::var("AUTO_CONFIRM_BOOKINGS")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            login_max_attempts: parse_var("LOGIN_MAX_ATTEMPTS", 5),
            login_lockout_minutes: parse_var("LOGIN_LOCKOUT_MINUTES", 15),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
