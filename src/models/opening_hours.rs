use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// One open interval on a weekday, e.g. `{"day":"mon","start":"08:00","end":"18:00"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSlot {
    pub day: String,
    pub start: String,
    pub end: String,
}

/// Weekly opening hours of the wash. An empty list means no restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpeningHours {
    pub slots: Vec<OpenSlot>,
}

impl OpeningHours {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        let hours: OpeningHours = serde_json::from_str(s)?;
        for slot in &hours.slots {
            parse_weekday(&slot.day)?;
            parse_time(&slot.start)?;
            parse_time(&slot.end)?;
        }
        Ok(hours)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether a service starting at `start` and running `duration_minutes` fits in one open interval.
    pub fn fits(&self, start: &NaiveDateTime, duration_minutes: i64) -> bool {
        if self.is_unrestricted() {
            return true;
        }
        let end = *start + Duration::minutes(duration_minutes);
        if end.date() != start.date() {
            return false;
        }
        let weekday = start.weekday();
        self.slots.iter().any(|slot| {
            let (Ok(day), Ok(open), Ok(close)) = (
                parse_weekday(&slot.day),
                parse_time(&slot.start),
                parse_time(&slot.end),
            ) else {
                return false;
            };
            day == weekday && start.time() >= open && end.time() <= close
        })
    }

    pub fn to_human_readable(&self) -> String {
        let mut sorted = self.slots.clone();
        sorted.sort_by_key(|s| {
            parse_weekday(&s.day)
                .map(|d| d.num_days_from_monday())
                .unwrap_or(7)
        });

        sorted
            .iter()
            .map(|s| format!("{}: {}-{}", capitalize(&s.day), s.start, s.end))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + &c.as_str().to_lowercase(),
    }
}

fn parse_weekday(s: &str) -> anyhow::Result<Weekday> {
    s.parse::<Weekday>()
        .map_err(|_| anyhow::anyhow!("invalid weekday: {s}"))
}

fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| anyhow::anyhow!("invalid time: {s}"))
}
