//! Time-and-status estimate of where a car is in the wash.
//!
//! Nothing here is measured: the stage is derived from the scheduled start, the
//! service duration, the booking status and the current time. [`track`] is pure and
//! safe to call on every poll.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::models::{Booking, BookingStatus, Service, DEFAULT_DURATION_MINUTES};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Scheduled,
    Arrival,
    Pre,
    Wash,
    Quality,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Scheduled,
        Stage::Arrival,
        Stage::Pre,
        Stage::Wash,
        Stage::Quality,
        Stage::Complete,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Scheduled => "Scheduled",
            Stage::Arrival => "Arrival & check-in",
            Stage::Pre => "Pre-wash",
            Stage::Wash => "Wash",
            Stage::Quality => "Quality check",
            Stage::Complete => "Complete",
        }
    }
}

/// Share of the service duration given to each working stage, with a floor in minutes.
///
/// The split is a display heuristic. Changing it only changes what customers see.
#[derive(Debug, Clone, Copy)]
pub struct StagePolicy {
    pub arrival: (f64, f64),
    pub pre: (f64, f64),
    pub wash: (f64, f64),
    pub quality: (f64, f64),
}

pub const DEFAULT_STAGE_POLICY: StagePolicy = StagePolicy {
    arrival: (0.05, 2.0),
    pre: (0.15, 3.0),
    wash: (0.70, 10.0),
    quality: (0.10, 2.0),
};

/// Cap on elapsed-time progress; only an explicit completion reaches 100.
pub const IN_PROGRESS_CAP: f64 = 95.0;

/// Fixed progress shown while a confirmed booking waits for check-in.
pub const AWAITING_CHECK_IN_PROGRESS: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StagePortions {
    pub arrival: f64,
    pub pre: f64,
    pub wash: f64,
    pub quality: f64,
}

impl StagePortions {
    pub fn for_duration(duration_minutes: f64, policy: &StagePolicy) -> Self {
        let portion = |(share, floor): (f64, f64)| (duration_minutes * share).max(floor);
        Self {
            arrival: portion(policy.arrival),
            pre: portion(policy.pre),
            wash: portion(policy.wash),
            quality: portion(policy.quality),
        }
    }

    fn total(&self) -> f64 {
        self.arrival + self.pre + self.wash + self.quality
    }

    /// Cumulative percentage at which arrival, pre-wash and wash end.
    pub fn thresholds(&self) -> [f64; 3] {
        let total = self.total();
        let arrival = self.arrival / total * 100.0;
        let pre = arrival + self.pre / total * 100.0;
        let wash = pre + self.wash / total * 100.0;
        [arrival, pre, wash]
    }

    fn stage_at(&self, progress: f64) -> Stage {
        let [arrival, pre, wash] = self.thresholds();
        if progress < arrival {
            Stage::Arrival
        } else if progress < pre {
            Stage::Pre
        } else if progress < wash {
            Stage::Wash
        } else {
            Stage::Quality
        }
    }

    fn end_of(&self, stage: Stage) -> f64 {
        let [arrival, pre, wash] = self.thresholds();
        match stage {
            Stage::Scheduled => 0.0,
            Stage::Arrival => arrival,
            Stage::Pre => pre,
            Stage::Wash => wash,
            Stage::Quality | Stage::Complete => 100.0,
        }
    }

    fn minutes_of(&self, stage: Stage) -> i64 {
        let minutes = match stage {
            Stage::Scheduled | Stage::Complete => 0.0,
            Stage::Arrival => self.arrival,
            Stage::Pre => self.pre,
            Stage::Wash => self.wash,
            Stage::Quality => self.quality,
        };
        minutes.round() as i64
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub key: Stage,
    pub label: &'static str,
    pub completed: bool,
    pub current: bool,
    pub estimated_minutes: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub stages: Vec<StageRecord>,
    pub current_stage: Stage,
    pub total_progress: u8,
    pub estimated_completion: NaiveDateTime,
    pub actual_completion: Option<NaiveDateTime>,
    pub status: BookingStatus,
    pub starts_at: NaiveDateTime,
    pub overdue: bool,
    pub overdue_minutes: i64,
}

pub fn track(booking: &Booking, service: Option<&Service>, now: NaiveDateTime) -> TrackingView {
    track_with_policy(booking, service, now, &DEFAULT_STAGE_POLICY)
}

pub fn track_with_policy(
    booking: &Booking,
    service: Option<&Service>,
    now: NaiveDateTime,
    policy: &StagePolicy,
) -> TrackingView {
    let starts_at = booking.start_at().unwrap_or_else(|| {
        tracing::warn!(
            booking_id = %booking.id,
            time_slot = %booking.time_slot,
            "unparseable time slot, tracking from midnight"
        );
        booking.booking_date.and_hms_opt(0, 0, 0).unwrap_or_default()
    });
    let duration_minutes = service
        .map(|s| s.duration_minutes)
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_DURATION_MINUTES);
    let portions = StagePortions::for_duration(duration_minutes as f64, policy);

    let mut overdue_minutes = 0;
    let (progress, current_stage) = match booking.status {
        BookingStatus::Completed => (100.0, Stage::Complete),
        BookingStatus::Cancelled | BookingStatus::NoShow => (0.0, Stage::Scheduled),
        _ if now < starts_at => (0.0, Stage::Scheduled),
        BookingStatus::InProgress => {
            let elapsed = (now - starts_at).num_seconds() as f64 / 60.0;
            let progress = (elapsed / duration_minutes as f64 * 100.0).min(IN_PROGRESS_CAP);
            (progress, portions.stage_at(progress))
        }
        BookingStatus::Confirmed | BookingStatus::Pending => {
            overdue_minutes = (now - starts_at).num_minutes();
            (AWAITING_CHECK_IN_PROGRESS, Stage::Arrival)
        }
    };

    let started = matches!(
        booking.status,
        BookingStatus::InProgress | BookingStatus::Completed
    );
    let stages = Stage::ALL
        .iter()
        .map(|&stage| {
            let current = stage == current_stage;
            let completed = match stage {
                Stage::Scheduled => started && !current,
                Stage::Quality | Stage::Complete => progress >= 100.0,
                _ => !current && progress >= portions.end_of(stage),
            };
            StageRecord {
                key: stage,
                label: stage.label(),
                completed,
                current,
                estimated_minutes: portions.minutes_of(stage),
            }
        })
        .collect();

    let actual_completion = match booking.status {
        BookingStatus::Completed => booking.completed_at,
        _ => None,
    };
    let estimated_completion =
        actual_completion.unwrap_or(starts_at + Duration::minutes(duration_minutes));

    TrackingView {
        stages,
        current_stage,
        total_progress: progress.round().clamp(0.0, 100.0) as u8,
        estimated_completion,
        actual_completion,
        status: booking.status,
        starts_at,
        overdue: overdue_minutes > 0,
        overdue_minutes: overdue_minutes.max(0),
    }
}
