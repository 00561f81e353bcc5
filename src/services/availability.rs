//! Slot occupancy checks. Read-only: no lock is held between a check and a later insert,
//! so two concurrent bookings can both pass the same check.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::config::CapacityPolicy;
use crate::db::queries;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub booking_count: i64,
    /// Service ids of active bookings; empty unless requested.
    pub services: Vec<String>,
    pub service_specific_bookings: i64,
    pub total_day_bookings: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub date: String,
    pub time_slot: String,
    pub booking_count: i64,
    pub capacity: u32,
    pub available: bool,
}

pub struct SlotQuery<'a> {
    pub date: NaiveDate,
    pub time_slot: &'a str,
    pub service_id: Option<&'a str>,
    pub include_services: bool,
}

pub fn check_slot(conn: &Connection, query: &SlotQuery<'_>) -> anyhow::Result<SlotAvailability> {
    let booking_count = queries::count_active_in_slot(conn, query.date, query.time_slot)?;

    let services = if query.include_services {
        queries::active_service_ids_in_slot(conn, query.date, query.time_slot)?
    } else {
        Vec::new()
    };

    let service_specific_bookings = match query.service_id.filter(|s| !s.trim().is_empty()) {
        Some(service_id) => {
            let name = service_name_fragment(conn, service_id)?;
            queries::count_active_matching_service(conn, query.date, query.time_slot, &name)?
        }
        None => 0,
    };

    let total_day_bookings = queries::count_active_on_day(conn, query.date)?;

    tracing::debug!(
        date = %query.date,
        time_slot = query.time_slot,
        booking_count,
        total_day_bookings,
        "slot availability checked"
    );

    Ok(SlotAvailability {
        booking_count,
        services,
        service_specific_bookings,
        total_day_bookings,
    })
}

/// The catalogue name for `service_id`, or the id itself when it is not catalogued.
fn service_name_fragment(conn: &Connection, service_id: &str) -> anyhow::Result<String> {
    Ok(queries::get_service(conn, service_id)?
        .map(|s| s.name)
        .unwrap_or_else(|| service_id.trim().to_string()))
}

/// Every `date × time_slot` combination, in input order (dates outermost).
pub fn check_batch(
    conn: &Connection,
    dates: &[NaiveDate],
    time_slots: &[String],
    capacity: &CapacityPolicy,
) -> anyhow::Result<Vec<SlotStatus>> {
    let mut results = Vec::with_capacity(dates.len() * time_slots.len());
    for date in dates {
        for time_slot in time_slots {
            let booking_count = queries::count_active_in_slot(conn, *date, time_slot)?;
            let cap = capacity.for_slot(time_slot);
            results.push(SlotStatus {
                date: date.format("%Y-%m-%d").to_string(),
                time_slot: time_slot.clone(),
                booking_count,
                capacity: cap,
                available: booking_count < i64::from(cap),
            });
        }
    }
    Ok(results)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CapacityVerdict {
    Available,
    SlotFull { capacity: u32 },
    CategoryFull { category: String, capacity: u32 },
}

/// Whether one more booking of `category` fits in the slot under `policy`.
pub fn can_accept(
    conn: &Connection,
    date: NaiveDate,
    time_slot: &str,
    category: &str,
    policy: &CapacityPolicy,
) -> anyhow::Result<CapacityVerdict> {
    let capacity = policy.for_slot(time_slot);
    if queries::count_active_in_slot(conn, date, time_slot)? >= i64::from(capacity) {
        return Ok(CapacityVerdict::SlotFull { capacity });
    }

    if let Some(per_category) = policy.per_category {
        let in_category = queries::count_active_in_category(conn, date, time_slot, category)?;
        if in_category >= i64::from(per_category) {
            return Ok(CapacityVerdict::CategoryFull {
                category: category.to_string(),
                capacity: per_category,
            });
        }
    }

    Ok(CapacityVerdict::Available)
}
