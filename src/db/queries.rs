use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    parse_date, AddOn, Booking, BookingReminder, BookingStatus, ReminderType, Role, Service,
    User, DATETIME_FORMAT,
};

const BOOKING_COLUMNS: &str = "b.id, b.user_id, b.service_id, b.booking_date, b.time_slot, b.status, \
     b.base_amount, b.add_on_amount, b.total_amount, b.notes, b.cancellation_reason, \
     b.completed_at, b.cancelled_at, b.created_at, b.updated_at";

const ACTIVE_STATUSES_SQL: &str = "('confirmed', 'in_progress')";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

fn fmt_opt_dt(dt: &Option<NaiveDateTime>) -> Option<String> {
    dt.as_ref().map(fmt_dt)
}

/// Inclusive bounds of a calendar day, `[00:00:00, 23:59:59.999]`.
pub fn day_bounds(date: NaiveDate) -> (String, String) {
    let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = date
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or(start);
    (fmt_dt(&start), end.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
}

// ── Users ──

pub fn create_user(conn: &Connection, user: &User) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, phone, sms_opt_in, role, api_token)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user.id,
            user.name,
            user.email,
            user.phone,
            user.sms_opt_in as i32,
            user.role.as_str(),
            user.api_token,
        ],
    )?;
    Ok(())
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        sms_opt_in: row.get::<_, i32>(4)? != 0,
        role: Role::parse(&row.get::<_, String>(5)?),
        api_token: row.get(6)?,
    })
}

pub fn get_user(conn: &Connection, id: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, phone, sms_opt_in, role, api_token FROM users WHERE id = ?1",
            params![id],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

pub fn get_user_by_token(conn: &Connection, token: &str) -> anyhow::Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, name, email, phone, sms_opt_in, role, api_token FROM users WHERE api_token = ?1",
            params![token],
            parse_user_row,
        )
        .optional()?;
    Ok(user)
}

// ── Services ──

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let service = conn
        .query_row(
            "SELECT id, name, category, duration_minutes, price FROM services WHERE id = ?1",
            params![id],
            |row| {
                Ok(Service {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    duration_minutes: row.get(3)?,
                    price: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(service)
}

// ── Bookings ──

pub fn create_booking(conn: &Connection, booking: &Booking, add_ons: &[AddOn]) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO bookings (id, user_id, service_id, booking_date, time_slot, status,
                               base_amount, add_on_amount, total_amount, notes,
                               cancellation_reason, completed_at, cancelled_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            booking.id,
            booking.user_id,
            booking.service_id,
            day_bounds(booking.booking_date).0,
            booking.time_slot,
            booking.status.as_str(),
            booking.base_amount,
            booking.add_on_amount,
            booking.total_amount,
            booking.notes,
            booking.cancellation_reason,
            fmt_opt_dt(&booking.completed_at),
            fmt_opt_dt(&booking.cancelled_at),
            fmt_dt(&booking.created_at),
            fmt_dt(&booking.updated_at),
        ],
    )
    .context("failed to insert booking")?;
    insert_add_ons(&tx, &booking.id, add_ons)?;
    tx.commit()?;
    Ok(())
}

fn insert_add_ons(conn: &Connection, booking_id: &str, add_ons: &[AddOn]) -> anyhow::Result<()> {
    let mut stmt =
        conn.prepare("INSERT INTO booking_add_ons (booking_id, name, amount) VALUES (?1, ?2, ?3)")?;
    for add_on in add_ons {
        stmt.execute(params![booking_id, add_on.name, add_on.amount])
            .context("failed to insert add-on")?;
    }
    Ok(())
}

pub fn get_add_ons(conn: &Connection, booking_id: &str) -> anyhow::Result<Vec<AddOn>> {
    let mut stmt = conn.prepare(
        "SELECT name, amount FROM booking_add_ons WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok(AddOn {
            name: row.get(0)?,
            amount: row.get(1)?,
        })
    })?;

    let mut add_ons = vec![];
    for row in rows {
        add_ons.push(row?);
    }
    Ok(add_ons)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = ?1");
    let result = conn
        .query_row(&sql, params![id], |row| Ok(parse_booking_row(row)))
        .optional()?;

    result.transpose()
}

/// Persists the lifecycle fields written by a status transition.
pub fn update_booking_status(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings
         SET status = ?1, completed_at = ?2, cancelled_at = ?3, cancellation_reason = ?4, updated_at = ?5
         WHERE id = ?6",
        params![
            booking.status.as_str(),
            fmt_opt_dt(&booking.completed_at),
            fmt_opt_dt(&booking.cancelled_at),
            booking.cancellation_reason,
            fmt_dt(&booking.updated_at),
            booking.id,
        ],
    )?;
    Ok(count > 0)
}

/// Writes schedule, notes and amounts, replacing add-ons when given. Runs in one transaction.
pub fn modify_booking(
    conn: &Connection,
    booking: &Booking,
    add_ons: Option<&[AddOn]>,
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    let count = tx.execute(
        "UPDATE bookings
         SET booking_date = ?1, time_slot = ?2, notes = ?3,
             base_amount = ?4, add_on_amount = ?5, total_amount = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            day_bounds(booking.booking_date).0,
            booking.time_slot,
            booking.notes,
            booking.base_amount,
            booking.add_on_amount,
            booking.total_amount,
            fmt_dt(&booking.updated_at),
            booking.id,
        ],
    )?;
    anyhow::ensure!(count == 1, "booking {} vanished during update", booking.id);

    if let Some(add_ons) = add_ons {
        tx.execute(
            "DELETE FROM booking_add_ons WHERE booking_id = ?1",
            params![booking.id],
        )?;
        insert_add_ons(&tx, &booking.id, add_ons)?;
    }

    tx.commit()?;
    Ok(())
}

pub fn list_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    date: Option<NaiveDate>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE 1 = 1");
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = status {
        values.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND b.status = ?{}", values.len()));
    }
    if let Some(date) = date {
        let (start, end) = day_bounds(date);
        values.push(Box::new(start));
        sql.push_str(&format!(" AND b.booking_date >= ?{}", values.len()));
        values.push(Box::new(end));
        sql.push_str(&format!(" AND b.booking_date <= ?{}", values.len()));
    }
    values.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY b.booking_date DESC, b.time_slot ASC LIMIT ?{}",
        values.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let refs: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Bookings still awaiting service whose date falls in `[from, to]`.
pub fn get_bookings_for_reminders(
    conn: &Connection,
    from: &NaiveDateTime,
    to: &NaiveDateTime,
) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b
         WHERE b.status IN ('confirmed', 'pending') AND b.booking_date >= ?1 AND b.booking_date <= ?2
         ORDER BY b.booking_date ASC, b.time_slot ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![fmt_dt(from), fmt_dt(to)], |row| {
        Ok(parse_booking_row(row))
    })?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let booking_date_str: String = row.get(3)?;
    let status_str: String = row.get(5)?;
    let completed_at: Option<String> = row.get(11)?;
    let cancelled_at: Option<String> = row.get(12)?;
    let created_at: String = row.get(13)?;
    let updated_at: String = row.get(14)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_id: row.get(2)?,
        booking_date: parse_date(&booking_date_str)
            .with_context(|| format!("invalid booking_date: {booking_date_str}"))?,
        time_slot: row.get(4)?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("invalid booking status: {status_str}"))?,
        base_amount: row.get(6)?,
        add_on_amount: row.get(7)?,
        total_amount: row.get(8)?,
        notes: row.get(9)?,
        cancellation_reason: row.get(10)?,
        completed_at: completed_at.as_deref().map(parse_dt).transpose()?,
        cancelled_at: cancelled_at.as_deref().map(parse_dt).transpose()?,
        created_at: parse_dt(&created_at)?,
        updated_at: parse_dt(&updated_at)?,
    })
}

fn parse_dt(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .with_context(|| format!("invalid timestamp: {s}"))
}

// ── Slot occupancy ──

pub fn count_active_in_slot(conn: &Connection, date: NaiveDate, time_slot: &str) -> anyhow::Result<i64> {
    let (start, end) = day_bounds(date);
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM bookings
             WHERE booking_date >= ?1 AND booking_date <= ?2 AND time_slot = ?3
               AND status IN {ACTIVE_STATUSES_SQL}"
        ),
        params![start, end, time_slot],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn active_service_ids_in_slot(
    conn: &Connection,
    date: NaiveDate,
    time_slot: &str,
) -> anyhow::Result<Vec<String>> {
    let (start, end) = day_bounds(date);
    let mut stmt = conn.prepare(&format!(
        "SELECT service_id FROM bookings
         WHERE booking_date >= ?1 AND booking_date <= ?2 AND time_slot = ?3
           AND status IN {ACTIVE_STATUSES_SQL}
         ORDER BY created_at ASC"
    ))?;
    let rows = stmt.query_map(params![start, end, time_slot], |row| row.get(0))?;

    let mut ids = vec![];
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Active bookings in the slot whose service name contains `name_fragment`, ignoring case.
/// Bookings pointing at ids missing from the catalogue are matched on the raw id.
pub fn count_active_matching_service(
    conn: &Connection,
    date: NaiveDate,
    time_slot: &str,
    name_fragment: &str,
) -> anyhow::Result<i64> {
    let (start, end) = day_bounds(date);
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM bookings b
             LEFT JOIN services s ON s.id = b.service_id
             WHERE b.booking_date >= ?1 AND b.booking_date <= ?2 AND b.time_slot = ?3
               AND b.status IN {ACTIVE_STATUSES_SQL}
               AND LOWER(COALESCE(s.name, b.service_id)) LIKE '%' || LOWER(?4) || '%'"
        ),
        params![start, end, time_slot, name_fragment],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_active_in_category(
    conn: &Connection,
    date: NaiveDate,
    time_slot: &str,
    category: &str,
) -> anyhow::Result<i64> {
    let (start, end) = day_bounds(date);
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM bookings b
             JOIN services s ON s.id = b.service_id
             WHERE b.booking_date >= ?1 AND b.booking_date <= ?2 AND b.time_slot = ?3
               AND b.status IN {ACTIVE_STATUSES_SQL} AND s.category = ?4"
        ),
        params![start, end, time_slot, category],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_active_on_day(conn: &Connection, date: NaiveDate) -> anyhow::Result<i64> {
    let (start, end) = day_bounds(date);
    let count = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM bookings
             WHERE booking_date >= ?1 AND booking_date <= ?2 AND status IN {ACTIVE_STATUSES_SQL}"
        ),
        params![start, end],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn active_counts_by_slot(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<(String, i64)>> {
    let (start, end) = day_bounds(date);
    let mut stmt = conn.prepare(&format!(
        "SELECT time_slot, COUNT(*) FROM bookings
         WHERE booking_date >= ?1 AND booking_date <= ?2 AND status IN {ACTIVE_STATUSES_SQL}
         GROUP BY time_slot ORDER BY time_slot ASC"
    ))?;
    let rows = stmt.query_map(params![start, end], |row| Ok((row.get(0)?, row.get(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        counts.push(row?);
    }
    Ok(counts)
}

pub fn counts_by_status(conn: &Connection, date: NaiveDate) -> anyhow::Result<Vec<(BookingStatus, i64)>> {
    let (start, end) = day_bounds(date);
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM bookings
         WHERE booking_date >= ?1 AND booking_date <= ?2
         GROUP BY status",
    )?;
    let rows = stmt.query_map(params![start, end], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = vec![];
    for row in rows {
        let (status, count) = row?;
        if let Some(status) = BookingStatus::parse(&status) {
            counts.push((status, count));
        }
    }
    Ok(counts)
}

// ── Reminders ──

pub fn has_sent_reminder(
    conn: &Connection,
    booking_id: &str,
    reminder_type: ReminderType,
) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM booking_reminders
         WHERE booking_id = ?1 AND reminder_type = ?2 AND sent_at IS NOT NULL",
        params![booking_id, reminder_type.as_str()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn insert_reminder(conn: &Connection, reminder: &BookingReminder) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_reminders (id, booking_id, reminder_type, sent_at, email_sent, sms_sent, message)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            reminder.id,
            reminder.booking_id,
            reminder.reminder_type.as_str(),
            fmt_opt_dt(&reminder.sent_at),
            reminder.email_sent as i32,
            reminder.sms_sent as i32,
            reminder.message,
        ],
    )
    .context("failed to record reminder")?;
    Ok(())
}

pub fn get_reminders_for_booking(
    conn: &Connection,
    booking_id: &str,
) -> anyhow::Result<Vec<BookingReminder>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, reminder_type, sent_at, email_sent, sms_sent, message
         FROM booking_reminders WHERE booking_id = ?1 ORDER BY created_at ASC, rowid ASC",
    )?;
    let rows = stmt.query_map(params![booking_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, i32>(4)? != 0,
            row.get::<_, i32>(5)? != 0,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut reminders = vec![];
    for row in rows {
        let (id, booking_id, kind, sent_at, email_sent, sms_sent, message) = row?;
        let reminder_type = ReminderType::parse(&kind)
            .with_context(|| format!("invalid reminder type: {kind}"))?;
        reminders.push(BookingReminder {
            id,
            booking_id,
            reminder_type,
            sent_at: sent_at.as_deref().map(parse_dt).transpose()?,
            email_sent,
            sms_sent,
            message,
        });
    }
    Ok(reminders)
}

// ── Login attempts ──

pub struct LoginAttempts {
    pub failures: u32,
    pub first_failure_at: NaiveDateTime,
    pub locked_until: Option<NaiveDateTime>,
}

pub fn get_login_attempts(conn: &Connection, key: &str) -> anyhow::Result<Option<LoginAttempts>> {
    let row = conn
        .query_row(
            "SELECT failures, first_failure_at, locked_until FROM login_attempts WHERE key = ?1",
            params![key],
            |row| {
                Ok((
                    row.get::<_, u32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(failures, first, locked)| {
        Ok(LoginAttempts {
            failures,
            first_failure_at: parse_dt(&first)?,
            locked_until: locked.as_deref().map(parse_dt).transpose()?,
        })
    })
    .transpose()
}

pub fn save_login_attempts(conn: &Connection, key: &str, attempts: &LoginAttempts) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO login_attempts (key, failures, first_failure_at, locked_until)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(key) DO UPDATE SET
           failures = excluded.failures,
           first_failure_at = excluded.first_failure_at,
           locked_until = excluded.locked_until",
        params![
            key,
            attempts.failures,
            fmt_dt(&attempts.first_failure_at),
            fmt_opt_dt(&attempts.locked_until),
        ],
    )?;
    Ok(())
}

pub fn clear_login_attempts(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM login_attempts WHERE key = ?1", params![key])?;
    Ok(())
}
