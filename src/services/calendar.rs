use chrono::Duration;

use crate::models::{Booking, Service, DEFAULT_DURATION_MINUTES};

/// Renders a single-event iCalendar file for the booking. `None` when the slot does not parse.
pub fn generate_ics(booking: &Booking, service: Option<&Service>, business_name: &str) -> Option<String> {
    let starts_at = booking.start_at()?;
    let duration = service
        .map(|s| s.duration_minutes)
        .filter(|d| *d > 0)
        .unwrap_or(DEFAULT_DURATION_MINUTES);

    let dtstart = starts_at.format("%Y%m%dT%H%M%S").to_string();
    let dtend = (starts_at + Duration::minutes(duration))
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = booking.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@washbay", booking.id);

    let service_name = service.map(|s| s.name.as_str()).unwrap_or("Car wash");
    let summary = format!("{service_name} at {business_name}");
    let description = booking
        .notes
        .as_deref()
        .unwrap_or("No additional notes")
        .replace('\n', "\\n");

    Some(format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Washbay//Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    ))
}
