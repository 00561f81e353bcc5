pub mod booking;
pub mod opening_hours;
pub mod reminder;
pub mod service;
pub mod user;

pub use booking::{canonical_time_slot, parse_date, parse_time_slot, AddOn, Booking, BookingStatus, DATETIME_FORMAT};
pub use opening_hours::OpeningHours;
pub use reminder::{BookingReminder, ReminderType};
pub use service::{Service, DEFAULT_DURATION_MINUTES};
pub use user::{Role, User};
