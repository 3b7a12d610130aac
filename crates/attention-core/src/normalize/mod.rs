//! Event Normalizer: raw provider records → canonical [`CalendarEvent`]s.
//!
//! [`CalendarEvent`]: crate::events::CalendarEvent

mod normalizer;
pub mod recurrence;
mod timestamp;

pub use normalizer::EventNormalizer;
pub use recurrence::{Frequency, RecurrenceRule};
