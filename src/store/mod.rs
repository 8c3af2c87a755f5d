//! SQL access for users, equipment and bookings.
//!
//! Rows are read as plain strings and converted into the API types of [`crate::types`];
//! ids are stored as hyphenated UUID text.

pub mod bookings;
pub mod equipment;
pub mod users;

use uuid::Uuid;

/// Outcome of a delete that is refused while blocking bookings remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Deleted,
    /// No matching row.
    Missing,
    /// The row exists but an active or upcoming booking depends on it.
    Blocked,
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, sqlx::Error> {
    Uuid::parse_str(value).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}
