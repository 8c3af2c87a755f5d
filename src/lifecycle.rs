//! Booking and payment-hold state machine.
//!
//! A booking starts in [`BookingStatus::Hold`] with an expiry instant. From there it is
//! confirmed by payment, failed or cancelled by the renter, or expired by the sweep.
//! Paid bookings are then accepted, rejected or completed by the equipment owner.
//!
//! The table of legal moves lives in [`Transition`]; the store applies each move as a
//! compare-and-swap on the current status, so at most one writer wins.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Hold,
    Confirmed,
    Accepted,
    Rejected,
    Failed,
    Cancelled,
    Expired,
    Completed,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        BookingStatus::Hold,
        BookingStatus::Confirmed,
        BookingStatus::Accepted,
        BookingStatus::Rejected,
        BookingStatus::Failed,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
        BookingStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Hold => "hold",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Failed => "failed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
            BookingStatus::Completed => "completed",
        }
    }

    /// Whether a booking in this status occupies the equipment calendar.
    ///
    /// `Hold` only blocks while its expiry lies in the future; callers check that
    /// separately against the stored instant.
    pub fn blocks_availability(&self) -> bool {
        matches!(
            self,
            BookingStatus::Hold | BookingStatus::Confirmed | BookingStatus::Accepted | BookingStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected
                | BookingStatus::Failed
                | BookingStatus::Cancelled
                | BookingStatus::Expired
                | BookingStatus::Completed
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown booking status: {}", s))
    }
}

/// Who may trigger a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Renter,
    Owner,
    /// Either party of the booking.
    Participant,
    /// Only the expiry sweep.
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ConfirmPayment,
    FailPayment,
    CancelPayment,
    Accept,
    Reject,
    Complete,
    CancelDates,
    Expire,
}

impl Transition {
    /// Statuses the booking must currently be in for the move to apply.
    pub fn from(&self) -> &'static [BookingStatus] {
        use BookingStatus::*;
        match self {
            Transition::ConfirmPayment
            | Transition::FailPayment
            | Transition::CancelPayment
            | Transition::Expire => &[Hold],
            Transition::Accept | Transition::Reject => &[Confirmed],
            Transition::Complete | Transition::CancelDates => &[Confirmed, Accepted],
        }
    }

    pub fn to(&self) -> BookingStatus {
        match self {
            Transition::ConfirmPayment => BookingStatus::Confirmed,
            Transition::FailPayment => BookingStatus::Failed,
            Transition::CancelPayment | Transition::CancelDates => BookingStatus::Cancelled,
            Transition::Accept => BookingStatus::Accepted,
            Transition::Reject => BookingStatus::Rejected,
            Transition::Complete => BookingStatus::Completed,
            Transition::Expire => BookingStatus::Expired,
        }
    }

    pub fn actor(&self) -> Actor {
        match self {
            Transition::ConfirmPayment | Transition::FailPayment | Transition::CancelPayment => Actor::Renter,
            Transition::Accept | Transition::Reject | Transition::Complete => Actor::Owner,
            Transition::CancelDates => Actor::Participant,
            Transition::Expire => Actor::System,
        }
    }

    /// Confirmation is the only move that must also beat the hold's expiry instant.
    pub fn requires_live_hold(&self) -> bool {
        matches!(self, Transition::ConfirmPayment)
    }

    pub fn applies_to(&self, status: BookingStatus) -> bool {
        self.from().contains(&status)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::ConfirmPayment => "confirm-payment",
            Transition::FailPayment => "fail-payment",
            Transition::CancelPayment => "cancel-payment",
            Transition::Accept => "accept",
            Transition::Reject => "reject",
            Transition::Complete => "complete",
            Transition::CancelDates => "cancel-dates",
            Transition::Expire => "expire",
        }
    }
}

/// Failures of a lifecycle operation.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("booking {0} not found")]
    NotFound(Uuid),
    #[error("only the booking's {role} may {action} it")]
    NotParticipant { role: &'static str, action: &'static str },
    #[error("cannot {action} a booking in status '{current}'")]
    InvalidState { action: &'static str, current: BookingStatus },
    #[error("payment hold on booking {0} has expired")]
    HoldExpired(Uuid),
    #[error("equipment is already booked between {start} and {end}")]
    Unavailable { start: chrono::NaiveDate, end: chrono::NaiveDate },
    #[error("payment gateway unavailable: {0}")]
    Gateway(String),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

/// Checks that `caller` may perform `transition` on a booking with the given parties.
pub fn authorize(
    transition: Transition,
    caller: Uuid,
    renter_id: Uuid,
    owner_id: Uuid,
) -> Result<(), BookingError> {
    let allowed = match transition.actor() {
        Actor::Renter => caller == renter_id,
        Actor::Owner => caller == owner_id,
        Actor::Participant => caller == renter_id || caller == owner_id,
        Actor::System => false,
    };
    if allowed {
        return Ok(());
    }
    let role = match transition.actor() {
        Actor::Renter => "renter",
        Actor::Owner => "owner",
        Actor::Participant => "renter or owner",
        Actor::System => "expiry sweep",
    };
    Err(BookingError::NotParticipant { role, action: transition.name() })
}
