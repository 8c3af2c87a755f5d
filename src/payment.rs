//! The payment gateway seam and the confirm-payment flow built on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::lifecycle::{BookingError, Transition};
use crate::store::bookings::{self, TransitionDetails};
use crate::types::Booking;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentDecision {
    Approved,
    Declined { reason: String },
}

/// Confirms the charge behind a payment hold.
///
/// Implementations talk to a real provider; the core only needs a yes or no for a
/// booking and the client-supplied payment reference.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn confirm(&self, booking: &Booking, payment_reference: &str) -> anyhow::Result<PaymentDecision>;
}

/// Accepts every well-formed reference. Used when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct ReferenceGateway;

#[async_trait]
impl PaymentGateway for ReferenceGateway {
    async fn confirm(&self, _booking: &Booking, payment_reference: &str) -> anyhow::Result<PaymentDecision> {
        let reference = payment_reference.trim();
        if reference.is_empty() || reference.len() > 128 {
            return Ok(PaymentDecision::Declined { reason: "malformed payment reference".to_string() });
        }
        Ok(PaymentDecision::Approved)
    }
}

#[derive(Debug)]
pub enum ConfirmOutcome {
    Confirmed(Booking),
    /// The gateway refused the charge; the hold has been moved to `failed`.
    Declined { booking: Booking, reason: String },
}

/// Charges the hold through `gateway` and records the result.
///
/// The booking is checked before the gateway is called so expired or already settled
/// holds are never charged. The final write is still a compare-and-swap, so a sweep that
/// expires the hold while the gateway is deciding wins and the confirmation reports
/// [`BookingError::HoldExpired`].
pub async fn confirm_hold(
    pool: &SqlitePool,
    gateway: &dyn PaymentGateway,
    booking_id: Uuid,
    caller: Uuid,
    payment_reference: &str,
    now: DateTime<Utc>,
) -> Result<ConfirmOutcome, BookingError> {
    let booking = bookings::precheck(pool, booking_id, caller, Transition::ConfirmPayment, now).await?;

    let decision = match gateway.confirm(&booking, payment_reference).await {
        Ok(decision) => decision,
        Err(e) => {
            // Leave the hold in place; the renter may retry until it expires
            tracing::error!(booking_id = %booking_id, "payment gateway error: {:#}", e);
            return Err(BookingError::Gateway(e.to_string()));
        }
    };

    match decision {
        PaymentDecision::Approved => {
            let details = TransitionDetails {
                payment_reference: Some(payment_reference.trim().to_string()),
                reason: None,
            };
            let booking =
                bookings::transition(pool, booking_id, caller, Transition::ConfirmPayment, details, now).await?;
            Ok(ConfirmOutcome::Confirmed(booking))
        }
        PaymentDecision::Declined { reason } => {
            let details = TransitionDetails {
                payment_reference: Some(payment_reference.trim().to_string()),
                reason: Some(reason.clone()),
            };
            let booking = bookings::transition(pool, booking_id, caller, Transition::FailPayment, details, now).await?;
            Ok(ConfirmOutcome::Declined { booking, reason })
        }
    }
}
