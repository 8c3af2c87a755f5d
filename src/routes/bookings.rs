use axum::{body::Bytes, extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{validation, AppError, AppResult, OptionExt},
    extract::{Json, Path, Query},
    lifecycle::{BookingError, Transition},
    middleware::auth::AuthUser,
    payment::{self, ConfirmOutcome},
    state::AppState,
    store::{
        bookings::{self, NewHold, TransitionDetails},
        equipment,
    },
    types::{
        AvailabilityQuery, AvailabilityResponse, Booking, BookingListQuery, ConfirmPaymentRequest,
        PaymentHoldRequest, PaymentHoldResponse, ReasonRequest,
    },
};

pub async fn list_bookings(
    State(state): State<AppState>,
    caller: AuthUser,
    Query(q): Query<BookingListQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    Ok(Json(bookings::list_for_user(&state.db, caller.id, q.view, q.status).await?))
}

pub async fn get_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Booking>> {
    let booking = bookings::find(&state.db, id).await?.ok_or_not_found("Booking")?;
    if caller.id != booking.renter_id && caller.id != booking.owner_id {
        return Err(AppError::Forbidden("Only the renter or owner may view this booking".to_string()));
    }
    Ok(Json(booking))
}

pub async fn create_payment_hold(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<PaymentHoldRequest>,
) -> AppResult<(StatusCode, Json<PaymentHoldResponse>)> {
    let now = Utc::now();
    let days = validation::validate_date_range(req.start_date, req.end_date)?;
    if req.start_date < now.date_naive() {
        return Err(AppError::validation("start_date", "must not be in the past"));
    }
    let max_days = state.config.holds.max_rental_days;
    if days > max_days {
        return Err(AppError::validation("end_date", format!("rental may not exceed {} days", max_days)));
    }

    let item = equipment::find(&state.db, req.equipment_id).await?.ok_or_not_found("Equipment")?;
    if !item.available {
        return Err(AppError::Conflict("Equipment is not available for rent".to_string()));
    }
    if item.owner_id == caller.id {
        return Err(AppError::BadRequest("You cannot rent your own equipment".to_string()));
    }

    let hold = NewHold {
        equipment_id: item.id,
        renter_id: caller.id,
        owner_id: item.owner_id,
        start_date: req.start_date,
        end_date: req.end_date,
        total_price: item.price_per_day * days as f64,
        notes: req.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
    };
    let booking = bookings::create_hold(&state.db, hold, now, state.hold_duration()).await?;
    state.metrics.inc_holds_created();
    tracing::info!(
        booking_id = %booking.id,
        equipment_id = %booking.equipment_id,
        renter_id = %caller.id,
        "payment hold placed"
    );

    let hold_expires_at = booking
        .hold_expires_at_utc()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("hold expiry out of range")))?;
    Ok((StatusCode::CREATED, Json(PaymentHoldResponse { booking, hold_expires_at })))
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> AppResult<Json<Booking>> {
    validation::required(&req.payment_reference, "payment_reference")?;

    let outcome =
        payment::confirm_hold(&state.db, state.payments.as_ref(), id, caller.id, &req.payment_reference, Utc::now())
            .await?;
    match outcome {
        ConfirmOutcome::Confirmed(booking) => {
            state.metrics.inc_payments_confirmed();
            Ok(Json(booking))
        }
        ConfirmOutcome::Declined { booking, reason } => {
            state.metrics.inc_payments_failed();
            tracing::warn!(booking_id = %booking.id, "payment declined: {}", reason);
            Err(AppError::PaymentDeclined(reason))
        }
    }
}

/// Reads the optional `{"reason": ...}` body; an empty body means no reason.
fn parse_reason(body: &Bytes) -> AppResult<Option<String>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let req: ReasonRequest =
        serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;
    Ok(req.reason)
}

async fn run_transition(
    state: &AppState,
    caller: &AuthUser,
    id: Uuid,
    transition: Transition,
    reason: Option<String>,
) -> Result<Booking, BookingError> {
    let details = TransitionDetails {
        payment_reference: None,
        reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
    };
    bookings::transition(&state.db, id, caller.id, transition, details, Utc::now()).await
}

pub async fn fail_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Booking>> {
    let reason = parse_reason(&body)?;
    let booking = run_transition(&state, &caller, id, Transition::FailPayment, reason).await?;
    state.metrics.inc_payments_failed();
    Ok(Json(booking))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Booking>> {
    let reason = parse_reason(&body)?;
    let booking = run_transition(&state, &caller, id, Transition::CancelPayment, reason).await?;
    state.metrics.inc_holds_cancelled();
    Ok(Json(booking))
}

pub async fn accept(State(state): State<AppState>, caller: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Booking>> {
    Ok(Json(run_transition(&state, &caller, id, Transition::Accept, None).await?))
}

pub async fn reject(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Booking>> {
    let reason = parse_reason(&body)?;
    Ok(Json(run_transition(&state, &caller, id, Transition::Reject, reason).await?))
}

pub async fn complete(State(state): State<AppState>, caller: AuthUser, Path(id): Path<Uuid>) -> AppResult<Json<Booking>> {
    Ok(Json(run_transition(&state, &caller, id, Transition::Complete, None).await?))
}

pub async fn cancel_dates(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<Booking>> {
    let reason = parse_reason(&body)?;
    Ok(Json(run_transition(&state, &caller, id, Transition::CancelDates, reason).await?))
}

pub async fn availability(
    State(state): State<AppState>,
    Path(equipment_id): Path<Uuid>,
    Query(q): Query<AvailabilityQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    validation::validate_date_range(q.start_date, q.end_date)?;
    let item = equipment::find(&state.db, equipment_id).await?.ok_or_not_found("Equipment")?;

    let conflicts =
        bookings::blocking_ranges(&state.db, equipment_id, Some((q.start_date, q.end_date)), Utc::now()).await?;
    Ok(Json(AvailabilityResponse {
        equipment_id,
        start_date: q.start_date,
        end_date: q.end_date,
        available: item.available && conflicts.is_empty(),
        conflicts,
    }))
}
