//! Booking persistence and the conditional updates behind every lifecycle move.
//!
//! No statement here reads a status and writes it back in two steps: holds are
//! inserted only if no blocking booking overlaps, and transitions update only rows
//! still in an expected status. SQLite serialises writers, so under concurrent
//! callers exactly one conditional update can match a given row.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use super::{decode_error, parse_uuid};
use crate::lifecycle::{authorize, BookingError, BookingStatus, Transition};
use crate::types::{Booking, BookingView, DateRange};

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: String,
    equipment_id: String,
    renter_id: String,
    owner_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    status: String,
    hold_expires_at: i64,
    total_price: f64,
    payment_reference: Option<String>,
    notes: Option<String>,
    status_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = sqlx::Error;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: parse_uuid(&row.id)?,
            equipment_id: parse_uuid(&row.equipment_id)?,
            renter_id: parse_uuid(&row.renter_id)?,
            owner_id: parse_uuid(&row.owner_id)?,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status.parse().map_err(decode_error)?,
            hold_expires_at: row.hold_expires_at,
            total_price: row.total_price,
            payment_reference: row.payment_reference,
            notes: row.notes,
            status_reason: row.status_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, equipment_id, renter_id, owner_id, start_date, end_date, status, \
     hold_expires_at, total_price, payment_reference, notes, status_reason, created_at, updated_at";

/// SQL list of statuses that always block the calendar, e.g. `'confirmed','accepted'`.
fn settled_blocking_statuses() -> String {
    BookingStatus::ALL
        .iter()
        .filter(|s| s.blocks_availability() && **s != BookingStatus::Hold)
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

fn status_list(statuses: &[BookingStatus]) -> String {
    statuses.iter().map(|s| format!("'{}'", s.as_str())).collect::<Vec<_>>().join(",")
}

/// Appends `AND <booking b overlaps [start, end] and blocks the calendar at now>`.
///
/// An open bound matches every date on that side. The caller must already have a
/// booking alias `b` in scope.
pub(crate) fn push_blocking_overlap(
    qb: &mut QueryBuilder<'_, Sqlite>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    now: DateTime<Utc>,
) {
    if let Some(end) = end {
        qb.push(" AND b.start_date <= ").push_bind(end);
    }
    if let Some(start) = start {
        qb.push(" AND b.end_date >= ").push_bind(start);
    }
    qb.push(format!(" AND (b.status IN ({}) OR (b.status = 'hold' AND b.hold_expires_at > ", settled_blocking_statuses()))
        .push_bind(now.timestamp_millis())
        .push("))");
}

pub struct NewHold {
    pub equipment_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_price: f64,
    pub notes: Option<String>,
}

/// Places a payment hold, failing with [`BookingError::Unavailable`] if any blocking
/// booking overlaps the requested dates.
///
/// The availability check and the insert are one statement, so two overlapping holds
/// racing each other cannot both be stored.
pub async fn create_hold(
    pool: &SqlitePool,
    hold: NewHold,
    now: DateTime<Utc>,
    hold_duration: Duration,
) -> Result<Booking, BookingError> {
    let id = Uuid::new_v4();
    let expires_at = (now + hold_duration).timestamp_millis();

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO bookings (id, equipment_id, renter_id, owner_id, start_date, end_date, status, \
         hold_expires_at, total_price, payment_reference, notes, status_reason, created_at, updated_at) SELECT ",
    );
    {
        let mut values = qb.separated(", ");
        values.push_bind(id.to_string());
        values.push_bind(hold.equipment_id.to_string());
        values.push_bind(hold.renter_id.to_string());
        values.push_bind(hold.owner_id.to_string());
        values.push_bind(hold.start_date);
        values.push_bind(hold.end_date);
        values.push_bind(BookingStatus::Hold.as_str());
        values.push_bind(expires_at);
        values.push_bind(hold.total_price);
        values.push("NULL");
        values.push_bind(hold.notes);
        values.push("NULL");
        values.push_bind(now);
        values.push_bind(now);
    }
    qb.push(" WHERE NOT EXISTS (SELECT 1 FROM bookings b WHERE b.equipment_id = ")
        .push_bind(hold.equipment_id.to_string());
    push_blocking_overlap(&mut qb, Some(hold.start_date), Some(hold.end_date), now);
    qb.push(")");

    let res = qb.build().execute(pool).await?;
    if res.rows_affected() == 0 {
        return Err(BookingError::Unavailable { start: hold.start_date, end: hold.end_date });
    }
    find(pool, id).await?.ok_or(BookingError::NotFound(id))
}

pub async fn find(pool: &SqlitePool, id: Uuid) -> Result<Option<Booking>, sqlx::Error> {
    let row: Option<BookingRow> = sqlx::query_as(&format!("SELECT {} FROM bookings WHERE id = ?1", BOOKING_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.map(Booking::try_from).transpose()
}

pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: Uuid,
    view: BookingView,
    status: Option<BookingStatus>,
) -> Result<Vec<Booking>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!("SELECT {} FROM bookings WHERE ", BOOKING_COLUMNS));
    match view {
        BookingView::Renter => qb.push("renter_id = "),
        BookingView::Owner => qb.push("owner_id = "),
    };
    qb.push_bind(user_id.to_string());
    if let Some(status) = status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    qb.push(" ORDER BY created_at DESC");
    let rows: Vec<BookingRow> = qb.build_query_as().fetch_all(pool).await?;
    rows.into_iter().map(Booking::try_from).collect()
}

/// Booking ranges that currently block `equipment_id`, optionally limited to those
/// overlapping `[start, end]`.
pub async fn blocking_ranges(
    pool: &SqlitePool,
    equipment_id: Uuid,
    within: Option<(NaiveDate, NaiveDate)>,
    now: DateTime<Utc>,
) -> Result<Vec<DateRange>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT b.id, b.start_date, b.end_date, b.status FROM bookings b WHERE b.equipment_id = ",
    );
    qb.push_bind(equipment_id.to_string());
    match within {
        Some((start, end)) => push_blocking_overlap(&mut qb, Some(start), Some(end), now),
        None => push_blocking_overlap(&mut qb, None, None, now),
    }
    qb.push(" ORDER BY b.start_date");

    let rows: Vec<(String, NaiveDate, NaiveDate, String)> = qb.build_query_as().fetch_all(pool).await?;
    rows.into_iter()
        .map(|(id, start_date, end_date, status)| {
            Ok(DateRange {
                booking_id: parse_uuid(&id)?,
                start_date,
                end_date,
                status: status.parse().map_err(decode_error)?,
            })
        })
        .collect()
}

/// Extra fields written together with a status change.
#[derive(Debug, Default, Clone)]
pub struct TransitionDetails {
    pub payment_reference: Option<String>,
    pub reason: Option<String>,
}

/// Checks that `caller` may apply `transition` and that the booking is currently in
/// one of its source statuses, without writing anything.
pub async fn precheck(
    pool: &SqlitePool,
    id: Uuid,
    caller: Uuid,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    let booking = find(pool, id).await?.ok_or(BookingError::NotFound(id))?;
    authorize(transition, caller, booking.renter_id, booking.owner_id)?;
    if !transition.applies_to(booking.status) {
        return Err(BookingError::InvalidState { action: transition.name(), current: booking.status });
    }
    if transition.requires_live_hold() && booking.hold_expires_at <= now.timestamp_millis() {
        return Err(BookingError::HoldExpired(id));
    }
    Ok(booking)
}

/// Applies a caller-initiated transition as a compare-and-swap on the status.
///
/// Succeeds only if the row is still in one of the transition's source statuses when the
/// update runs; a caller that loses a race gets [`BookingError::InvalidState`] with the
/// status the winner wrote.
pub async fn transition(
    pool: &SqlitePool,
    id: Uuid,
    caller: Uuid,
    transition: Transition,
    details: TransitionDetails,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    let booking = find(pool, id).await?.ok_or(BookingError::NotFound(id))?;
    authorize(transition, caller, booking.renter_id, booking.owner_id)?;
    apply(pool, id, transition, details, now).await
}

async fn apply(
    pool: &SqlitePool,
    id: Uuid,
    transition: Transition,
    details: TransitionDetails,
    now: DateTime<Utc>,
) -> Result<Booking, BookingError> {
    let mut sql = format!(
        "UPDATE bookings SET status = ?1, updated_at = ?2, \
         payment_reference = COALESCE(?3, payment_reference), status_reason = COALESCE(?4, status_reason) \
         WHERE id = ?5 AND status IN ({})",
        status_list(transition.from())
    );
    if transition.requires_live_hold() {
        sql.push_str(" AND hold_expires_at > ?6");
    }

    let mut query = sqlx::query(&sql)
        .bind(transition.to().as_str())
        .bind(now)
        .bind(details.payment_reference)
        .bind(details.reason)
        .bind(id.to_string());
    if transition.requires_live_hold() {
        query = query.bind(now.timestamp_millis());
    }
    let res = query.execute(pool).await?;

    let current = find(pool, id).await?.ok_or(BookingError::NotFound(id))?;
    if res.rows_affected() == 1 {
        tracing::info!(booking_id = %id, action = transition.name(), status = %current.status, "booking transitioned");
        return Ok(current);
    }
    if current.status == BookingStatus::Hold && transition.requires_live_hold() {
        return Err(BookingError::HoldExpired(id));
    }
    Err(BookingError::InvalidState { action: transition.name(), current: current.status })
}

/// Moves every hold whose expiry instant is at or before `now` to `expired`.
///
/// A single conditional update: holds confirmed, failed or cancelled in the meantime no
/// longer match `status = 'hold'` and are left alone. Returns the number of holds expired.
pub async fn expire_stale_holds(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        r#"UPDATE bookings
           SET status = ?1, updated_at = ?2, status_reason = COALESCE(status_reason, 'payment hold expired')
           WHERE status = ?3 AND hold_expires_at <= ?4"#,
    )
    .bind(Transition::Expire.to().as_str())
    .bind(now)
    .bind(BookingStatus::Hold.as_str())
    .bind(now.timestamp_millis())
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

