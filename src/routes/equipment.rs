use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{validation, AppError, AppResult, OptionExt},
    extract::{Json, Path, Query},
    middleware::auth::AuthUser,
    state::AppState,
    store::{bookings, equipment, Removal},
    types::{CreateEquipmentRequest, DateRange, Equipment, EquipmentQuery, Role, UpdateEquipmentRequest},
};

pub async fn list_equipment(
    State(state): State<AppState>,
    Query(q): Query<EquipmentQuery>,
) -> AppResult<Json<Vec<Equipment>>> {
    match (q.start_date, q.end_date) {
        (Some(start), Some(end)) => {
            validation::validate_date_range(start, end)?;
        }
        (None, None) => {}
        _ => {
            return Err(AppError::BadRequest("start_date and end_date must be given together".to_string()));
        }
    }
    Ok(Json(equipment::list(&state.db, &q, Utc::now()).await?))
}

pub async fn create_equipment(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(req): Json<CreateEquipmentRequest>,
) -> AppResult<(StatusCode, Json<Equipment>)> {
    if caller.role == Role::Renter {
        return Err(AppError::Forbidden("Only owners can list equipment".to_string()));
    }
    validation::required(&req.name, "name")?;
    validation::required(&req.category, "category")?;
    validation::required(&req.location, "location")?;
    validation::validate_price(req.price_per_day, "price_per_day")?;

    let item = equipment::insert(&state.db, caller.id, &req, Utc::now()).await?;
    tracing::info!(equipment_id = %item.id, owner_id = %caller.id, "equipment listed");
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn categories(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(equipment::categories(&state.db).await?))
}

pub async fn locations(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(equipment::locations(&state.db).await?))
}

pub async fn get_equipment(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Json<Equipment>> {
    let item = equipment::find(&state.db, id).await?.ok_or_not_found("Equipment")?;
    Ok(Json(item))
}

/// Resolves the equipment and rejects callers who do not own it.
async fn owned(state: &AppState, id: Uuid, caller: &AuthUser) -> AppResult<Equipment> {
    let item = equipment::find(&state.db, id).await?.ok_or_not_found("Equipment")?;
    if item.owner_id != caller.id {
        return Err(AppError::Forbidden("Only the owner may modify this equipment".to_string()));
    }
    Ok(item)
}

pub async fn update_equipment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateEquipmentRequest>,
) -> AppResult<Json<Equipment>> {
    owned(&state, id, &caller).await?;
    for (value, field) in [(&req.name, "name"), (&req.category, "category"), (&req.location, "location")] {
        if let Some(value) = value.as_deref() {
            validation::required(value, field)?;
        }
    }
    if let Some(price) = req.price_per_day {
        validation::validate_price(price, "price_per_day")?;
    }

    // Ownership is checked again by the update itself
    let item = equipment::update_owned(&state.db, id, caller.id, &req, Utc::now())
        .await?
        .ok_or_not_found("Equipment")?;
    Ok(Json(item))
}

pub async fn delete_equipment(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    owned(&state, id, &caller).await?;

    match equipment::delete_owned(&state.db, id, caller.id, Utc::now()).await? {
        Removal::Deleted => {}
        Removal::Missing => return Err(AppError::NotFound("Equipment not found".to_string())),
        Removal::Blocked => {
            return Err(AppError::Conflict("Equipment has active or upcoming bookings".to_string()));
        }
    }
    tracing::info!(equipment_id = %id, owner_id = %caller.id, "equipment deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unavailable_dates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<DateRange>>> {
    equipment::find(&state.db, id).await?.ok_or_not_found("Equipment")?;
    Ok(Json(bookings::blocking_ranges(&state.db, id, None, Utc::now()).await?))
}
