use axum::{extract::State, http::StatusCode};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::{validation, AppError, AppResult, OptionExt},
    extract::{Json, Path},
    middleware::auth::AuthUser,
    state::AppState,
    store::{
        users::{self, UserChanges},
        Removal,
    },
    types::{UpdateUserRequest, User},
};

pub async fn list_users(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<Vec<User>>> {
    caller.require_admin()?;
    Ok(Json(users::list(&state.db).await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<User>> {
    caller.require_self_or_admin(id)?;
    let user = users::find(&state.db, id).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}

pub async fn update_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<User>> {
    caller.require_self_or_admin(id)?;
    if req.role.is_some() && !caller.is_admin() {
        return Err(AppError::Forbidden("Only an admin may change roles".to_string()));
    }
    if let Some(name) = req.name.as_deref() {
        validation::required(name, "name")?;
    }

    let changes = UserChanges { name: req.name.as_deref(), phone: req.phone.as_deref(), role: req.role };
    let user = users::update(&state.db, id, changes).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    caller.require_self_or_admin(id)?;
    match users::delete(&state.db, id, Utc::now()).await? {
        Removal::Deleted => {}
        Removal::Missing => return Err(AppError::NotFound("User not found".to_string())),
        Removal::Blocked => {
            return Err(AppError::Conflict("User has active or upcoming bookings".to_string()));
        }
    }
    tracing::info!(user_id = %id, deleted_by = %caller.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
