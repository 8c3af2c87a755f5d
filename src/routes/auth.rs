use axum::{extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    auth::{hash_password, issue_token, verify_password},
    extract::Json,
    error::{validation, AppError, AppResult, OptionExt},
    middleware::auth::AuthUser,
    state::AppState,
    store::users::{self, NewUser},
    types::{AuthResponse, LoginRequest, RegisterRequest, Role, User},
};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    validation::required(&req.name, "name")?;
    validation::validate_email(&req.email)?;
    validation::validate_password(&req.password)?;

    let role = req.role.unwrap_or(Role::Renter);
    if role == Role::Admin {
        return Err(AppError::validation("role", "must be 'renter' or 'owner'"));
    }

    let password = req.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(anyhow::Error::from)??;

    let new = NewUser {
        name: &req.name,
        email: &req.email,
        phone: req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
        role,
        password_hash,
    };
    let user = users::insert(&state.db, new, Utc::now()).await.map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("A user with this email already exists".to_string()),
        other => other,
    })?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");

    let token = issue_token(&state.config.auth, &user)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> AppResult<Json<AuthResponse>> {
    let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

    let (user, hash) = users::find_credentials(&state.db, &req.email).await?.ok_or_else(invalid)?;
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(anyhow::Error::from)?;
    if !matches {
        tracing::debug!(user_id = %user.id, "login rejected");
        return Err(invalid());
    }

    let token = issue_token(&state.config.auth, &user)?;
    Ok(Json(AuthResponse { token, user }))
}

pub async fn me(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<User>> {
    let user = users::find(&state.db, caller.id).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}
