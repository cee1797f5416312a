use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, instrument, warn};

use crate::{
    auth::extractors::AuthUser,
    state::AppState,
    users::{
        dto::{CreateUserRequest, LoginRequest, TokenResponse, UserResponse},
        service::{CreateUser, UserError, UserService},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn error_response(e: UserError) -> (StatusCode, String) {
    match e {
        UserError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        UserError::UsernameConflict => (
            StatusCode::CONFLICT,
            "Could not allocate a unique username".into(),
        ),
        UserError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "Invalid username or password".into(),
        ),
        UserError::Internal(err) => {
            error!(error = %err, "internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".into(),
            )
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), (StatusCode, String)> {
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        warn!("missing first or last name");
        return Err((
            StatusCode::BAD_REQUEST,
            "First and last name are required".into(),
        ));
    }

    if payload.password.len() < 6 {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        if !is_valid_email(email) {
            warn!(email = %email, "invalid email");
            return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
        }
    }

    let service = UserService::from_ref(&state);
    let user = service
        .create_user(CreateUser {
            first_name: payload.first_name.trim().to_string(),
            last_name: payload.last_name.trim().to_string(),
            password: payload.password,
            email: email.map(str::to_string),
        })
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, (StatusCode, String)> {
    let service = UserService::from_ref(&state);
    let users = service.list_users().await.map_err(error_response)?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let service = UserService::from_ref(&state);
    let (user, access_token) = service
        .authenticate(&payload.username, &payload.password)
        .await
        .map_err(error_response)?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".into(),
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(username): AuthUser,
) -> Result<Json<UserResponse>, (StatusCode, String)> {
    let user = state
        .users
        .find_by_username(&username)
        .await
        .map_err(|e| {
            error!(error = %e, username = %username, "find_by_username failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    Ok(Json(user.into()))
}
