//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use devlingo_core::domain::{AuthSession, NewProfile};
use devlingo_core::ports::PortError;
use devlingo_core::validation::{
    normalize_email, validate_sign_in, validate_sign_up, FieldErrors,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

/// Error body shared by the auth endpoints. `fields` is only present for input errors.
#[derive(Serialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

fn failure(status: StatusCode, message: &str) -> Response {
    let body = ErrorResponse {
        message: message.to_string(),
        fields: BTreeMap::new(),
    };
    (status, Json(body)).into_response()
}

fn invalid_input(errors: FieldErrors) -> Response {
    let body = ErrorResponse {
        message: "Please correct the highlighted fields".to_string(),
        fields: errors
            .0
            .into_iter()
            .map(|(field, message)| (field.to_string(), message))
            .collect(),
    };
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}

fn session_cookie(session: &AuthSession) -> String {
    let max_age = (session.expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, session.id, max_age
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 422, description = "Invalid input", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<Response, Response> {
    validate_sign_up(&req.name, &req.email, &req.password, &req.confirm_password)
        .map_err(invalid_input)?;

    let (profile, session) = state
        .auth
        .sign_up(NewProfile {
            name: req.name,
            email: req.email,
            password: req.password,
        })
        .await
        .map_err(|e| match e {
            PortError::Conflict(message) => failure(StatusCode::CONFLICT, &message),
            other => {
                error!("Failed to create user: {:?}", other);
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user")
            }
        })?;

    info!("User {} signed up", profile.id);
    let response = AuthResponse {
        user_id: profile.id,
        email: profile.email,
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&session))],
        Json(response),
    )
        .into_response())
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Invalid input", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, Response> {
    validate_sign_in(&req.email, &req.password).map_err(invalid_input)?;

    let session = state
        .auth
        .sign_in(req.email.trim(), &req.password)
        .await
        .map_err(|e| match e {
            PortError::Unauthorized => {
                failure(StatusCode::UNAUTHORIZED, "Incorrect email or password")
            }
            other => {
                error!("Failed to sign in: {:?}", other);
                failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to sign in")
            }
        })?;

    let response = AuthResponse {
        user_id: session.user_id,
        email: normalize_email(&req.email),
    };
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session))],
        Json(response),
    )
        .into_response())
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorResponse)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, Response> {
    let auth_session_id = session_id_from_headers(&headers)
        .ok_or_else(|| failure(StatusCode::UNAUTHORIZED, "No session found"))?;

    state.auth.sign_out(auth_session_id).await.map_err(|e| {
        error!("Failed to delete auth session: {:?}", e);
        failure(StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout")
    })?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]).into_response())
}
