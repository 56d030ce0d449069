//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::auth::{self, AuthResponse, ErrorResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use devlingo_core::aggregator::load_units;
use devlingo_core::domain::{Lesson, Question, Unit, UserProfile};
use devlingo_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        list_units_handler,
        get_profile_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            AuthResponse,
            ErrorResponse,
            UnitResponse,
            LessonResponse,
            QuestionResponse,
            ProfileResponse
        )
    ),
    tags(
        (name = "Devlingo API", description = "Learning path, profile and auth endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A unit on the learning path with its derived lock state.
#[derive(Serialize, ToSchema)]
pub struct UnitResponse {
    pub id: Uuid,
    pub title: String,
    pub level: String,
    /// One of `locked`, `available`, `completed`.
    pub status: String,
    pub lessons: Vec<LessonResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct LessonResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub xp: u32,
    pub completed: bool,
    pub questions: Vec<QuestionResponse>,
}

/// Question text and options. The correct answer stays on the server, which
/// grades answers during a lesson session.
#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub id: Uuid,
    pub title: String,
    pub options: Vec<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub total_xp: i64,
}

impl From<&Question> for QuestionResponse {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            title: question.title.clone(),
            options: question.options.clone(),
        }
    }
}

impl From<&Lesson> for LessonResponse {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title.clone(),
            description: lesson.description.clone(),
            xp: lesson.xp,
            completed: lesson.completed,
            questions: lesson.questions.iter().map(QuestionResponse::from).collect(),
        }
    }
}

impl From<&Unit> for UnitResponse {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id,
            title: unit.title.clone(),
            level: unit.level.clone(),
            status: unit.status.as_str().to_string(),
            lessons: unit.lessons.iter().map(LessonResponse::from).collect(),
        }
    }
}

impl From<UserProfile> for ProfileResponse {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            name: profile.name,
            total_xp: profile.total_xp,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the caller's learning path.
///
/// An empty list means the curriculum could not be loaded.
#[utoipa::path(
    get,
    path = "/units",
    responses(
        (status = 200, description = "Units in path order", body = [UnitResponse]),
        (status = 401, description = "Not signed in")
    )
)]
pub async fn list_units_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<Vec<UnitResponse>> {
    let units = load_units(app_state.curriculum.as_ref(), user_id).await;
    Json(units.iter().map(UnitResponse::from).collect())
}

/// Fetch the caller's profile, including total xp.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's profile", body = ProfileResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Profile missing")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.profiles.fetch_profile(user_id).await {
        Ok(profile) => Ok(Json(ProfileResponse::from(profile))),
        Err(PortError::NotFound(message)) => Err((StatusCode::NOT_FOUND, message)),
        Err(e) => {
            error!("Failed to fetch profile: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch profile".to_string(),
            ))
        }
    }
}
