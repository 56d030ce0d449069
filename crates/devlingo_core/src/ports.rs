//! crates/devlingo_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database and the authentication backend.

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{AuthEvent, AuthSession, CompletionRecord, NewProfile, UserProfile};
use crate::rows::{CompletionRow, LessonRow, OptionRow, QuestionRow, UnitRow};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Read-only access to authored curriculum content and per-user completion facts.
///
/// Units and lessons come back in creation order; questions and options in
/// `position` order. Callers must not re-sort units or lessons.
#[async_trait]
pub trait CurriculumStore: Send + Sync {
    async fn fetch_units(&self) -> PortResult<Vec<UnitRow>>;

    async fn fetch_lessons(&self) -> PortResult<Vec<LessonRow>>;

    async fn fetch_questions(&self) -> PortResult<Vec<QuestionRow>>;

    async fn fetch_options(&self) -> PortResult<Vec<OptionRow>>;

    async fn fetch_completions(&self, user_id: Uuid) -> PortResult<Vec<CompletionRow>>;
}

#[async_trait]
pub trait CompletionRecorder: Send + Sync {
    /// Marks a lesson completed for a user and credits the xp.
    ///
    /// Idempotent per (user, lesson): a second call overwrites the stored xp and
    /// timestamp instead of creating another record.
    async fn upsert_completion(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        xp_earned: u32,
    ) -> PortResult<CompletionRecord>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<UserProfile>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and opens a new auth session.
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    /// Creates the account and its profile, then opens an auth session.
    async fn sign_up(&self, profile: NewProfile) -> PortResult<(UserProfile, AuthSession)>;

    async fn sign_out(&self, session_id: &str) -> PortResult<()>;

    /// Resolves a live auth session to its user.
    async fn validate(&self, session_id: &str) -> PortResult<Uuid>;

    /// Subscribes to sign-in and sign-out notifications. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}
