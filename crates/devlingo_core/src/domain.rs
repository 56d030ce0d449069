//! crates/devlingo_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Curriculum Tree (derived by the aggregator)
//=========================================================================================

/// Lock state of a unit on the learning path. Always derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Locked,
    Available,
    Completed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Locked => "locked",
            UnitStatus::Available => "available",
            UnitStatus::Completed => "completed",
        }
    }
}

/// A top-level grouping of lessons, unlocked sequentially.
#[derive(Debug, Clone)]
pub struct Unit {
    pub id: Uuid,
    pub title: String,
    pub level: String,
    pub status: UnitStatus,
    pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub xp: u32,
    pub completed: bool,
    pub questions: Vec<Question>,
}

/// A multiple-choice question. `correct_answer` indexes into `options`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: Uuid,
    pub title: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

//=========================================================================================
// User Facts
//=========================================================================================

/// The durable fact that a user finished a lesson.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub user_id: Uuid,
    pub lesson_id: Uuid,
    pub completed: bool,
    pub xp_earned: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub total_xp: i64,
}

/// Input for creating a new account. Only used during sign-up.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub email: String,
    pub password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Session-change notifications published by the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { user_id: Uuid },
    SignedOut { user_id: Uuid },
}

impl AuthEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            AuthEvent::SignedIn { user_id } | AuthEvent::SignedOut { user_id } => *user_id,
        }
    }
}
