//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! curriculum, profile and completion ports from the `core` crate. It also owns the
//! account and auth-session tables used by the password auth adapter. All access
//! goes through PostgreSQL with `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devlingo_core::domain::{CompletionRecord, UserProfile};
use devlingo_core::ports::{
    CompletionRecorder, CurriculumStore, PortError, PortResult, ProfileStore,
};
use devlingo_core::rows::{CompletionRow, LessonRow, OptionRow, QuestionRow, UnitRow};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UnitRecord {
    id: Uuid,
    title: Option<String>,
    level: Option<String>,
}
impl UnitRecord {
    fn to_row(self) -> UnitRow {
        UnitRow {
            id: self.id,
            title: self.title,
            level: self.level,
        }
    }
}

#[derive(FromRow)]
struct LessonRecord {
    id: Uuid,
    unit_id: Uuid,
    title: String,
    description: Option<String>,
    xp_reward: Option<i32>,
}
impl LessonRecord {
    fn to_row(self) -> LessonRow {
        LessonRow {
            id: self.id,
            unit_id: self.unit_id,
            title: self.title,
            description: self.description,
            xp_reward: self.xp_reward,
        }
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    lesson_id: Uuid,
    question_text: String,
    position: i32,
}
impl QuestionRecord {
    fn to_row(self) -> QuestionRow {
        QuestionRow {
            id: self.id,
            lesson_id: self.lesson_id,
            question_text: self.question_text,
            position: self.position,
        }
    }
}

#[derive(FromRow)]
struct OptionRecord {
    id: Uuid,
    question_id: Uuid,
    option_text: String,
    is_correct: bool,
    position: i32,
}
impl OptionRecord {
    fn to_row(self) -> OptionRow {
        OptionRow {
            id: self.id,
            question_id: self.question_id,
            option_text: self.option_text,
            is_correct: self.is_correct,
            position: self.position,
        }
    }
}

#[derive(FromRow)]
struct UserLessonRecord {
    user_id: Uuid,
    lesson_id: Uuid,
    is_completed: bool,
    xp_earned: i32,
    completed_at: DateTime<Utc>,
}
impl UserLessonRecord {
    fn to_domain(self) -> CompletionRecord {
        CompletionRecord {
            user_id: self.user_id,
            lesson_id: self.lesson_id,
            completed: self.is_completed,
            xp_earned: u32::try_from(self.xp_earned).unwrap_or(0),
            completed_at: self.completed_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: String,
    name: String,
    total_xp: i64,
}
impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            name: self.name,
            total_xp: self.total_xp,
        }
    }
}

/// Only used internally for login - contains sensitive data.
#[derive(FromRow)]
pub struct CredentialsRecord {
    pub user_id: Uuid,
    pub hashed_password: String,
}

//=========================================================================================
// `CurriculumStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CurriculumStore for DbAdapter {
    async fn fetch_units(&self) -> PortResult<Vec<UnitRow>> {
        let records = sqlx::query_as::<_, UnitRecord>(
            "SELECT id, title, level FROM units ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_row()).collect())
    }

    async fn fetch_lessons(&self) -> PortResult<Vec<LessonRow>> {
        let records = sqlx::query_as::<_, LessonRecord>(
            "SELECT id, unit_id, title, description, xp_reward FROM lessons ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_row()).collect())
    }

    async fn fetch_questions(&self) -> PortResult<Vec<QuestionRow>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, lesson_id, question_text, position FROM lesson_questions ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_row()).collect())
    }

    async fn fetch_options(&self) -> PortResult<Vec<OptionRow>> {
        let records = sqlx::query_as::<_, OptionRecord>(
            "SELECT id, question_id, option_text, is_correct, position FROM lesson_question_options ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_row()).collect())
    }

    async fn fetch_completions(&self, user_id: Uuid) -> PortResult<Vec<CompletionRow>> {
        let rows: Vec<(Uuid, bool)> = sqlx::query_as(
            "SELECT lesson_id, is_completed FROM user_lessons WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|(lesson_id, is_completed)| CompletionRow {
                lesson_id,
                is_completed,
            })
            .collect())
    }
}

//=========================================================================================
// `CompletionRecorder` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompletionRecorder for DbAdapter {
    async fn upsert_completion(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        xp_earned: u32,
    ) -> PortResult<CompletionRecord> {
        let xp = i32::try_from(xp_earned).unwrap_or(i32::MAX);
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserLessonRecord>(
            "INSERT INTO user_lessons (user_id, lesson_id, is_completed, xp_earned, completed_at) \
             VALUES ($1, $2, TRUE, $3, now()) \
             ON CONFLICT (user_id, lesson_id) DO UPDATE \
             SET is_completed = TRUE, xp_earned = EXCLUDED.xp_earned, completed_at = EXCLUDED.completed_at \
             RETURNING user_id, lesson_id, is_completed, xp_earned, completed_at",
        )
        .bind(user_id)
        .bind(lesson_id)
        .bind(xp)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                PortError::NotFound(format!("Lesson {} not found", lesson_id))
            }
            _ => unexpected(e),
        })?;

        // Single atomic add; concurrent completions never lose xp.
        sqlx::query("UPDATE user_profiles SET total_xp = total_xp + $1 WHERE id = $2")
            .bind(i64::from(xp))
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `ProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, email, name, total_xp FROM user_profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Profile {} not found", user_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// Accounts and Auth Sessions
//=========================================================================================

impl DbAdapter {
    /// Creates the credentials row and the public profile in one transaction.
    pub async fn create_account(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<UserProfile> {
        let user_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query("INSERT INTO users (id, email, hashed_password) VALUES ($1, $2, $3)")
            .bind(user_id)
            .bind(email)
            .bind(hashed_password)
            .execute(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    PortError::Conflict("This email is already registered".to_string())
                }
                _ => unexpected(e),
            })?;

        let record = sqlx::query_as::<_, ProfileRecord>(
            "INSERT INTO user_profiles (id, email, name) VALUES ($1, $2, $3) \
             RETURNING id, email, name, total_xp",
        )
        .bind(user_id)
        .bind(email)
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(record.to_domain())
    }

    pub async fn get_credentials_by_email(&self, email: &str) -> PortResult<CredentialsRecord> {
        sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id AS user_id, hashed_password FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })
    }

    pub async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    pub async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        row.map(|(user_id,)| user_id).ok_or(PortError::Unauthorized)
    }

    /// Deletes the session and returns its owner, if it existed.
    pub async fn delete_auth_session(&self, session_id: &str) -> PortResult<Option<Uuid>> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("DELETE FROM auth_sessions WHERE id = $1 RETURNING user_id")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(row.map(|(user_id,)| user_id))
    }
}
