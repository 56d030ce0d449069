//! services/api/src/adapters/auth.rs
//!
//! Password authentication with argon2 hashes and server-side auth sessions.
//! Implements the `AuthService` port and publishes sign-in/sign-out events to
//! every subscriber.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use devlingo_core::domain::{AuthEvent, AuthSession, NewProfile, UserProfile};
use devlingo_core::ports::{AuthService, PortError, PortResult};
use devlingo_core::validation::normalize_email;
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use crate::adapters::db::DbAdapter;

const EVENT_CAPACITY: usize = 64;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct PasswordAuthAdapter {
    db: Arc<DbAdapter>,
    session_ttl: Duration,
    events: broadcast::Sender<AuthEvent>,
}

impl PasswordAuthAdapter {
    /// Creates a new `PasswordAuthAdapter`. Auth sessions live for `session_ttl`.
    pub fn new(db: Arc<DbAdapter>, session_ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            db,
            session_ttl,
            events,
        }
    }

    async fn open_session(&self, user_id: Uuid) -> PortResult<AuthSession> {
        let session = AuthSession {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: Utc::now() + self.session_ttl,
        };
        self.db
            .create_auth_session(&session.id, session.user_id, session.expires_at)
            .await?;
        self.publish(AuthEvent::SignedIn { user_id });
        Ok(session)
    }

    fn publish(&self, event: AuthEvent) {
        // Sending only fails when nobody is listening.
        if self.events.send(event).is_err() {
            debug!("No subscribers for {:?}", event);
        }
    }
}

fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, hashed: &str) -> PortResult<bool> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for PasswordAuthAdapter {
    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let credentials = match self
            .db
            .get_credentials_by_email(&normalize_email(email))
            .await {
            Ok(credentials) => credentials,
            Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
            Err(e) => return Err(e),
        };

        if !verify_password(password, &credentials.hashed_password)? {
            return Err(PortError::Unauthorized);
        }

        self.open_session(credentials.user_id).await
    }

    async fn sign_up(&self, profile: NewProfile) -> PortResult<(UserProfile, AuthSession)> {
        let hashed = hash_password(&profile.password)?;
        let created = self
            .db
            .create_account(
                profile.name.trim(),
                &normalize_email(&profile.email),
                &hashed,
            )
            .await?;
        let session = self.open_session(created.id).await?;
        Ok((created, session))
    }

    async fn sign_out(&self, session_id: &str) -> PortResult<()> {
        if let Some(user_id) = self.db.delete_auth_session(session_id).await? {
            self.publish(AuthEvent::SignedOut { user_id });
        }
        Ok(())
    }

    async fn validate(&self, session_id: &str) -> PortResult<Uuid> {
        self.db.validate_auth_session(session_id).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
