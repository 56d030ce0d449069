//! services/api/src/web/events.rs
//!
//! Background listener for auth session changes. Runs until the server shuts down.

use devlingo_core::domain::AuthEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Logs every sign-in and sign-out until `shutdown` is cancelled or the
/// auth service goes away. Returns the number of events seen.
pub async fn watch_auth_events(
    mut events: broadcast::Receiver<AuthEvent>,
    shutdown: CancellationToken,
) -> usize {
    let mut seen = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Auth event listener stopped.");
                break;
            }
            event = events.recv() => match event {
                Ok(AuthEvent::SignedIn { user_id }) => {
                    seen += 1;
                    info!("User {} signed in", user_id);
                }
                Ok(AuthEvent::SignedOut { user_id }) => {
                    seen += 1;
                    info!("User {} signed out", user_id);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Auth event listener skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    seen
}
