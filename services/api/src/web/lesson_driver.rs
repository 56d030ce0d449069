//! services/api/src/web/lesson_driver.rs
//!
//! Runs one `LessonSession` after it has started. Client frames come in as a
//! stream of JSON text and replies go out through a sink of `ServerMessage`, so
//! the loop does not depend on the WebSocket itself. The driver also owns the
//! out-of-hearts deadline and closes the lesson when its user signs out.

use crate::web::protocol::{ClientMessage, ServerMessage};
use devlingo_core::{
    domain::AuthEvent,
    ports::{AuthService, CompletionRecorder, PortError},
    session::{LessonSession, Step},
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{sleep_until, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Why a lesson loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The last question was answered and an outcome was sent.
    Finished,
    /// Hearts ran out and the partial outcome was sent after the display delay.
    OutOfHearts,
    /// The user skipped past the last question.
    Abandoned,
    /// The user's auth session ended elsewhere.
    SignedOut,
    /// The client stream ended.
    ClientLeft,
    /// A reply could not be delivered.
    SendFailed,
}

enum Flow {
    Continue,
    Close(SessionEnd),
}

pub struct LessonDriver<'a> {
    recorder: &'a dyn CompletionRecorder,
    auth: &'a dyn AuthService,
    auth_session_id: String,
    user_id: Uuid,
    failure_display_delay: Duration,
}

impl<'a> LessonDriver<'a> {
    pub fn new(
        recorder: &'a dyn CompletionRecorder,
        auth: &'a dyn AuthService,
        auth_session_id: String,
        user_id: Uuid,
        failure_display_delay: Duration,
    ) -> Self {
        Self {
            recorder,
            auth,
            auth_session_id,
            user_id,
            failure_display_delay,
        }
    }

    /// Drives `session` until it reaches an end state, the client leaves, or the
    /// user signs out.
    ///
    /// Once hearts reach zero the partial outcome is sent `failure_display_delay`
    /// later, whether or not the client sends anything else.
    pub async fn run<S, K>(
        &self,
        mut session: LessonSession,
        incoming: &mut S,
        outgoing: &mut K,
        mut auth_events: broadcast::Receiver<AuthEvent>,
    ) -> SessionEnd
    where
        S: Stream<Item = String> + Unpin,
        K: Sink<ServerMessage> + Unpin,
    {
        let mut exhausted_at: Option<Instant> = None;
        let mut events_open = true;

        loop {
            let flow = tokio::select! {
                _ = wait_until(exhausted_at), if exhausted_at.is_some() => {
                    exhausted_at = None;
                    match session.exhaust() {
                        Ok(outcome) => {
                            info!("Lesson {} ended: user {} ran out of hearts", session.lesson_id(), self.user_id);
                            send(outgoing, ServerMessage::outcome(outcome)).await;
                        }
                        Err(e) => error!("Failed to end exhausted session: {}", e),
                    }
                    Flow::Close(SessionEnd::OutOfHearts)
                }
                event = auth_events.recv(), if events_open => match event {
                    Ok(AuthEvent::SignedOut { user_id }) if user_id == self.user_id => {
                        self.signed_out(outgoing).await
                    }
                    Ok(_) => Flow::Continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "Lesson socket for user {} missed {} auth events; re-checking its session.",
                            self.user_id, skipped
                        );
                        self.recheck_auth(outgoing).await
                    }
                    Err(RecvError::Closed) => {
                        events_open = false;
                        Flow::Continue
                    }
                },
                frame = incoming.next() => match frame {
                    Some(text) => {
                        let flow = self.handle_text_message(&text, &mut session, outgoing).await;
                        if exhausted_at.is_none() && session.hearts() == 0 {
                            exhausted_at = Some(Instant::now() + self.failure_display_delay);
                        }
                        flow
                    }
                    None => {
                        info!("Client left lesson {}.", session.lesson_id());
                        Flow::Close(SessionEnd::ClientLeft)
                    }
                },
            };

            if let Flow::Close(end) = flow {
                return end;
            }
        }
    }

    /// A missed event may have been this user's sign-out.
    async fn recheck_auth<K>(&self, outgoing: &mut K) -> Flow
    where
        K: Sink<ServerMessage> + Unpin,
    {
        match self.auth.validate(&self.auth_session_id).await {
            Ok(user_id) if user_id == self.user_id => Flow::Continue,
            Ok(_) | Err(PortError::Unauthorized) => self.signed_out(outgoing).await,
            Err(e) => {
                error!("Failed to re-check auth session: {}", e);
                Flow::Continue
            }
        }
    }

    async fn signed_out<K>(&self, outgoing: &mut K) -> Flow
    where
        K: Sink<ServerMessage> + Unpin,
    {
        info!("User {} signed out; closing lesson session.", self.user_id);
        send_error(outgoing, "Signed out.").await;
        Flow::Close(SessionEnd::SignedOut)
    }

    /// Applies one client message to the session and reports the result.
    async fn handle_text_message<K>(
        &self,
        text: &str,
        session: &mut LessonSession,
        outgoing: &mut K,
    ) -> Flow
    where
        K: Sink<ServerMessage> + Unpin,
    {
        let client_msg = match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Failed to deserialize client message: {}", e);
                send_error(outgoing, "Unrecognized message.").await;
                return Flow::Continue;
            }
        };

        let step = match client_msg {
            ClientMessage::Submit { option } => match session.submit_answer(option) {
                Ok(verdict) => {
                    let feedback = ServerMessage::Feedback {
                        kind: verdict.kind.into(),
                        correct_option: verdict.correct_option,
                        hearts: verdict.hearts,
                    };
                    return send_or_close(outgoing, feedback).await;
                }
                Err(e) => Err(e),
            },
            ClientMessage::Continue => session.continue_lesson(self.recorder).await,
            ClientMessage::Skip => session.skip(),
            ClientMessage::Start { .. } => {
                warn!("Received subsequent start message, which is ignored.");
                return Flow::Continue;
            }
        };

        match step {
            Ok(step) => send_step(session, step, outgoing).await,
            Err(e) => {
                send_error(outgoing, &e.to_string()).await;
                Flow::Continue
            }
        }
    }
}

async fn send_step<K>(session: &LessonSession, step: Step, outgoing: &mut K) -> Flow
where
    K: Sink<ServerMessage> + Unpin,
{
    match step {
        Step::Question { .. } => match ServerMessage::question(session) {
            Some(question) => send_or_close(outgoing, question).await,
            None => Flow::Continue,
        },
        Step::Finished(outcome) => {
            send(outgoing, ServerMessage::outcome(outcome)).await;
            Flow::Close(SessionEnd::Finished)
        }
        Step::Abandoned => {
            info!("Lesson {} abandoned.", session.lesson_id());
            send(outgoing, ServerMessage::LessonAbandoned).await;
            Flow::Close(SessionEnd::Abandoned)
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Sends one message. Returns `false` when the client is gone.
pub async fn send<K>(outgoing: &mut K, msg: ServerMessage) -> bool
where
    K: Sink<ServerMessage> + Unpin,
{
    if outgoing.send(msg).await.is_err() {
        error!("Failed to send message to client.");
        return false;
    }
    true
}

async fn send_or_close<K>(outgoing: &mut K, msg: ServerMessage) -> Flow
where
    K: Sink<ServerMessage> + Unpin,
{
    if send(outgoing, msg).await {
        Flow::Continue
    } else {
        Flow::Close(SessionEnd::SendFailed)
    }
}

pub async fn send_error<K>(outgoing: &mut K, message: &str)
where
    K: Sink<ServerMessage> + Unpin,
{
    let err_msg = ServerMessage::Error {
        message: message.to_string(),
    };
    send(outgoing, err_msg).await;
}
