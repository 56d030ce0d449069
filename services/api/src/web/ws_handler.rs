//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point for a lesson WebSocket connection. The socket is
//! adapted into a stream of text frames and a sink of `ServerMessage`; after the
//! `start` message opens a lesson, the `LessonDriver` runs it to the end.

use crate::web::{
    lesson_driver::{send, send_error, LessonDriver},
    middleware::session_id_from_headers,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
    Extension,
};
use devlingo_core::{
    aggregator::{find_lesson, load_units},
    domain::UnitStatus,
    session::LessonSession,
};
use futures::{
    future,
    stream::{SplitStream, Stream, StreamExt},
    Sink, SinkExt,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    headers: HeaderMap,
) -> Response {
    // `require_auth` already checked this cookie.
    let auth_session_id = session_id_from_headers(&headers)
        .unwrap_or_default()
        .to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id, auth_session_id))
}

async fn handle_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    user_id: Uuid,
    auth_session_id: String,
) {
    info!("New lesson connection established for user: {}", user_id);

    // Subscribe before loading so a sign-out during setup is not missed.
    let auth_events = app_state.auth.subscribe();
    let (sender, receiver) = socket.split();
    let mut incoming = text_frames(receiver);
    let mut outgoing = sender.with(encode);

    // --- 1. Initialization Phase ---
    let Some(session) = start_session(&app_state, user_id, &mut incoming, &mut outgoing).await
    else {
        return;
    };

    // --- 2. Main Message Loop ---
    let driver = LessonDriver::new(
        app_state.recorder.as_ref(),
        app_state.auth.as_ref(),
        auth_session_id,
        user_id,
        app_state.config.failure_display_delay,
    );
    let end = driver
        .run(session, &mut incoming, &mut outgoing, auth_events)
        .await;

    // --- 3. Cleanup ---
    if let Err(e) = outgoing.close().await {
        warn!("Failed to close lesson socket cleanly: {}", e);
    }
    info!("Lesson connection closed for user {}: {:?}", user_id, end);
}

/// Text payloads until the client closes the socket or it fails.
fn text_frames(receiver: SplitStream<WebSocket>) -> impl Stream<Item = String> + Unpin + Send {
    receiver
        .take_while(|frame| {
            let open = match frame {
                Ok(Message::Close(_)) => false,
                Ok(_) => true,
                Err(e) => {
                    warn!("Lesson socket error: {}", e);
                    false
                }
            };
            future::ready(open)
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        })
}

fn encode(msg: ServerMessage) -> future::Ready<Result<Message, axum::Error>> {
    future::ready(
        serde_json::to_string(&msg)
            .map(|json| Message::Text(json.into()))
            .map_err(|e| {
                error!("Failed to serialize {:?}: {}", msg, e);
                axum::Error::new(e)
            }),
    )
}

/// Waits for the `start` message and builds the session for the requested lesson.
async fn start_session<S, K>(
    app_state: &AppState,
    user_id: Uuid,
    incoming: &mut S,
    outgoing: &mut K,
) -> Option<LessonSession>
where
    S: Stream<Item = String> + Unpin,
    K: Sink<ServerMessage> + Unpin,
{
    let lesson_id = match incoming.next().await {
        Some(text) => match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Start { lesson_id }) => lesson_id,
            _ => {
                error!("First message was not a valid start message.");
                send_error(outgoing, "The first message must start a lesson.").await;
                return None;
            }
        },
        None => {
            error!("Client disconnected before starting a lesson.");
            return None;
        }
    };

    info!("Starting lesson {} for user {}", lesson_id, user_id);
    let units = load_units(app_state.curriculum.as_ref(), user_id).await;
    if units.is_empty() {
        send_error(outgoing, "Unable to load lessons.").await;
        return None;
    }

    let Some((unit, lesson)) = find_lesson(&units, lesson_id) else {
        send_error(outgoing, "Lesson not found.").await;
        return None;
    };
    if unit.status == UnitStatus::Locked {
        warn!("User {} tried to open locked lesson {}", user_id, lesson_id);
        send_error(outgoing, "This lesson is still locked.").await;
        return None;
    }

    let session = match LessonSession::new(user_id, lesson) {
        Ok(session) => session,
        Err(e) => {
            warn!("Lesson {} cannot start: {}", lesson_id, e);
            send_error(outgoing, "Lesson unavailable.").await;
            return None;
        }
    };

    let started = ServerMessage::LessonStarted {
        lesson_id,
        title: lesson.title.clone(),
        total_questions: session.total_questions(),
        hearts: session.hearts(),
    };
    if !send(outgoing, started).await {
        return None;
    }
    if let Some(question) = ServerMessage::question(&session) {
        if !send(outgoing, question).await {
            return None;
        }
    }
    Some(session)
}
