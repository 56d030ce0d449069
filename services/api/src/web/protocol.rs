//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for a single lesson session. All frames are JSON text tagged by `type`.

use devlingo_core::session::{FeedbackKind, LessonSession, Outcome};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens the lesson. This must be the first message sent on the connection.
    Start { lesson_id: Uuid },

    /// Checks the selected option against the current question.
    Submit {
        #[serde(default)]
        option: Option<usize>,
    },

    /// Dismisses the feedback and moves on.
    Continue,

    /// Moves past the current question without answering it.
    Skip,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLabel {
    Success,
    Error,
}

impl From<FeedbackKind> for FeedbackLabel {
    fn from(kind: FeedbackKind) -> Self {
        match kind {
            FeedbackKind::Success => FeedbackLabel::Success,
            FeedbackKind::Error => FeedbackLabel::Error,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LessonStarted {
        lesson_id: Uuid,
        title: String,
        total_questions: usize,
        hearts: u8,
    },

    Question {
        index: usize,
        title: String,
        options: Vec<String>,
        progress: u32,
    },

    Feedback {
        kind: FeedbackLabel,
        correct_option: usize,
        hearts: u8,
    },

    /// Every answer was right; the lesson's xp was credited.
    LessonSucceeded {
        correct: u32,
        incorrect: u32,
        total_xp: u32,
        accuracy: u32,
    },

    LessonFailed {
        correct: u32,
        incorrect: u32,
        lesson_id: Uuid,
        accuracy: u32,
    },

    /// The user skipped past the last question.
    LessonAbandoned,

    /// Reports a rejected message or a fatal problem loading the lesson.
    Error { message: String },
}

impl ServerMessage {
    /// The question the session currently shows, if any.
    pub fn question(session: &LessonSession) -> Option<Self> {
        session
            .current_question()
            .map(|(index, question)| ServerMessage::Question {
                index,
                title: question.title.clone(),
                options: question.options.clone(),
                progress: session.progress_percent(),
            })
    }

    pub fn outcome(outcome: Outcome) -> Self {
        let accuracy = outcome.accuracy();
        match outcome {
            Outcome::Success {
                correct,
                incorrect,
                total_xp,
            } => ServerMessage::LessonSucceeded {
                correct,
                incorrect,
                total_xp,
                accuracy,
            },
            Outcome::Partial {
                correct,
                incorrect,
                lesson_id,
            } => ServerMessage::LessonFailed {
                correct,
                incorrect,
                lesson_id,
                accuracy,
            },
        }
    }
}
