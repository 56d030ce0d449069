//! crates/devlingo_core/src/session.rs
//!
//! The lesson session state machine. One instance drives one user through one
//! lesson's questions, spending hearts on wrong answers, and ends in a terminal
//! outcome. A session is never persisted; only a successful outcome reaches the
//! completion recorder.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Lesson, Question};
use crate::ports::CompletionRecorder;

/// Hearts every session starts with.
pub const MAX_HEARTS: u8 = 3;

/// How long the failure indicator stays up before an out-of-hearts session ends.
pub const FAILURE_DISPLAY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    Success,
    Error,
}

/// The terminal result handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every question answered correctly; the lesson's xp was credited.
    Success {
        correct: u32,
        incorrect: u32,
        total_xp: u32,
    },
    /// At least one mistake, or the hearts ran out.
    Partial {
        correct: u32,
        incorrect: u32,
        lesson_id: Uuid,
    },
}

impl Outcome {
    pub fn correct(&self) -> u32 {
        match self {
            Outcome::Success { correct, .. } | Outcome::Partial { correct, .. } => *correct,
        }
    }

    pub fn incorrect(&self) -> u32 {
        match self {
            Outcome::Success { incorrect, .. } | Outcome::Partial { incorrect, .. } => *incorrect,
        }
    }

    /// Share of correct answers as a rounded percentage; 0 when nothing was answered.
    pub fn accuracy(&self) -> u32 {
        let total = self.correct() + self.incorrect();
        if total == 0 {
            return 0;
        }
        ((self.correct() as f64 / total as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Answering { index: usize },
    Feedback { index: usize, kind: FeedbackKind },
    Terminal(Outcome),
    /// The user skipped past the last question; no outcome exists.
    Abandoned,
}

impl SessionPhase {
    fn name(&self) -> &'static str {
        match self {
            SessionPhase::Answering { .. } => "answering",
            SessionPhase::Feedback { .. } => "feedback",
            SessionPhase::Terminal(_) => "terminal",
            SessionPhase::Abandoned => "abandoned",
        }
    }
}

/// What `submit_answer` reports back to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub kind: FeedbackKind,
    pub correct_option: usize,
    pub hearts: u8,
    /// Hearts hit zero. The driver must call [`LessonSession::exhaust`] once
    /// [`FAILURE_DISPLAY_DELAY`] has elapsed.
    pub exhausted: bool,
}

/// Where the session moved after `continue_lesson` or `skip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Question { index: usize },
    Finished(Outcome),
    Abandoned,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Lesson has no questions")]
    EmptyLesson,
    #[error("Cannot {operation} while {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: &'static str,
    },
    #[error("No option selected")]
    NoSelection,
    #[error("Option {0} does not exist")]
    OptionOutOfRange(usize),
    #[error("No hearts left")]
    Exhausted,
}

pub type SessionResult<T> = Result<T, SessionError>;

pub struct LessonSession {
    user_id: Uuid,
    lesson_id: Uuid,
    xp_reward: u32,
    questions: Vec<Question>,
    phase: SessionPhase,
    hearts: u8,
    correct: u32,
    incorrect: u32,
}

impl LessonSession {
    pub fn new(user_id: Uuid, lesson: &Lesson) -> SessionResult<Self> {
        if lesson.questions.is_empty() {
            return Err(SessionError::EmptyLesson);
        }
        Ok(Self {
            user_id,
            lesson_id: lesson.id,
            xp_reward: lesson.xp,
            questions: lesson.questions.clone(),
            phase: SessionPhase::Answering { index: 0 },
            hearts: MAX_HEARTS,
            correct: 0,
            incorrect: 0,
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn hearts(&self) -> u8 {
        self.hearts
    }

    pub fn correct(&self) -> u32 {
        self.correct
    }

    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    pub fn lesson_id(&self) -> Uuid {
        self.lesson_id
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// The question on screen, while answering or looking at feedback.
    pub fn current_question(&self) -> Option<(usize, &Question)> {
        let index = match self.phase {
            SessionPhase::Answering { index } | SessionPhase::Feedback { index, .. } => index,
            _ => return None,
        };
        self.questions.get(index).map(|q| (index, q))
    }

    /// Progress bar value: questions reached so far as a rounded percentage.
    pub fn progress_percent(&self) -> u32 {
        match self.current_question() {
            Some((index, _)) => {
                (((index + 1) as f64 / self.questions.len() as f64) * 100.0).round() as u32
            }
            None => 100,
        }
    }

    pub fn submit_answer(&mut self, selected: Option<usize>) -> SessionResult<Verdict> {
        let index = match self.phase {
            SessionPhase::Answering { index } => index,
            other => return Err(invalid("submit an answer", other)),
        };
        let selected = selected.ok_or(SessionError::NoSelection)?;
        let question = &self.questions[index];
        if selected >= question.options.len() {
            return Err(SessionError::OptionOutOfRange(selected));
        }
        let correct_option = question.correct_answer;

        let kind = if selected == correct_option {
            self.correct += 1;
            FeedbackKind::Success
        } else {
            self.incorrect += 1;
            self.hearts = self.hearts.saturating_sub(1);
            FeedbackKind::Error
        };
        self.phase = SessionPhase::Feedback { index, kind };

        Ok(Verdict {
            kind,
            correct_option,
            hearts: self.hearts,
            exhausted: self.hearts == 0,
        })
    }

    /// Leaves the feedback screen.
    ///
    /// After the last question a clean run is recorded through `recorder` and
    /// finishes as [`Outcome::Success`]. A recorder failure is logged and the
    /// session still reports success.
    pub async fn continue_lesson(
        &mut self,
        recorder: &dyn CompletionRecorder,
    ) -> SessionResult<Step> {
        let index = match self.phase {
            SessionPhase::Feedback { index, .. } => index,
            other => return Err(invalid("continue", other)),
        };
        if self.hearts == 0 {
            return Err(SessionError::Exhausted);
        }

        if index + 1 < self.questions.len() {
            self.phase = SessionPhase::Answering { index: index + 1 };
            return Ok(Step::Question { index: index + 1 });
        }

        let outcome = if self.incorrect == 0 {
            match recorder
                .upsert_completion(self.user_id, self.lesson_id, self.xp_reward)
                .await
            {
                Ok(_) => info!(
                    "Lesson {} completed by user {} (+{} xp)",
                    self.lesson_id, self.user_id, self.xp_reward
                ),
                Err(e) => warn!(
                    "Failed to record completion of lesson {} for user {}: {}",
                    self.lesson_id, self.user_id, e
                ),
            }
            Outcome::Success {
                correct: self.correct,
                incorrect: self.incorrect,
                total_xp: self.xp_reward,
            }
        } else {
            self.partial()
        };

        self.phase = SessionPhase::Terminal(outcome);
        Ok(Step::Finished(outcome))
    }

    /// Moves past the current question without answering it. Skipping the last
    /// question abandons the session without any outcome.
    pub fn skip(&mut self) -> SessionResult<Step> {
        let index = match self.phase {
            SessionPhase::Answering { index } => index,
            other => return Err(invalid("skip", other)),
        };

        if index + 1 < self.questions.len() {
            self.phase = SessionPhase::Answering { index: index + 1 };
            Ok(Step::Question { index: index + 1 })
        } else {
            self.phase = SessionPhase::Abandoned;
            Ok(Step::Abandoned)
        }
    }

    /// Ends an out-of-hearts session. Valid only once hearts reached zero.
    pub fn exhaust(&mut self) -> SessionResult<Outcome> {
        match self.phase {
            SessionPhase::Feedback {
                kind: FeedbackKind::Error,
                ..
            } if self.hearts == 0 => {
                let outcome = self.partial();
                self.phase = SessionPhase::Terminal(outcome);
                Ok(outcome)
            }
            other => Err(invalid("end the session", other)),
        }
    }

    fn partial(&self) -> Outcome {
        Outcome::Partial {
            correct: self.correct,
            incorrect: self.incorrect,
            lesson_id: self.lesson_id,
        }
    }
}

fn invalid(operation: &'static str, phase: SessionPhase) -> SessionError {
    SessionError::InvalidTransition {
        operation,
        phase: phase.name(),
    }
}
