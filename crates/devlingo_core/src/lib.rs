pub mod aggregator;
pub mod domain;
pub mod ports;
pub mod rows;
pub mod session;
pub mod validation;

pub use aggregator::{aggregate, find_lesson, load_units};
pub use domain::{
    AuthEvent, AuthSession, CompletionRecord, Lesson, NewProfile, Question, Unit, UnitStatus,
    UserProfile,
};
pub use ports::{
    AuthService, CompletionRecorder, CurriculumStore, PortError, PortResult, ProfileStore,
};
pub use session::{
    FeedbackKind, LessonSession, Outcome, SessionError, SessionPhase, Step, Verdict,
    FAILURE_DISPLAY_DELAY, MAX_HEARTS,
};
