pub mod phase;
pub mod session_controller;

pub use phase::{BatchOutcome, BatchQuiz, Failure, FailureStage, Phase};
pub use session_controller::{ResumeOutcome, SessionController};
