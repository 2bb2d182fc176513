pub mod document;
pub mod history;
pub mod problem;
pub mod session;

pub use document::Document;
pub use history::HistoryEntry;
pub use problem::{score_batch, Answer, AnswerRecord, ProblemDescriptor, SolvedProblem};
pub use session::BatchSessionState;
