pub mod atomic;
pub mod history_log;
pub mod session_store;

pub use history_log::{FileHistoryLog, HistoryLog, MemoryHistoryLog};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
