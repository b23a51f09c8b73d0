//! Open editing sessions: buffers, file bindings, selection history

mod buffer;
mod history;
mod manager;
mod mode;
mod picker;
mod session;

pub use buffer::Buffer;
pub use history::{History, HistoryEntry};
pub use manager::{CloseOutcome, Effect, SessionManager};
pub use mode::Mode;
pub use picker::{FilePicker, NoPicker};
pub use session::{Session, SessionId};
