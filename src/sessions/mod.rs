//! Session lifecycle: records, the manager, and periodic checkpointing.

pub(crate) mod checkpointer;
pub mod manager;
pub mod session;

pub use manager::{SessionError, SessionManager};
pub use session::{
    SessionRecord, SessionStatus, SessionView, TraceRequest, TraceResults,
};
