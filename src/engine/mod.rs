//! Traversal engine: state and the bidirectional search loop.

pub mod state;
pub mod traversal;

pub use state::{Connection, PendingVisit, SharedTraceState, TraceState, TraceStatus};
pub use traversal::{
    CancelFlag, NoopObserver, TraceObserver, TracePlan, TraceProgress, Tracer,
};
