//! Periodic checkpointing of a running session.
//!
//! One cooperative task per session: sleep the configured interval, stop
//! as soon as the session is no longer active, otherwise snapshot the
//! trace state and hand it to the store with `reason = periodic`. A
//! failed write is logged and simply retried at the next interval. The
//! final `cancel` checkpoint is the session task's job, not this one's.
//!
//! The status check below is not the only shutdown path: the session
//! supervisor holds this task behind an abort-on-drop guard, so it is
//! killed even when the session body panics or the supervising future
//! is itself aborted mid-flight.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::checkpoints::{CheckpointReason, CheckpointStore};
use crate::events::EventSink;
use crate::sessions::manager::{SessionSlot, take_checkpoint_logged};

pub(crate) async fn periodic_checkpoints(
    store: Arc<CheckpointStore>,
    events: Arc<dyn EventSink>,
    slot: Arc<SessionSlot>,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;
        if !slot.status().is_active() {
            debug!(session = %slot.session_id, "session no longer active, stopping checkpointer");
            break;
        }
        take_checkpoint_logged(&store, &events, &slot, CheckpointReason::Periodic);
    }
}
