//! Shared command flags.
//!
//! Every input source (MQTT command, console line, push-button) may *set*
//! `start` or `drop`.  Only the physical-I/O context clears them, through
//! the single [`FlagConsumer`] that can ever be claimed from a
//! [`CommandFlags`] instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct CommandFlags {
    start: AtomicBool,
    drop: AtomicBool,
    consumer_claimed: AtomicBool,
}

impl CommandFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a test run.  Idempotent while a request is pending.
    pub fn request_start(&self) {
        self.start.store(true, Ordering::Release);
    }

    /// Request a magnet release.  Idempotent while a request is pending.
    pub fn request_drop(&self) {
        self.drop.store(true, Ordering::Release);
    }

    pub fn start_pending(&self) -> bool {
        self.start.load(Ordering::Acquire)
    }

    pub fn drop_pending(&self) -> bool {
        self.drop.load(Ordering::Acquire)
    }

    /// Claim the clearing side.  Returns `None` once it has been claimed.
    pub fn claim_consumer(self: &Arc<Self>) -> Option<FlagConsumer> {
        self.consumer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlagConsumer {
                flags: Arc::clone(self),
            })
    }
}

/// The only handle allowed to clear command flags.
#[derive(Debug)]
pub struct FlagConsumer {
    flags: Arc<CommandFlags>,
}

impl FlagConsumer {
    /// Observe and clear a pending start request in one step.
    pub fn take_start(&self) -> bool {
        self.flags.start.swap(false, Ordering::AcqRel)
    }

    /// Drop a start request that arrived while a run was in progress.
    pub fn discard_start(&self) -> bool {
        self.take_start()
    }

    pub fn drop_pending(&self) -> bool {
        self.flags.drop_pending()
    }

    /// Clear the drop request after the release pulse has completed.
    pub fn clear_drop(&self) {
        self.flags.drop.store(false, Ordering::Release);
    }

    pub fn flags(&self) -> &Arc<CommandFlags> {
        &self.flags
    }
}
