//! A cloneable handle for poking a session from external code.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio_util::sync::CancellationToken;

/// A cloneable handle for poking a session from external code.
///
/// All fields are `Arc`-wrapped, so cloning is cheap.
///
/// Every turn runs under a generation number. Bumping the generation with
/// [`invalidate`](SessionHandle::invalidate) retires the current turn:
/// whatever events it still has in flight are discarded instead of being
/// applied to the conversation. Aborting cancels the turn without retiring
/// it, so text revealed so far is kept.
#[derive(Clone)]
pub struct SessionHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) generation: Arc<AtomicU64>,
}

impl SessionHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Abort the in-flight turn, keeping text already revealed.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Retire the in-flight turn. Its remaining events are discarded, and
    /// it is cancelled so it unwinds promptly.
    pub fn invalidate(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.cancel.lock().cancel();
        generation
    }

    /// Generation of the current turn.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
