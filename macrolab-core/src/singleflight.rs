//! Single-flight guard for pipeline rebuilds.
//!
//! At most one rebuild may be in flight; a concurrent attempt while one is
//! running is a no-op for the caller, not an error and not a queue. The
//! guard is owned by the orchestrator — the pipeline itself stays stateless
//! and re-entrant per call.

use std::sync::atomic::{AtomicBool, Ordering};

/// Mutually-exclusive in-process rebuild gate.
#[derive(Debug, Default)]
pub struct RebuildGuard {
    running: AtomicBool,
}

impl RebuildGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim the rebuild slot. Returns None when a rebuild is
    /// already in flight; the permit releases the slot on drop.
    pub fn try_acquire(&self) -> Option<RebuildPermit<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(RebuildPermit { guard: self })
        } else {
            None
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Proof of holding the rebuild slot.
#[derive(Debug)]
pub struct RebuildPermit<'a> {
    guard: &'a RebuildGuard,
}

impl Drop for RebuildPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}
