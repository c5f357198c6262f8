//! Tracks whether the backend offers the consistency-check endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Starts out assuming the capability exists and flips to unavailable the
/// first time the backend answers "not found". It never flips back.
#[derive(Debug)]
pub struct CapabilityProbe {
    available: AtomicBool,
}

impl Default for CapabilityProbe {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }
}

impl CapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Mark the capability as missing. Returns `true` only for the call that
    /// performed the transition.
    pub fn mark_unavailable(&self) -> bool {
        let flipped = self.available.swap(false, Ordering::AcqRel);
        if flipped {
            warn!("consistency check endpoint not found; replication status disabled");
        }
        flipped
    }
}
