//! Celebration effects on the host tab.

use std::sync::Arc;

use fari_shared::ConfettiEffect;

use crate::stores::SessionStore;

/// Shows pending celebrations once, then drains the counters.
///
/// Runs after each broadcast so players see the raised counter before it
/// drops back to zero.
pub struct ConfettiObserver {
    store: Arc<SessionStore>,
    effect: Arc<dyn ConfettiEffect>,
}

impl ConfettiObserver {
    pub fn new(store: Arc<SessionStore>, effect: Arc<dyn ConfettiEffect>) -> Self {
        Self { store, effect }
    }

    /// Fire the effect for each non-zero counter. Returns true if anything fired.
    pub fn observe(&self) -> bool {
        let mut fired = false;
        if self.store.drain_good_confetti() > 0 {
            self.effect.fire_confetti();
            fired = true;
        }
        if self.store.drain_bad_confetti() > 0 {
            self.effect.fire_cannon();
            fired = true;
        }
        fired
    }
}
