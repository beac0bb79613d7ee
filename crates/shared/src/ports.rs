//! Ports for the non-deterministic and view-side collaborators.
//!
//! Time and randomness are injected so store actions and rolls are testable;
//! the confetti effect is the UI's one-shot celebration, outside the play core.

use chrono::{DateTime, Utc};
use rand::Rng;

use fari_domain::{DiceRollKind, DiceRollResult};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait RandomPort: Send + Sync {
    /// Uniform index in `0..len`
    fn gen_index(&self, len: usize) -> usize;
}

/// Fires the celebratory view effects requested through the session's counters.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ConfettiEffect: Send + Sync {
    fn fire_confetti(&self);
    fn fire_cannon(&self);
}

/// Roll `kind` with faces picked by `random`.
pub fn roll_dice(kind: DiceRollKind, random: &dyn RandomPort) -> DiceRollResult {
    kind.roll_with(|len| random.gen_index(len))
}

/// System clock - uses real time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// System random - uses real randomness.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRandom;

impl RandomPort for SystemRandom {
    fn gen_index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..len)
    }
}

/// Confetti effect for headless tabs: writes the celebration to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConfetti;

impl ConfettiEffect for LogConfetti {
    fn fire_confetti(&self) {
        tracing::info!("🎉 Confetti!");
    }

    fn fire_cannon(&self) {
        tracing::info!("💥 Confetti cannon!");
    }
}

/// Fixed clock for tests.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(any(test, feature = "testing"))]
impl ClockPort for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
