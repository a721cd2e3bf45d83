//! Random-walk drivers used by the `RandomRamped` and `RandomSudden` phases.
//!
//! Both drivers share the same state and level-selection policy: draw a level
//! from the command set that differs from the previous one, apply it, wait,
//! repeat. They differ only in how the host actuates the change (ramp versus
//! instantaneous set), which the sequencer decides from [`WalkMode`].

use core::fmt;

use rand::RngCore;

use super::{Phase, SequenceError};
use crate::commands::{CommandSet, PulseWidth};

/// How a randomized driver moves the output to each new level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WalkMode {
    /// Ramp over `throttle_change_wait`, resuming once the ramp completes.
    Ramped,
    /// Set instantly, then hold for `throttle_change_wait`.
    Sudden,
}

impl WalkMode {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            WalkMode::Ramped => "ramped",
            WalkMode::Sudden => "sudden",
        }
    }
}

impl fmt::Display for WalkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Level transition chosen by a randomized driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LevelStep {
    pub from: PulseWidth,
    pub to: PulseWidth,
}

/// Per-invocation state for one randomized driver run.
///
/// The counter starts at 1 and the walk ends once it reaches the target, so a
/// target of `n` produces `n - 1` level changes (none for 0 or 1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RandomWalk {
    mode: WalkMode,
    step: u16,
    previous: PulseWidth,
    follow_up: Phase,
}

impl RandomWalk {
    #[must_use]
    pub const fn new(mode: WalkMode, start: PulseWidth, follow_up: Phase) -> Self {
        Self {
            mode,
            step: 1,
            previous: start,
            follow_up,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> WalkMode {
        self.mode
    }

    #[must_use]
    pub const fn step(&self) -> u16 {
        self.step
    }

    #[must_use]
    pub const fn previous(&self) -> PulseWidth {
        self.previous
    }

    /// Phase the sequencer enters once the walk ends.
    #[must_use]
    pub const fn follow_up(&self) -> Phase {
        self.follow_up
    }

    /// Picks the next level, or returns `None` once the counter reaches `target`.
    pub fn next_level<R: RngCore>(
        &mut self,
        target: u16,
        commands: &CommandSet,
        rng: &mut R,
    ) -> Result<Option<LevelStep>, SequenceError> {
        if self.step >= target {
            return Ok(None);
        }

        let to = commands.choose_distinct(self.previous, rng)?;
        let change = LevelStep {
            from: self.previous,
            to,
        };
        self.step = self.step.saturating_add(1);
        self.previous = to;
        Ok(Some(change))
    }
}
