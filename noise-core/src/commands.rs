//! Discrete throttle levels used by the randomized drivers.
//!
//! The command set splits the running throttle window into `noise_steps`
//! equal slices using floored integer division. The top level is therefore
//! allowed to fall short of `max_throttle` by the division remainder; the
//! drivers rely on that exact spacing, so it is never clamped or stretched.

use core::fmt;

use heapless::Vec;
use rand::{Rng, RngCore};

use crate::config::{ConfigError, NoiseConfig};
use crate::sequencer::SequenceError;

/// Storage bound for the command set.
pub const MAX_NOISE_STEPS: usize = 32;

/// Resample budget when drawing a level that differs from the previous one.
pub const MAX_RESAMPLE_ATTEMPTS: u8 = 64;

/// ESC pulse width expressed in microseconds.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PulseWidth(u16);

impl PulseWidth {
    #[must_use]
    pub const fn from_micros(micros: u16) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn as_micros(self) -> u16 {
        self.0
    }
}

impl From<PulseWidth> for u16 {
    fn from(value: PulseWidth) -> Self {
        value.0
    }
}

impl fmt::Display for PulseWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Ordered, immutable set of candidate throttle levels.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandSet {
    levels: Vec<PulseWidth, MAX_NOISE_STEPS>,
    step: u16,
}

impl CommandSet {
    /// Validates `config` and generates `min_throttle + k * step` for every `k < noise_steps`.
    pub fn from_config(config: &NoiseConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let step = config.step_resolution();
        let mut levels = Vec::new();
        let mut current = config.min_throttle.as_micros();
        for _ in 0..config.noise_steps {
            levels
                .push(PulseWidth::from_micros(current))
                .map_err(|_| ConfigError::TooManyNoiseSteps(config.noise_steps))?;
            current = current.saturating_add(step);
        }

        Ok(Self { levels, step })
    }

    /// Returns the levels in ascending order.
    #[must_use]
    pub fn levels(&self) -> &[PulseWidth] {
        &self.levels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Floored spacing between neighbouring levels.
    #[must_use]
    pub const fn step_resolution(&self) -> u16 {
        self.step
    }

    /// Draws a uniformly random level that differs from `previous`.
    ///
    /// Equal draws are resampled up to [`MAX_RESAMPLE_ATTEMPTS`] times; a
    /// validated set of at least three levels exhausts that budget with
    /// negligible probability, so exhaustion is reported as an error instead
    /// of spinning.
    pub fn choose_distinct<R>(
        &self,
        previous: PulseWidth,
        rng: &mut R,
    ) -> Result<PulseWidth, SequenceError>
    where
        R: RngCore,
    {
        if self.levels.is_empty() {
            return Err(SequenceError::NoDistinctLevel { previous });
        }

        for _ in 0..MAX_RESAMPLE_ATTEMPTS {
            let candidate = self.levels[rng.random_range(0..self.levels.len())];
            if candidate != previous {
                return Ok(candidate);
            }
        }

        Err(SequenceError::NoDistinctLevel { previous })
    }
}
