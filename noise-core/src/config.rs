//! Static script parameters consumed by the sequencer and its drivers.
//!
//! Every field is `const`-constructible so firmware images can bake the
//! script into flash while the host emulator layers command-line overrides on
//! top of [`NoiseConfig::DEFAULT`]. Nothing here is mutated once a
//! [`NoiseSequencer`](crate::sequencer::NoiseSequencer) has been built.

use core::{fmt, time::Duration};

use crate::commands::{MAX_NOISE_STEPS, PulseWidth};

/// Pulse that keeps the ESC armed without spinning the motor.
pub const DEFAULT_MIN_COMMAND: PulseWidth = PulseWidth::from_micros(1_000);
/// Lowest pulse used while the script is running.
pub const DEFAULT_MIN_THROTTLE: PulseWidth = PulseWidth::from_micros(1_035);
/// Highest pulse used while the script is running.
pub const DEFAULT_MAX_THROTTLE: PulseWidth = PulseWidth::from_micros(1_900);
/// Interval between successive throttle commands and the duration of every ramp.
pub const DEFAULT_THROTTLE_CHANGE_WAIT: Duration = Duration::from_millis(100);
/// Number of discrete levels in the command set.
pub const DEFAULT_NOISE_STEPS: u8 = 5;
/// Number of full max/min alternations performed by the extreme driver.
pub const DEFAULT_EXTREME_ITERATIONS: u16 = 5;
/// Number of outer iterations before the script finishes.
pub const DEFAULT_ITERATIONS: u16 = 4;
/// Counter target for each randomized driver.
pub const DEFAULT_RANDOM_ITERATIONS: u16 = 5;
/// Mandatory delay between arming the ESC and the first phase.
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(4);
/// Hold applied by the `Idle` phase so the ESC does not desync on the first ramp.
pub const DEFAULT_IDLE_SETTLE: Duration = Duration::from_secs(2);

/// Smallest command set that guarantees a distinct level is always available.
pub const MIN_NOISE_STEPS: u8 = 3;

/// Reasons a configuration is rejected before the script starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// `min_throttle` must sit strictly below `max_throttle`.
    ThrottleRangeInverted { min: PulseWidth, max: PulseWidth },
    /// Fewer than [`MIN_NOISE_STEPS`] levels were requested.
    TooFewNoiseSteps(u8),
    /// More levels were requested than the command set can store.
    TooManyNoiseSteps(u8),
    /// The throttle range is too narrow to separate the requested levels.
    StepResolutionZero { range: u16, noise_steps: u8 },
    /// The safe command must not exceed the lowest running throttle.
    SafeCommandAboveThrottle {
        command: PulseWidth,
        min_throttle: PulseWidth,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ThrottleRangeInverted { min, max } => {
                write!(f, "min throttle {min} must be below max throttle {max}")
            }
            ConfigError::TooFewNoiseSteps(steps) => write!(
                f,
                "noise steps must be at least {MIN_NOISE_STEPS} (got {steps})"
            ),
            ConfigError::TooManyNoiseSteps(steps) => write!(
                f,
                "noise steps must be at most {MAX_NOISE_STEPS} (got {steps})"
            ),
            ConfigError::StepResolutionZero { range, noise_steps } => write!(
                f,
                "throttle range of {range}us cannot be split into {noise_steps} distinct levels"
            ),
            ConfigError::SafeCommandAboveThrottle {
                command,
                min_throttle,
            } => write!(
                f,
                "safe command {command} must not exceed min throttle {min_throttle}"
            ),
        }
    }
}

/// Immutable parameters for one noise script run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct NoiseConfig {
    pub min_command: PulseWidth,
    pub min_throttle: PulseWidth,
    pub max_throttle: PulseWidth,
    pub throttle_change_wait: Duration,
    pub noise_steps: u8,
    pub extreme_steps: bool,
    pub extreme_iterations: u16,
    pub iterations: u16,
    pub random_iterations: u16,
    pub startup_delay: Duration,
    pub idle_settle: Duration,
}

impl NoiseConfig {
    /// Reference script tuned for a 5" quad motor on a thrust stand.
    pub const DEFAULT: Self = Self {
        min_command: DEFAULT_MIN_COMMAND,
        min_throttle: DEFAULT_MIN_THROTTLE,
        max_throttle: DEFAULT_MAX_THROTTLE,
        throttle_change_wait: DEFAULT_THROTTLE_CHANGE_WAIT,
        noise_steps: DEFAULT_NOISE_STEPS,
        extreme_steps: true,
        extreme_iterations: DEFAULT_EXTREME_ITERATIONS,
        iterations: DEFAULT_ITERATIONS,
        random_iterations: DEFAULT_RANDOM_ITERATIONS,
        startup_delay: DEFAULT_STARTUP_DELAY,
        idle_settle: DEFAULT_IDLE_SETTLE,
    };

    #[must_use]
    pub const fn with_min_command(mut self, command: PulseWidth) -> Self {
        self.min_command = command;
        self
    }

    #[must_use]
    pub const fn with_throttle_range(mut self, min: PulseWidth, max: PulseWidth) -> Self {
        self.min_throttle = min;
        self.max_throttle = max;
        self
    }

    #[must_use]
    pub const fn with_throttle_change_wait(mut self, wait: Duration) -> Self {
        self.throttle_change_wait = wait;
        self
    }

    #[must_use]
    pub const fn with_noise_steps(mut self, steps: u8) -> Self {
        self.noise_steps = steps;
        self
    }

    #[must_use]
    pub const fn with_extreme_steps(mut self, enabled: bool, iterations: u16) -> Self {
        self.extreme_steps = enabled;
        self.extreme_iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_iterations(mut self, iterations: u16) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_random_iterations(mut self, iterations: u16) -> Self {
        self.random_iterations = iterations;
        self
    }

    #[must_use]
    pub const fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_idle_settle(mut self, settle: Duration) -> Self {
        self.idle_settle = settle;
        self
    }

    /// Width of the running throttle window in microseconds (zero when inverted).
    #[must_use]
    pub const fn command_resolution(&self) -> u16 {
        self.max_throttle
            .as_micros()
            .saturating_sub(self.min_throttle.as_micros())
    }

    /// Floored distance between neighbouring command-set levels.
    #[must_use]
    pub const fn step_resolution(&self) -> u16 {
        if self.noise_steps == 0 {
            0
        } else {
            self.command_resolution() / self.noise_steps as u16
        }
    }

    /// Rejects configurations that would stall or misdrive the sequencer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_throttle >= self.max_throttle {
            return Err(ConfigError::ThrottleRangeInverted {
                min: self.min_throttle,
                max: self.max_throttle,
            });
        }
        if self.noise_steps < MIN_NOISE_STEPS {
            return Err(ConfigError::TooFewNoiseSteps(self.noise_steps));
        }
        if usize::from(self.noise_steps) > MAX_NOISE_STEPS {
            return Err(ConfigError::TooManyNoiseSteps(self.noise_steps));
        }
        if self.step_resolution() == 0 {
            return Err(ConfigError::StepResolutionZero {
                range: self.command_resolution(),
                noise_steps: self.noise_steps,
            });
        }
        if self.min_command > self.min_throttle {
            return Err(ConfigError::SafeCommandAboveThrottle {
                command: self.min_command,
                min_throttle: self.min_throttle,
            });
        }
        Ok(())
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_is_valid() {
        assert_eq!(NoiseConfig::default().validate(), Ok(()));
        assert_eq!(NoiseConfig::DEFAULT.step_resolution(), 173);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let config = NoiseConfig::DEFAULT.with_throttle_range(
            PulseWidth::from_micros(1_500),
            PulseWidth::from_micros(1_500),
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThrottleRangeInverted {
                min: PulseWidth::from_micros(1_500),
                max: PulseWidth::from_micros(1_500),
            })
        );
    }

    #[test]
    fn noise_step_bounds_are_enforced() {
        assert_eq!(
            NoiseConfig::DEFAULT.with_noise_steps(2).validate(),
            Err(ConfigError::TooFewNoiseSteps(2))
        );
        assert_eq!(
            NoiseConfig::DEFAULT.with_noise_steps(33).validate(),
            Err(ConfigError::TooManyNoiseSteps(33))
        );
        assert_eq!(NoiseConfig::DEFAULT.with_noise_steps(3).validate(), Ok(()));
    }

    #[test]
    fn narrow_range_without_resolution_is_rejected() {
        let config = NoiseConfig::DEFAULT
            .with_throttle_range(PulseWidth::from_micros(1_100), PulseWidth::from_micros(1_102))
            .with_noise_steps(3);
        assert_eq!(
            config.validate(),
            Err(ConfigError::StepResolutionZero {
                range: 2,
                noise_steps: 3,
            })
        );
    }

    #[test]
    fn safe_command_must_not_exceed_min_throttle() {
        let config = NoiseConfig::DEFAULT.with_min_command(PulseWidth::from_micros(1_100));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::SafeCommandAboveThrottle { .. })
        ));
    }
}
