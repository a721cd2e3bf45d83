//! Phase sequencer for the noise script.
//!
//! The script is a chain of timed phases repeated for a configured number of
//! outer iterations. Instead of blocking, the sequencer is advanced one
//! continuation at a time: every call to [`NoiseSequencer::advance`] returns a
//! [`Directive`] describing the output change the host must make and how long
//! it must suspend before advancing again. Firmware maps directives onto
//! Embassy timers, the emulator onto a virtual clock, and tests onto plain
//! recording mocks, while the phase logic stays in one place.
//!
//! Exactly one continuation is pending at any time. Zero-wait transitions
//! (driver completion, skipped extreme gate, iteration bookkeeping) are
//! followed inside a single `advance` call, so each returned directive marks a
//! genuine suspension point.

use core::{fmt, time::Duration};

use rand::RngCore;

use crate::commands::{CommandSet, PulseWidth};
use crate::config::{ConfigError, NoiseConfig};
use crate::output::{Delay, ThrottleOutput, apply_directive};
use crate::telemetry::{EventSink, NoiseEvent};

pub mod extreme;
pub mod random;

pub use extreme::{Edge, ExtremeCycle};
pub use random::{LevelStep, RandomWalk, WalkMode};

/// Discrete stage of the script.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    RampUp,
    RampDown,
    RandomRamped,
    RandomSudden,
    ExtremeGate,
    IterationDone,
    Finished,
}

impl Phase {
    /// Phases of one outer iteration in execution order, starting at `Idle`.
    pub const CHAIN: [Phase; 7] = [
        Phase::Idle,
        Phase::RampUp,
        Phase::RampDown,
        Phase::RandomRamped,
        Phase::RandomSudden,
        Phase::ExtremeGate,
        Phase::IterationDone,
    ];

    /// Successor entered once this phase's action and wait have completed.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Phase::Idle | Phase::IterationDone => Phase::RampUp,
            Phase::RampUp => Phase::RampDown,
            Phase::RampDown => Phase::RandomRamped,
            Phase::RandomRamped => Phase::RandomSudden,
            Phase::RandomSudden => Phase::ExtremeGate,
            Phase::ExtremeGate => Phase::IterationDone,
            Phase::Finished => Phase::Finished,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::RampUp => "ramp-up",
            Phase::RampDown => "ramp-down",
            Phase::RandomRamped => "random-ramped",
            Phase::RandomSudden => "random-sudden",
            Phase::ExtremeGate => "extreme-gate",
            Phase::IterationDone => "iteration-done",
            Phase::Finished => "finished",
        }
    }

    /// Deterministic index used when phases are stored in atomics.
    #[must_use]
    pub const fn as_index(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::RampUp => 1,
            Phase::RampDown => 2,
            Phase::RandomRamped => 3,
            Phase::RandomSudden => 4,
            Phase::ExtremeGate => 5,
            Phase::IterationDone => 6,
            Phase::Finished => 7,
        }
    }

    /// Attempts to construct a [`Phase`] from a raw index.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Phase::Idle),
            1 => Some(Phase::RampUp),
            2 => Some(Phase::RampDown),
            3 => Some(Phase::RandomRamped),
            4 => Some(Phase::RandomSudden),
            5 => Some(Phase::ExtremeGate),
            6 => Some(Phase::IterationDone),
            7 => Some(Phase::Finished),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output action the host performs before advancing the sequencer again.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Directive {
    /// Set the output immediately, then wait `hold`.
    Set { level: PulseWidth, hold: Duration },
    /// Drive the output smoothly from `from` to `to`; advance once the ramp completes.
    Ramp {
        from: PulseWidth,
        to: PulseWidth,
        over: Duration,
    },
    /// Set the output to the safe command and report completion to the host.
    Finish { level: PulseWidth },
}

impl Directive {
    /// Time the host suspends for while carrying out the directive.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Directive::Set { hold, .. } => *hold,
            Directive::Ramp { over, .. } => *over,
            Directive::Finish { .. } => Duration::ZERO,
        }
    }

    /// Level the output rests at once the directive has been carried out.
    #[must_use]
    pub const fn target(&self) -> PulseWidth {
        match self {
            Directive::Set { level, .. } | Directive::Finish { level } => *level,
            Directive::Ramp { to, .. } => *to,
        }
    }

    #[must_use]
    pub const fn is_finish(&self) -> bool {
        matches!(self, Directive::Finish { .. })
    }
}

/// Failures surfaced while advancing the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceError {
    /// The resample budget ran out before a level other than `previous` was drawn.
    NoDistinctLevel { previous: PulseWidth },
    /// The script has already reported completion.
    AlreadyFinished,
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::NoDistinctLevel { previous } => {
                write!(f, "no command level distinct from {previous} could be drawn")
            }
            SequenceError::AlreadyFinished => f.write_str("noise script already finished"),
        }
    }
}

/// Continuation pending for the next `advance`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Activity {
    Arming,
    Enter(Phase),
    RandomWalk(RandomWalk),
    Extreme(ExtremeCycle),
    Done,
}

enum Step {
    Suspend(Directive),
    Continue,
}

/// Owns the only mutable script state: the outer iteration counter and the
/// pending continuation.
pub struct NoiseSequencer<R> {
    config: NoiseConfig,
    commands: CommandSet,
    rng: R,
    outer_iteration: u16,
    phase: Option<Phase>,
    activity: Activity,
}

impl<R: RngCore> NoiseSequencer<R> {
    /// Validates `config`, builds the command set, and parks the sequencer
    /// ahead of the arming step.
    pub fn new(config: NoiseConfig, rng: R) -> Result<Self, ConfigError> {
        let commands = CommandSet::from_config(&config)?;
        Ok(Self {
            config,
            commands,
            rng,
            outer_iteration: 0,
            phase: None,
            activity: Activity::Arming,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &NoiseConfig {
        &self.config
    }

    #[must_use]
    pub const fn commands(&self) -> &CommandSet {
        &self.commands
    }

    /// Number of completed outer iterations.
    #[must_use]
    pub const fn outer_iteration(&self) -> u16 {
        self.outer_iteration
    }

    /// Most recently entered phase, or `None` while arming.
    #[must_use]
    pub const fn current_phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Pulse the output must be left at whenever the script stops.
    #[must_use]
    pub const fn safe_command(&self) -> PulseWidth {
        self.config.min_command
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.activity, Activity::Done)
    }

    /// Runs the pending continuation and returns the next suspension point.
    ///
    /// The first call arms the output and requests the startup delay. After
    /// [`Directive::Finish`] has been returned every further call fails with
    /// [`SequenceError::AlreadyFinished`]. Any other error also ends the
    /// script; the host must then force the output to [`Self::safe_command`].
    pub fn advance<S>(&mut self, sink: &mut S) -> Result<Directive, SequenceError>
    where
        S: EventSink + ?Sized,
    {
        loop {
            let step = match self.activity {
                Activity::Arming => self.arm(sink),
                Activity::Enter(phase) => self.enter(phase, sink),
                Activity::RandomWalk(walk) => self.drive_random_walk(walk, sink)?,
                Activity::Extreme(cycle) => self.drive_extreme(cycle, sink),
                Activity::Done => return Err(SequenceError::AlreadyFinished),
            };

            if let Step::Suspend(directive) = step {
                return Ok(directive);
            }
        }
    }

    /// Re-enters the sequencer at an explicit phase.
    ///
    /// The terminal check runs before dispatch, so this can force the script
    /// to finish from any phase boundary.
    pub fn resume_at<S>(&mut self, phase: Phase, sink: &mut S) -> Result<Directive, SequenceError>
    where
        S: EventSink + ?Sized,
    {
        if self.is_finished() {
            return Err(SequenceError::AlreadyFinished);
        }
        self.activity = Activity::Enter(phase);
        self.advance(sink)
    }

    /// Drives the whole script on a blocking host.
    ///
    /// The output is left at the safe command on every exit path, including
    /// errors.
    pub fn run_to_completion<O, D, S>(
        &mut self,
        output: &mut O,
        delay: &mut D,
        sink: &mut S,
    ) -> Result<(), SequenceError>
    where
        O: ThrottleOutput + ?Sized,
        D: Delay + ?Sized,
        S: EventSink + ?Sized,
    {
        loop {
            match self.advance(sink) {
                Ok(directive) => {
                    if apply_directive(directive, output, delay) {
                        return Ok(());
                    }
                }
                Err(err) => {
                    output.set_pulse(self.safe_command());
                    return Err(err);
                }
            }
        }
    }

    fn arm<S>(&mut self, sink: &mut S) -> Step
    where
        S: EventSink + ?Sized,
    {
        sink.record(NoiseEvent::Arming {
            command: self.config.min_command,
            delay: self.config.startup_delay,
        });
        self.activity = Activity::Enter(Phase::Idle);
        Step::Suspend(Directive::Set {
            level: self.config.min_command,
            hold: self.config.startup_delay,
        })
    }

    fn enter<S>(&mut self, phase: Phase, sink: &mut S) -> Step
    where
        S: EventSink + ?Sized,
    {
        if self.outer_iteration >= self.config.iterations || phase == Phase::Finished {
            return self.finish(sink);
        }

        self.phase = Some(phase);
        sink.record(NoiseEvent::PhaseEntered(phase));

        let config = self.config;
        let next = phase.next();
        match phase {
            Phase::Idle => {
                self.activity = Activity::Enter(next);
                Step::Suspend(Directive::Set {
                    level: config.min_throttle,
                    hold: config.idle_settle,
                })
            }
            Phase::RampUp => {
                self.activity = Activity::Enter(next);
                Step::Suspend(Directive::Ramp {
                    from: config.min_throttle,
                    to: config.max_throttle,
                    over: config.throttle_change_wait,
                })
            }
            Phase::RampDown => {
                self.activity = Activity::Enter(next);
                Step::Suspend(Directive::Ramp {
                    from: config.max_throttle,
                    to: config.min_throttle,
                    over: config.throttle_change_wait,
                })
            }
            Phase::RandomRamped => {
                self.activity = Activity::RandomWalk(RandomWalk::new(
                    WalkMode::Ramped,
                    config.min_throttle,
                    next,
                ));
                Step::Continue
            }
            Phase::RandomSudden => {
                self.activity = Activity::RandomWalk(RandomWalk::new(
                    WalkMode::Sudden,
                    config.min_throttle,
                    next,
                ));
                Step::Continue
            }
            Phase::ExtremeGate => {
                if config.extreme_steps {
                    self.activity =
                        Activity::Extreme(ExtremeCycle::new(config.extreme_iterations, next));
                } else {
                    sink.record(NoiseEvent::ExtremeSkipped);
                    self.activity = Activity::Enter(next);
                }
                Step::Continue
            }
            Phase::IterationDone => {
                sink.record(NoiseEvent::IterationComplete(self.outer_iteration));
                self.outer_iteration = self.outer_iteration.saturating_add(1);
                self.activity = Activity::Enter(next);
                Step::Continue
            }
            Phase::Finished => self.finish(sink),
        }
    }

    fn drive_random_walk<S>(
        &mut self,
        mut walk: RandomWalk,
        sink: &mut S,
    ) -> Result<Step, SequenceError>
    where
        S: EventSink + ?Sized,
    {
        let target = self.config.random_iterations;
        let change = match walk.next_level(target, &self.commands, &mut self.rng) {
            Ok(change) => change,
            Err(err) => {
                self.activity = Activity::Done;
                return Err(err);
            }
        };

        let Some(LevelStep { from, to }) = change else {
            sink.record(NoiseEvent::RandomChangesEnded(walk.mode()));
            self.activity = Activity::Enter(walk.follow_up());
            return Ok(Step::Continue);
        };

        sink.record(NoiseEvent::LevelChange {
            mode: walk.mode(),
            from,
            to,
        });
        self.activity = Activity::RandomWalk(walk);

        let wait = self.config.throttle_change_wait;
        let directive = match walk.mode() {
            WalkMode::Ramped => Directive::Ramp {
                from,
                to,
                over: wait,
            },
            WalkMode::Sudden => Directive::Set {
                level: to,
                hold: wait,
            },
        };
        Ok(Step::Suspend(directive))
    }

    fn drive_extreme<S>(&mut self, mut cycle: ExtremeCycle, sink: &mut S) -> Step
    where
        S: EventSink + ?Sized,
    {
        let Some(edge) = cycle.next_edge() else {
            sink.record(NoiseEvent::ExtremeChangesEnded);
            self.activity = Activity::Enter(cycle.follow_up());
            return Step::Continue;
        };

        self.activity = Activity::Extreme(cycle);
        let level = match edge {
            Edge::High => self.config.max_throttle,
            Edge::Low => self.config.min_throttle,
        };
        Step::Suspend(Directive::Set {
            level,
            hold: self.config.throttle_change_wait,
        })
    }

    fn finish<S>(&mut self, sink: &mut S) -> Step
    where
        S: EventSink + ?Sized,
    {
        self.phase = Some(Phase::Finished);
        self.activity = Activity::Done;
        sink.record(NoiseEvent::ScriptComplete {
            command: self.config.min_command,
        });
        Step::Suspend(Directive::Finish {
            level: self.config.min_command,
        })
    }
}
