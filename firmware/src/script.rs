#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Async executor for sequencer directives.
//!
//! Holds are awaited on the Embassy timer so the executor stays free while
//! the ESC holds a level; ramps step once per servo frame.

use embassy_time::{Duration, Timer};
use noise_core::output::ThrottleOutput;
use noise_core::ramp::RampProfile;
use noise_core::telemetry::{EventSink, NoiseEvent, TelemetryLog};
use noise_core::{Directive, NoiseSequencer, PulseWidth, SequenceError};
use rand::RngCore;

use crate::status;

/// Number of recent events retained for inspection after a run.
pub const EVENT_HISTORY_DEPTH: usize = 32;

/// How the script ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScriptOutcome {
    Completed { safe_command: PulseWidth },
    Aborted { safe_command: PulseWidth, error: SequenceError },
}

/// Sink that logs every event and keeps a short history.
pub struct FirmwareSink {
    history: TelemetryLog<EVENT_HISTORY_DEPTH>,
}

impl FirmwareSink {
    pub const fn new() -> Self {
        Self {
            history: TelemetryLog::new(),
        }
    }

    pub fn history(&self) -> &TelemetryLog<EVENT_HISTORY_DEPTH> {
        &self.history
    }
}

impl EventSink for FirmwareSink {
    fn record(&mut self, event: NoiseEvent) {
        emit_event(&event);
        self.history.record(event);
    }
}

fn core_duration_to_embassy(duration: core::time::Duration) -> Duration {
    let micros = duration.as_micros();
    let micros = u64::try_from(micros).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

/// Runs the script until it finishes, awaiting every hold.
///
/// On a sequencing error the output is forced to the safe command before the
/// outcome is returned.
pub async fn run_script<R, O>(
    sequencer: &mut NoiseSequencer<R>,
    output: &mut O,
    sink: &mut FirmwareSink,
) -> ScriptOutcome
where
    R: RngCore,
    O: ThrottleOutput,
{
    let safe_command = sequencer.safe_command();
    status::record_finished(false);

    loop {
        let directive = match sequencer.advance(sink) {
            Ok(directive) => directive,
            Err(error) => {
                output.set_pulse(safe_command);
                status::record_finished(true);
                emit_failure(error, safe_command);
                return ScriptOutcome::Aborted {
                    safe_command,
                    error,
                };
            }
        };

        status::record_phase(sequencer.current_phase());
        status::record_iteration(sequencer.outer_iteration());

        match directive {
            Directive::Set { level, hold } => {
                output.set_pulse(level);
                Timer::after(core_duration_to_embassy(hold)).await;
            }
            Directive::Ramp { from, to, over } => {
                for point in RampProfile::per_frame(from, to, over) {
                    output.set_pulse(point.level);
                    Timer::after(core_duration_to_embassy(point.hold)).await;
                }
            }
            Directive::Finish { level } => {
                output.set_pulse(level);
                status::record_finished(true);
                return ScriptOutcome::Completed {
                    safe_command: level,
                };
            }
        }
    }
}

#[cfg(target_os = "none")]
fn emit_event(event: &NoiseEvent) {
    if event.is_verbose() {
        defmt::debug!("noise: {}", defmt::Display2Format(event));
    } else {
        defmt::info!("noise: {}", defmt::Display2Format(event));
    }
}

#[cfg(not(target_os = "none"))]
fn emit_event(event: &NoiseEvent) {
    println!("noise: {event}");
}

#[cfg(target_os = "none")]
fn emit_failure(error: SequenceError, safe_command: PulseWidth) {
    defmt::error!(
        "noise: sequencing failed ({}); ESC forced to {}us",
        defmt::Display2Format(&error),
        safe_command.as_micros()
    );
}

#[cfg(not(target_os = "none"))]
fn emit_failure(error: SequenceError, safe_command: PulseWidth) {
    println!("noise: sequencing failed ({error}); ESC forced to {safe_command}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use noise_core::Phase;

    #[test]
    fn durations_convert_to_embassy_ticks() {
        assert_eq!(
            core_duration_to_embassy(core::time::Duration::from_millis(100)),
            Duration::from_millis(100)
        );
        assert_eq!(
            core_duration_to_embassy(core::time::Duration::from_secs(4)),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn sink_keeps_recent_history() {
        let mut sink = FirmwareSink::new();
        sink.record(NoiseEvent::PhaseEntered(Phase::Idle));
        sink.record(NoiseEvent::ExtremeSkipped);

        assert_eq!(sink.history().total_recorded(), 2);
        assert_eq!(
            sink.history().latest().map(|record| record.event),
            Some(NoiseEvent::ExtremeSkipped)
        );
    }
}
