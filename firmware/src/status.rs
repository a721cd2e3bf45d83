#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Atomics mirror the running script so the runtime (and a debugger) can
//! read progress without touching the sequencer. The runtime logs a
//! [`snapshot`] once the script ends.

use noise_core::{Phase, PulseWidth};
use portable_atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering};

const NO_PHASE: u8 = u8::MAX;
const NO_PULSE: u16 = 0;

static PHASE: AtomicU8 = AtomicU8::new(NO_PHASE);
static ITERATION: AtomicU16 = AtomicU16::new(0);
/// Last commanded pulse in microseconds (0 == nothing commanded yet).
static LAST_PULSE_US: AtomicU16 = AtomicU16::new(NO_PULSE);
static FINISHED: AtomicBool = AtomicBool::new(false);

fn encode_phase(phase: Option<Phase>) -> u8 {
    phase.map_or(NO_PHASE, Phase::as_index)
}

fn decode_phase(raw: u8) -> Option<Phase> {
    if raw == NO_PHASE {
        None
    } else {
        Phase::from_index(raw)
    }
}

/// Records the phase the sequencer is executing.
pub fn record_phase(phase: Option<Phase>) {
    PHASE.store(encode_phase(phase), Ordering::Relaxed);
}

/// Records the zero-based outer iteration counter.
pub fn record_iteration(iteration: u16) {
    ITERATION.store(iteration, Ordering::Relaxed);
}

/// Records the pulse most recently written to the ESC.
pub fn record_pulse(pulse: PulseWidth) {
    LAST_PULSE_US.store(pulse.as_micros(), Ordering::Relaxed);
}

pub fn record_finished(finished: bool) {
    FINISHED.store(finished, Ordering::Relaxed);
}

/// Point-in-time copy of the stored progress.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub phase: Option<Phase>,
    pub iteration: u16,
    pub last_pulse: Option<PulseWidth>,
    pub finished: bool,
}

pub fn snapshot() -> StatusSnapshot {
    let last_pulse = match LAST_PULSE_US.load(Ordering::Relaxed) {
        NO_PULSE => None,
        micros => Some(PulseWidth::from_micros(micros)),
    };
    StatusSnapshot {
        phase: decode_phase(PHASE.load(Ordering::Relaxed)),
        iteration: ITERATION.load(Ordering::Relaxed),
        last_pulse,
        finished: FINISHED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_encoding_round_trips() {
        assert_eq!(decode_phase(encode_phase(None)), None);
        for phase in Phase::CHAIN {
            assert_eq!(decode_phase(encode_phase(Some(phase))), Some(phase));
        }
        assert_eq!(
            decode_phase(encode_phase(Some(Phase::Finished))),
            Some(Phase::Finished)
        );
    }

    #[test]
    fn snapshot_reflects_recorded_progress() {
        record_phase(Some(Phase::RandomSudden));
        record_iteration(2);
        record_pulse(PulseWidth::from_micros(1_381));
        record_finished(false);

        let snapshot = snapshot();
        assert_eq!(snapshot.phase, Some(Phase::RandomSudden));
        assert_eq!(snapshot.iteration, 2);
        assert_eq!(snapshot.last_pulse, Some(PulseWidth::from_micros(1_381)));
        assert!(!snapshot.finished);
    }
}
