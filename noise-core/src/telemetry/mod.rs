//! Operator-facing event catalog shared by firmware and host targets.
//!
//! The sequencer never prints anything itself. It reports progress through an
//! [`EventSink`]; the firmware mirrors events to defmt, the emulator renders
//! them as transcript lines, and tests capture them in a [`TelemetryLog`].
//! Sinks are one-way: recording an event can never influence control flow.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::commands::PulseWidth;
use crate::sequencer::{Phase, WalkMode};

/// Identifier assigned to recorded events.
pub type EventId = u32;

/// Progress reported by the sequencer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NoiseEvent {
    /// Output forced to the safe command ahead of the mandatory startup delay.
    Arming { command: PulseWidth, delay: Duration },
    PhaseEntered(Phase),
    /// A randomized driver moved the output to a new level.
    LevelChange {
        mode: WalkMode,
        from: PulseWidth,
        to: PulseWidth,
    },
    RandomChangesEnded(WalkMode),
    ExtremeSkipped,
    ExtremeChangesEnded,
    /// Carries the zero-based index of the iteration that just finished.
    IterationComplete(u16),
    /// Output forced back to the safe command; emitted exactly once.
    ScriptComplete { command: PulseWidth },
}

impl NoiseEvent {
    /// Per-change chatter that hosts may hide from the console.
    #[must_use]
    pub const fn is_verbose(&self) -> bool {
        matches!(self, NoiseEvent::LevelChange { .. })
    }
}

impl fmt::Display for NoiseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoiseEvent::Arming { command, delay } => write!(
                f,
                "ESC armed at {command}. Clear props of all appendages! {} ms until execution.",
                delay.as_millis()
            ),
            NoiseEvent::PhaseEntered(phase) => f.write_str(phase_message(*phase)),
            NoiseEvent::LevelChange { mode, from, to } => {
                write!(f, "{mode} change {from} -> {to}")
            }
            NoiseEvent::RandomChangesEnded(mode) => {
                write!(f, "Random {mode} thrust changes ended.")
            }
            NoiseEvent::ExtremeSkipped => f.write_str("Extreme thrust changes disabled."),
            NoiseEvent::ExtremeChangesEnded => f.write_str("Extreme thrust changes ended."),
            NoiseEvent::IterationComplete(iteration) => {
                write!(f, "Iteration {iteration} complete.")
            }
            NoiseEvent::ScriptComplete { command } => {
                write!(f, "Execution complete. ESC held at {command}.")
            }
        }
    }
}

fn phase_message(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Idling motors.",
        Phase::RampUp => "Ramping to full throttle.",
        Phase::RampDown => "Ramping to min throttle.",
        Phase::RandomRamped => "Random ramped thrust changes.",
        Phase::RandomSudden => "Random sudden thrust changes.",
        Phase::ExtremeGate => "Extreme thrust changes.",
        Phase::IterationDone => "Iteration boundary.",
        Phase::Finished => "Shutting down.",
    }
}

/// Receiver for sequencer progress.
pub trait EventSink {
    fn record(&mut self, event: NoiseEvent);
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn record(&mut self, event: NoiseEvent) {
        (**self).record(event);
    }
}

/// Sink that discards every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&mut self, _: NoiseEvent) {}
}

/// Event stored in a [`TelemetryLog`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: NoiseEvent,
}

/// Fixed-capacity ring of the most recent events.
pub struct TelemetryLog<const N: usize> {
    ring: HistoryBuf<TelemetryRecord, N>,
    next_event_id: EventId,
}

impl<const N: usize> TelemetryLog<N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns the most recent record, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Iterates retained records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Total number of events recorded, including ones evicted from the ring.
    #[must_use]
    pub const fn total_recorded(&self) -> EventId {
        self.next_event_id
    }
}

impl<const N: usize> Default for TelemetryLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EventSink for TelemetryLog<N> {
    fn record(&mut self, event: NoiseEvent) {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, event });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_most_recent_events_in_order() {
        let mut log = TelemetryLog::<2>::new();
        log.record(NoiseEvent::PhaseEntered(Phase::Idle));
        log.record(NoiseEvent::PhaseEntered(Phase::RampUp));
        log.record(NoiseEvent::PhaseEntered(Phase::RampDown));

        assert_eq!(log.len(), 2);
        assert_eq!(log.total_recorded(), 3);
        let ids: heapless::Vec<EventId, 2> = log.oldest_first().map(|record| record.id).collect();
        assert_eq!(ids.as_slice(), &[1, 2]);
        assert_eq!(
            log.latest().map(|record| record.event),
            Some(NoiseEvent::PhaseEntered(Phase::RampDown))
        );
    }

    #[test]
    fn level_changes_are_verbose() {
        let change = NoiseEvent::LevelChange {
            mode: WalkMode::Sudden,
            from: PulseWidth::from_micros(1_035),
            to: PulseWidth::from_micros(1_381),
        };
        assert!(change.is_verbose());
        assert!(!NoiseEvent::ExtremeChangesEnded.is_verbose());
    }
}
