//! Full-range max/min alternation used by the `ExtremeGate` phase.

use super::Phase;

/// Output edge applied by one extreme step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Edge {
    /// Drive the output to `max_throttle`.
    High,
    /// Drive the output to `min_throttle`.
    Low,
}

/// Per-invocation state for the extreme driver.
///
/// A cycle is counted only on its low edge, once the output has returned to
/// `min_throttle`. The driver ends after `target` complete high/low pairs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ExtremeCycle {
    target: u16,
    completed: u16,
    edge: Edge,
    follow_up: Phase,
}

impl ExtremeCycle {
    /// Starts on the high edge of the first cycle.
    #[must_use]
    pub const fn new(target: u16, follow_up: Phase) -> Self {
        Self {
            target,
            completed: 0,
            edge: Edge::High,
            follow_up,
        }
    }

    /// Number of low edges applied so far.
    #[must_use]
    pub const fn completed_cycles(&self) -> u16 {
        self.completed
    }

    #[must_use]
    pub const fn follow_up(&self) -> Phase {
        self.follow_up
    }

    /// Returns the next edge to apply, or `None` once `target` cycles are complete.
    pub fn next_edge(&mut self) -> Option<Edge> {
        if self.completed_cycles() >= self.target {
            return None;
        }

        let edge = self.edge;
        match edge {
            Edge::High => self.edge = Edge::Low,
            Edge::Low => {
                // completed < target <= u16::MAX here
                self.completed += 1;
                self.edge = Edge::High;
            }
        }
        Some(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut cycle: ExtremeCycle) -> (u32, u32) {
        let (mut highs, mut lows) = (0, 0);
        while let Some(edge) = cycle.next_edge() {
            match edge {
                Edge::High => highs += 1,
                Edge::Low => lows += 1,
            }
        }
        (highs, lows)
    }

    #[test]
    fn performs_target_high_low_pairs() {
        assert_eq!(drain(ExtremeCycle::new(5, Phase::IterationDone)), (5, 5));
        assert_eq!(drain(ExtremeCycle::new(1, Phase::IterationDone)), (1, 1));
        assert_eq!(drain(ExtremeCycle::new(0, Phase::IterationDone)), (0, 0));
    }

    #[test]
    fn largest_target_still_terminates() {
        let (highs, lows) = drain(ExtremeCycle::new(u16::MAX, Phase::IterationDone));
        assert_eq!(highs, u32::from(u16::MAX));
        assert_eq!(lows, u32::from(u16::MAX));
    }

    #[test]
    fn edges_alternate_starting_high() {
        let mut cycle = ExtremeCycle::new(2, Phase::IterationDone);
        assert_eq!(cycle.next_edge(), Some(Edge::High));
        assert_eq!(cycle.next_edge(), Some(Edge::Low));
        assert_eq!(cycle.completed_cycles(), 1);
        assert_eq!(cycle.next_edge(), Some(Edge::High));
        assert_eq!(cycle.next_edge(), Some(Edge::Low));
        assert_eq!(cycle.next_edge(), None);
        assert_eq!(cycle.completed_cycles(), 2);
    }
}
