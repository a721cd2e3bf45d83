//! Time-distributed transitions between two pulse widths.
//!
//! ESCs only sample the control signal once per servo frame, so a ramp is
//! realised as a series of instantaneous sets spaced one frame apart. Hosts
//! that expose only a "set output" primitive iterate a [`RampProfile`] and
//! wait for each point's hold before applying the next.

use core::time::Duration;

use crate::commands::PulseWidth;

/// One 50 Hz servo frame.
pub const ESC_FRAME_PERIOD: Duration = Duration::from_millis(20);

/// Level to apply and how long to hold it before the next point.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RampPoint {
    pub level: PulseWidth,
    pub hold: Duration,
}

/// Linear ramp from `from` to `to` spread over `duration`.
///
/// The profile always yields at least one point, the final point lands
/// exactly on `to`, and the holds sum to `duration`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RampProfile {
    from: PulseWidth,
    to: PulseWidth,
    duration: Duration,
    frame: Duration,
    frames: u32,
    emitted: u32,
}

impl RampProfile {
    #[must_use]
    pub fn new(from: PulseWidth, to: PulseWidth, duration: Duration, frame: Duration) -> Self {
        let frame_us = frame.as_micros();
        let total_us = duration.as_micros();
        let frames = if frame_us == 0 || total_us == 0 {
            1
        } else {
            u32::try_from(total_us.div_ceil(frame_us)).unwrap_or(u32::MAX)
        };

        Self {
            from,
            to,
            duration,
            frame,
            frames,
            emitted: 0,
        }
    }

    /// Ramp paced at [`ESC_FRAME_PERIOD`].
    #[must_use]
    pub fn per_frame(from: PulseWidth, to: PulseWidth, duration: Duration) -> Self {
        Self::new(from, to, duration, ESC_FRAME_PERIOD)
    }

    /// Total number of points the profile yields.
    #[must_use]
    pub const fn frame_count(&self) -> u32 {
        self.frames
    }

    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    fn level_at(&self, index: u32) -> PulseWidth {
        let from = i64::from(self.from.as_micros());
        let delta = i64::from(self.to.as_micros()) - from;
        let value = from + delta * i64::from(index) / i64::from(self.frames);
        PulseWidth::from_micros(u16::try_from(value).unwrap_or(self.to.as_micros()))
    }

    fn hold_at(&self, index: u32) -> Duration {
        if index < self.frames {
            return self.frame;
        }
        self.frame
            .checked_mul(self.frames - 1)
            .map_or(Duration::ZERO, |elapsed| {
                self.duration.saturating_sub(elapsed)
            })
    }
}

impl Iterator for RampProfile {
    type Item = RampPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted >= self.frames {
            return None;
        }
        self.emitted += 1;
        let index = self.emitted;
        Some(RampPoint {
            level: self.level_at(index),
            hold: self.hold_at(index),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.frames - self.emitted).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}
