//! Seams between the sequencer and the ESC hardware or its stand-ins.

use core::time::Duration;

use crate::commands::PulseWidth;
use crate::ramp::RampProfile;
use crate::sequencer::Directive;

/// Abstraction over the ESC signal output.
pub trait ThrottleOutput {
    /// Commands a new pulse width immediately.
    fn set_pulse(&mut self, pulse: PulseWidth);
}

/// Blocking wait used by synchronous hosts.
pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

impl<T: ThrottleOutput + ?Sized> ThrottleOutput for &mut T {
    fn set_pulse(&mut self, pulse: PulseWidth) {
        (**self).set_pulse(pulse);
    }
}

/// Carries out one directive on a blocking host.
///
/// Returns `true` once the script has finished and the safe command has been
/// applied.
pub fn apply_directive<O, D>(directive: Directive, output: &mut O, delay: &mut D) -> bool
where
    O: ThrottleOutput + ?Sized,
    D: Delay + ?Sized,
{
    match directive {
        Directive::Set { level, hold } => {
            output.set_pulse(level);
            delay.delay(hold);
            false
        }
        Directive::Ramp { from, to, over } => {
            for point in RampProfile::per_frame(from, to, over) {
                output.set_pulse(point.level);
                delay.delay(point.hold);
            }
            false
        }
        Directive::Finish { level } => {
            output.set_pulse(level);
            true
        }
    }
}
