#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! ESC signal generation on a 50 Hz timer channel.

use noise_core::PulseWidth;

/// Servo-style refresh rate expected by hobby ESCs.
pub const PWM_FREQUENCY_HZ: u32 = 50;

/// Length of one PWM period in microseconds.
pub const PWM_PERIOD_US: u32 = 1_000_000 / PWM_FREQUENCY_HZ;

/// Converts a pulse width into a compare value for a timer whose full period
/// maps to `max_duty`. Pulses longer than the period saturate at `max_duty`.
pub fn pulse_to_duty(pulse: PulseWidth, max_duty: u32) -> u32 {
    let scaled = u64::from(pulse.as_micros()) * u64::from(max_duty) / u64::from(PWM_PERIOD_US);
    u32::try_from(scaled).unwrap_or(max_duty).min(max_duty)
}

#[cfg(target_os = "none")]
pub use hardware::PwmEsc;

#[cfg(target_os = "none")]
mod hardware {
    use embassy_stm32::peripherals::TIM3;
    use embassy_stm32::timer::simple_pwm::SimplePwm;
    use noise_core::PulseWidth;
    use noise_core::output::ThrottleOutput;

    use super::pulse_to_duty;
    use crate::status;

    /// ESC driven from TIM3 channel 1.
    pub struct PwmEsc<'d> {
        pwm: SimplePwm<'d, TIM3>,
    }

    impl<'d> PwmEsc<'d> {
        pub fn new(mut pwm: SimplePwm<'d, TIM3>) -> Self {
            pwm.ch1().enable();
            Self { pwm }
        }
    }

    impl ThrottleOutput for PwmEsc<'_> {
        fn set_pulse(&mut self, pulse: PulseWidth) {
            let mut channel = self.pwm.ch1();
            let max_duty = u32::from(channel.max_duty_cycle());
            let duty = u16::try_from(pulse_to_duty(pulse, max_duty)).unwrap_or(u16::MAX);
            channel.set_duty_cycle(duty.into());
            status::record_pulse(pulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_maps_onto_timer_period() {
        assert_eq!(PWM_PERIOD_US, 20_000);
        assert_eq!(pulse_to_duty(PulseWidth::from_micros(1_000), 20_000), 1_000);
        assert_eq!(pulse_to_duty(PulseWidth::from_micros(1_500), 40_000), 3_000);
        assert_eq!(pulse_to_duty(PulseWidth::from_micros(1_900), 64_000), 6_080);
    }

    #[test]
    fn overlong_pulse_saturates() {
        assert_eq!(pulse_to_duty(PulseWidth::from_micros(u16::MAX), 1_000), 1_000);
    }
}
