use core::time::Duration;

use noise_core::output::{Delay, ThrottleOutput};
use noise_core::sequencer::{NoiseSequencer, SequenceError};
use noise_core::telemetry::{NoiseEvent, TelemetryLog};
use noise_core::{ConfigError, NoiseConfig, PulseWidth};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

#[derive(Default)]
struct RecordingOutput {
    pulses: Vec<PulseWidth>,
}

impl ThrottleOutput for RecordingOutput {
    fn set_pulse(&mut self, pulse: PulseWidth) {
        self.pulses.push(pulse);
    }
}

#[derive(Default)]
struct CountingDelay {
    elapsed: Duration,
}

impl Delay for CountingDelay {
    fn delay(&mut self, duration: Duration) {
        self.elapsed += duration;
    }
}

/// Generator that always yields zero, so every draw lands on the lowest level.
struct StuckRng;

impl RngCore for StuckRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        dst.fill(0);
    }
}

#[test]
fn output_ends_at_safe_command_for_every_configuration() {
    let configs = [
        NoiseConfig::DEFAULT,
        NoiseConfig::DEFAULT.with_iterations(0),
        NoiseConfig::DEFAULT.with_iterations(1).with_random_iterations(1),
        NoiseConfig::DEFAULT
            .with_min_command(PulseWidth::from_micros(980))
            .with_noise_steps(7)
            .with_extreme_steps(true, 2),
        NoiseConfig::DEFAULT
            .with_throttle_range(PulseWidth::from_micros(1_100), PulseWidth::from_micros(1_400))
            .with_extreme_steps(false, 9),
    ];

    for (seed, config) in (0_u64..).zip(configs) {
        let mut sequencer = NoiseSequencer::new(config, SmallRng::seed_from_u64(seed))
            .expect("valid config");
        let mut output = RecordingOutput::default();
        let mut delay = CountingDelay::default();
        let mut log = TelemetryLog::<8>::new();

        sequencer
            .run_to_completion(&mut output, &mut delay, &mut log)
            .expect("script completes");

        assert_eq!(output.pulses.last(), Some(&config.min_command));
        assert!(sequencer.is_finished());
        assert_eq!(
            log.latest().map(|record| record.event),
            Some(NoiseEvent::ScriptComplete {
                command: config.min_command,
            })
        );
        let completions = log
            .oldest_first()
            .filter(|record| matches!(record.event, NoiseEvent::ScriptComplete { .. }))
            .count();
        assert_eq!(completions, 1);
    }
}

#[test]
fn finished_script_refuses_to_run_again() {
    let mut sequencer = NoiseSequencer::new(
        NoiseConfig::DEFAULT.with_iterations(1),
        SmallRng::seed_from_u64(8),
    )
    .expect("valid config");
    let mut output = RecordingOutput::default();
    let mut delay = CountingDelay::default();
    let mut log = TelemetryLog::<4>::new();

    sequencer
        .run_to_completion(&mut output, &mut delay, &mut log)
        .expect("first run completes");
    let recorded = log.total_recorded();

    assert_eq!(
        sequencer.run_to_completion(&mut output, &mut delay, &mut log),
        Err(SequenceError::AlreadyFinished)
    );
    assert_eq!(log.total_recorded(), recorded);
    assert_eq!(output.pulses.last(), Some(&PulseWidth::from_micros(1_000)));
}

#[test]
fn resample_exhaustion_fails_safe() {
    let config = NoiseConfig::DEFAULT.with_iterations(2);
    let mut sequencer = NoiseSequencer::new(config, StuckRng).expect("valid config");
    let mut output = RecordingOutput::default();
    let mut delay = CountingDelay::default();
    let mut log = TelemetryLog::<16>::new();

    let result = sequencer.run_to_completion(&mut output, &mut delay, &mut log);

    assert_eq!(
        result,
        Err(SequenceError::NoDistinctLevel {
            previous: config.min_throttle,
        })
    );
    assert!(sequencer.is_finished());
    assert_eq!(output.pulses.last(), Some(&config.min_command));
}

#[test]
fn degenerate_configurations_fail_before_touching_the_output() {
    let cases = [
        (
            NoiseConfig::DEFAULT.with_noise_steps(2),
            ConfigError::TooFewNoiseSteps(2),
        ),
        (
            NoiseConfig::DEFAULT.with_throttle_range(
                PulseWidth::from_micros(1_900),
                PulseWidth::from_micros(1_035),
            ),
            ConfigError::ThrottleRangeInverted {
                min: PulseWidth::from_micros(1_900),
                max: PulseWidth::from_micros(1_035),
            },
        ),
    ];

    for (config, expected) in cases {
        match NoiseSequencer::new(config, SmallRng::seed_from_u64(0)) {
            Err(err) => assert_eq!(err, expected),
            Ok(_) => panic!("configuration {config:?} should be rejected"),
        }
    }
}
