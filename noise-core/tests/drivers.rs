use core::time::Duration;

use noise_core::output::{Delay, ThrottleOutput};
use noise_core::sequencer::{Directive, NoiseSequencer, WalkMode};
use noise_core::telemetry::{EventSink, NoiseEvent};
use noise_core::{NoiseConfig, PulseWidth};
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(Default)]
struct RecordingSink {
    events: Vec<NoiseEvent>,
}

impl EventSink for RecordingSink {
    fn record(&mut self, event: NoiseEvent) {
        self.events.push(event);
    }
}

#[derive(Default)]
struct RecordingOutput {
    pulses: Vec<(Duration, PulseWidth)>,
}

struct VirtualClock<'a> {
    now: &'a core::cell::Cell<Duration>,
}

impl Delay for VirtualClock<'_> {
    fn delay(&mut self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }
}

struct TimedOutput<'a> {
    now: &'a core::cell::Cell<Duration>,
    inner: RecordingOutput,
}

impl ThrottleOutput for TimedOutput<'_> {
    fn set_pulse(&mut self, pulse: PulseWidth) {
        self.inner.pulses.push((self.now.get(), pulse));
    }
}

fn level_changes(events: &[NoiseEvent], wanted: WalkMode) -> Vec<(PulseWidth, PulseWidth)> {
    events
        .iter()
        .filter_map(|event| match event {
            NoiseEvent::LevelChange { mode, from, to } if *mode == wanted => Some((*from, *to)),
            _ => None,
        })
        .collect()
}

#[test]
fn randomized_drivers_never_repeat_the_previous_level() {
    for seed in 0..32 {
        let config = NoiseConfig::DEFAULT
            .with_noise_steps(3)
            .with_random_iterations(40)
            .with_iterations(2);
        let mut sequencer =
            NoiseSequencer::new(config, SmallRng::seed_from_u64(seed)).expect("valid config");
        let mut sink = RecordingSink::default();
        while !sequencer
            .advance(&mut sink)
            .expect("sequencer advance")
            .is_finish()
        {}

        for mode in [WalkMode::Ramped, WalkMode::Sudden] {
            let changes = level_changes(&sink.events, mode);
            assert_eq!(changes.len(), 2 * 39, "seed={seed} mode={mode}");
            for (from, to) in &changes {
                assert_ne!(from, to);
                assert!(sequencer.commands().levels().contains(to));
            }
            for window in changes.chunks(39) {
                assert_eq!(window[0].0, config.min_throttle);
                for pair in window.windows(2) {
                    assert_eq!(pair[0].1, pair[1].0);
                }
            }
        }
    }
}

#[test]
fn ramped_driver_ramps_and_sudden_driver_sets() {
    let config = NoiseConfig::DEFAULT
        .with_iterations(1)
        .with_random_iterations(3)
        .with_extreme_steps(false, 0);
    let mut sequencer =
        NoiseSequencer::new(config, SmallRng::seed_from_u64(21)).expect("valid config");
    let mut sink = RecordingSink::default();
    let mut directives = Vec::new();
    loop {
        let directive = sequencer.advance(&mut sink).expect("sequencer advance");
        directives.push(directive);
        if directive.is_finish() {
            break;
        }
    }

    // arm, idle, ramp up, ramp down, two ramped changes, two sudden changes, finish
    assert_eq!(directives.len(), 9);
    let ramped = level_changes(&sink.events, WalkMode::Ramped);
    let sudden = level_changes(&sink.events, WalkMode::Sudden);

    for (directive, (from, to)) in directives[4..6].iter().zip(&ramped) {
        assert_eq!(
            *directive,
            Directive::Ramp {
                from: *from,
                to: *to,
                over: config.throttle_change_wait,
            }
        );
    }
    for (directive, (_, to)) in directives[6..8].iter().zip(&sudden) {
        assert_eq!(
            *directive,
            Directive::Set {
                level: *to,
                hold: config.throttle_change_wait,
            }
        );
    }
}

#[test]
fn extreme_driver_alternates_full_range_for_configured_cycles() {
    for cycles in [0_u16, 1, 3, 5] {
        let config = NoiseConfig::DEFAULT
            .with_iterations(1)
            .with_random_iterations(0)
            .with_extreme_steps(true, cycles);
        let mut sequencer =
            NoiseSequencer::new(config, SmallRng::seed_from_u64(2)).expect("valid config");
        let mut sink = RecordingSink::default();
        let mut extreme = Vec::new();
        let mut after_ramp_down = false;
        loop {
            let directive = sequencer.advance(&mut sink).expect("sequencer advance");
            if directive.is_finish() {
                break;
            }
            if after_ramp_down {
                extreme.push(directive.target());
            }
            if directive
                == (Directive::Ramp {
                    from: config.max_throttle,
                    to: config.min_throttle,
                    over: config.throttle_change_wait,
                })
            {
                after_ramp_down = true;
            }
        }

        assert_eq!(extreme.len(), usize::from(cycles) * 2, "cycles={cycles}");
        for pair in extreme.chunks(2) {
            assert_eq!(pair, &[config.max_throttle, config.min_throttle]);
        }
        let ended = sink
            .events
            .iter()
            .filter(|event| matches!(event, NoiseEvent::ExtremeChangesEnded))
            .count();
        assert_eq!(ended, 1);
    }
}

#[test]
fn blocking_run_realises_ramps_frame_by_frame() {
    let config = NoiseConfig::DEFAULT
        .with_iterations(1)
        .with_random_iterations(0)
        .with_extreme_steps(false, 0);
    let now = core::cell::Cell::new(Duration::ZERO);
    let mut output = TimedOutput {
        now: &now,
        inner: RecordingOutput::default(),
    };
    let mut clock = VirtualClock { now: &now };
    let mut sequencer =
        NoiseSequencer::new(config, SmallRng::seed_from_u64(4)).expect("valid config");

    sequencer
        .run_to_completion(&mut output, &mut clock, &mut RecordingSink::default())
        .expect("script completes");

    let pulses = &output.inner.pulses;
    // arm + idle + 5 ramp-up frames + 5 ramp-down frames + finish
    assert_eq!(pulses.len(), 13);
    assert_eq!(pulses[0], (Duration::ZERO, config.min_command));
    assert_eq!(pulses[1], (config.startup_delay, config.min_throttle));
    assert_eq!(pulses[6].1, config.max_throttle);
    assert_eq!(pulses[11].1, config.min_throttle);
    assert_eq!(
        pulses[12],
        (
            config.startup_delay + config.idle_settle + config.throttle_change_wait * 2,
            config.min_command
        )
    );
    assert!(pulses.windows(2).all(|pair| pair[0].0 <= pair[1].0));
}

#[test]
fn extreme_driver_finishes_at_the_largest_cycle_count() {
    let config = NoiseConfig::DEFAULT
        .with_iterations(1)
        .with_random_iterations(0)
        .with_extreme_steps(true, u16::MAX);
    let mut sequencer =
        NoiseSequencer::new(config, SmallRng::seed_from_u64(6)).expect("valid config");
    let mut sink = RecordingSink::default();
    let mut directives = 0_u32;
    let bound = 2 * u32::from(u16::MAX) + 16;

    loop {
        let directive = sequencer.advance(&mut sink).expect("sequencer advance");
        directives += 1;
        if directive.is_finish() {
            break;
        }
        assert!(directives < bound, "extreme driver did not terminate");
    }

    // arm, idle, ramp up, ramp down, two edges per cycle, finish
    assert_eq!(directives, 5 + 2 * u32::from(u16::MAX));
    assert!(sequencer.is_finished());
}
