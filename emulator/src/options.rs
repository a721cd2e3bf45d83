use std::path::PathBuf;
use std::time::Duration;

use noise_core::{NoiseConfig, PulseWidth};

pub const USAGE: &str = "\
Usage: noise-emulator [options]

Script options (defaults reproduce the reference script):
  --min-command=<us>         safe pulse applied when arming and on completion
  --min-throttle=<us>        lowest running pulse
  --max-throttle=<us>        highest running pulse
  --wait-ms=<ms>             interval between commands and ramp duration
  --noise-steps=<n>          number of random levels (3..=32)
  --extreme=<on|off>         enable the max/min alternation phase
  --extreme-iterations=<n>   full max/min cycles per iteration
  --iterations=<n>           outer iterations
  --random-iterations=<n>    randomized driver counter target
  --startup-ms=<ms>          delay between arming and the first phase
  --idle-ms=<ms>             idle settle before the first ramp

Emulator options:
  --seed=<u64>               seed for the level generator (default: wall clock)
  --realtime                 sleep for every wait instead of simulating time
  --verbose                  print every randomized level change
  --transcript=<path>        mirror the session log into a file
  --help                     show this message";

/// Parsed command line.
#[derive(Clone, Debug, PartialEq)]
pub struct EmulatorOptions {
    pub config: NoiseConfig,
    pub seed: Option<u64>,
    pub realtime: bool,
    pub verbose: bool,
    pub transcript: Option<PathBuf>,
    pub show_help: bool,
}

impl Default for EmulatorOptions {
    fn default() -> Self {
        Self {
            config: NoiseConfig::DEFAULT,
            seed: None,
            realtime: false,
            verbose: false,
            transcript: None,
            show_help: false,
        }
    }
}

/// Parses `--key=value` / `--key value` arguments on top of the default script.
pub fn parse_options<I>(args: I) -> Result<EmulatorOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = EmulatorOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(format!("Unexpected argument `{arg}`"));
        };

        match flag {
            "help" | "h" => {
                options.show_help = true;
                continue;
            }
            "realtime" => {
                options.realtime = true;
                continue;
            }
            "verbose" => {
                options.verbose = true;
                continue;
            }
            _ => {}
        }

        let (key, value) = match flag.split_once('=') {
            Some((key, value)) => (key, value.to_string()),
            None => match args.next() {
                Some(value) => (flag, value),
                None => return Err(format!("Expected value after --{flag}")),
            },
        };

        apply_option(&mut options, key, &value)?;
    }

    if !options.show_help {
        options
            .config
            .validate()
            .map_err(|err| format!("Invalid configuration: {err}"))?;
    }

    Ok(options)
}

fn apply_option(options: &mut EmulatorOptions, key: &str, value: &str) -> Result<(), String> {
    let config = &mut options.config;
    match key {
        "min-command" => config.min_command = parse_pulse(key, value)?,
        "min-throttle" => config.min_throttle = parse_pulse(key, value)?,
        "max-throttle" => config.max_throttle = parse_pulse(key, value)?,
        "wait-ms" => config.throttle_change_wait = parse_millis(key, value)?,
        "noise-steps" => config.noise_steps = parse_number(key, value)?,
        "extreme" => config.extreme_steps = parse_switch(key, value)?,
        "extreme-iterations" => config.extreme_iterations = parse_number(key, value)?,
        "iterations" => config.iterations = parse_number(key, value)?,
        "random-iterations" => config.random_iterations = parse_number(key, value)?,
        "startup-ms" => config.startup_delay = parse_millis(key, value)?,
        "idle-ms" => config.idle_settle = parse_millis(key, value)?,
        "seed" => options.seed = Some(parse_number(key, value)?),
        "transcript" => options.transcript = Some(PathBuf::from(value)),
        other => return Err(format!("Unknown option `--{other}`")),
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid value `{value}` for --{key}"))
}

fn parse_pulse(key: &str, value: &str) -> Result<PulseWidth, String> {
    parse_number(key, value).map(PulseWidth::from_micros)
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, String> {
    parse_number(key, value).map(Duration::from_millis)
}

fn parse_switch(key: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Ok(true),
        "off" | "false" | "no" | "0" => Ok(false),
        _ => Err(format!("Expected on/off for --{key}, got `{value}`")),
    }
}
