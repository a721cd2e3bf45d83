use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use noise_core::NoiseSequencer;
use noise_core::PulseWidth;
use noise_core::output::{Delay, ThrottleOutput, apply_directive};
use noise_core::telemetry::{EventSink, NoiseEvent};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::options::EmulatorOptions;

/// Host-side run of the noise script against a simulated ESC.
pub struct Session {
    sequencer: NoiseSequencer<SmallRng>,
    esc: SimulatedEsc,
    clock: EmulatorClock,
    transcript: Option<TranscriptLogger>,
    verbose: bool,
    seed: u64,
}

impl Session {
    pub fn new(options: &EmulatorOptions) -> io::Result<Self> {
        let seed = options.seed.unwrap_or_else(wall_clock_seed);
        let sequencer = NoiseSequencer::new(options.config, SmallRng::seed_from_u64(seed))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        let transcript = match &options.transcript {
            Some(path) => Some(TranscriptLogger::create(path, seed)?),
            None => None,
        };

        Ok(Self {
            sequencer,
            esc: SimulatedEsc::default(),
            clock: EmulatorClock::new(options.realtime),
            transcript,
            verbose: options.verbose,
            seed,
        })
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Drives the script to completion, echoing operator messages to `console`.
    ///
    /// A sequencing failure still leaves the simulated ESC at the safe command
    /// before the error is returned.
    pub fn run<W: Write>(&mut self, console: &mut W) -> io::Result<RunSummary> {
        let mut pending = PendingEvents::default();

        loop {
            let outcome = self.sequencer.advance(&mut pending);
            self.flush_events(console, &mut pending)?;

            let directive = match outcome {
                Ok(directive) => directive,
                Err(err) => {
                    let safe = self.sequencer.safe_command();
                    self.esc.set_pulse(safe);
                    let line = format!("Sequencing failed: {err}. ESC forced to {safe}.");
                    self.emit(console, TranscriptRole::Script, &line)?;
                    return Err(io::Error::other(err.to_string()));
                }
            };

            if apply_directive(directive, &mut self.esc, &mut self.clock) {
                break;
            }
        }

        if let Some(transcript) = self.transcript.as_mut() {
            transcript.flush()?;
        }

        Ok(self.summary())
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            elapsed: self.clock.elapsed(),
            iterations: self.sequencer.outer_iteration(),
            pulses: self.esc.pulses,
            lowest: self.esc.lowest,
            highest: self.esc.highest,
            final_pulse: self.esc.current,
        }
    }

    fn flush_events<W: Write>(
        &mut self,
        console: &mut W,
        pending: &mut PendingEvents,
    ) -> io::Result<()> {
        for event in pending.0.drain(..) {
            if event.is_verbose() && !self.verbose {
                continue;
            }
            let line = event.to_string();
            let role = match event {
                NoiseEvent::LevelChange { .. } => TranscriptRole::Esc,
                _ => TranscriptRole::Script,
            };
            write_line(console, self.clock.elapsed(), role, &line)?;
            if let Some(transcript) = self.transcript.as_mut() {
                transcript.append_line(self.clock.elapsed(), role, &line)?;
            }
        }
        Ok(())
    }

    fn emit<W: Write>(&mut self, console: &mut W, role: TranscriptRole, line: &str) -> io::Result<()> {
        write_line(console, self.clock.elapsed(), role, line)?;
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(self.clock.elapsed(), role, line)?;
            transcript.flush()?;
        }
        Ok(())
    }
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            u64::try_from(elapsed.as_nanos()).unwrap_or(elapsed.as_secs())
        })
}

fn write_line<W: Write>(
    writer: &mut W,
    elapsed: Duration,
    role: TranscriptRole,
    line: &str,
) -> io::Result<()> {
    writeln!(
        writer,
        "[+{:>6} ms] {} {}",
        elapsed.as_millis(),
        role.prefix(),
        line
    )
}

/// Event buffer drained after every sequencer step.
#[derive(Default)]
struct PendingEvents(Vec<NoiseEvent>);

impl EventSink for PendingEvents {
    fn record(&mut self, event: NoiseEvent) {
        self.0.push(event);
    }
}

/// Stand-in ESC that keeps statistics about the commanded signal.
#[derive(Debug, Default)]
pub struct SimulatedEsc {
    current: Option<PulseWidth>,
    lowest: Option<PulseWidth>,
    highest: Option<PulseWidth>,
    pulses: usize,
}

impl SimulatedEsc {
    #[must_use]
    pub const fn current(&self) -> Option<PulseWidth> {
        self.current
    }
}

impl ThrottleOutput for SimulatedEsc {
    fn set_pulse(&mut self, pulse: PulseWidth) {
        self.current = Some(pulse);
        self.lowest = Some(self.lowest.map_or(pulse, |low| low.min(pulse)));
        self.highest = Some(self.highest.map_or(pulse, |high| high.max(pulse)));
        self.pulses += 1;
    }
}

/// Virtual clock; in realtime mode every wait also sleeps the thread.
#[derive(Debug)]
pub struct EmulatorClock {
    elapsed: Duration,
    realtime: bool,
}

impl EmulatorClock {
    #[must_use]
    pub const fn new(realtime: bool) -> Self {
        Self {
            elapsed: Duration::ZERO,
            realtime,
        }
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl Delay for EmulatorClock {
    fn delay(&mut self, duration: Duration) {
        if self.realtime && !duration.is_zero() {
            thread::sleep(duration);
        }
        self.elapsed = self.elapsed.saturating_add(duration);
    }
}

/// Totals printed once the script ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub iterations: u16,
    pub pulses: usize,
    pub lowest: Option<PulseWidth>,
    pub highest: Option<PulseWidth>,
    pub final_pulse: Option<PulseWidth>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ran {} iteration(s) in {:.1} s: {} pulse update(s)",
            self.iterations,
            self.elapsed.as_secs_f64(),
            self.pulses
        )?;
        if let (Some(low), Some(high)) = (self.lowest, self.highest) {
            write!(f, ", range {low}..={high}")?;
        }
        if let Some(last) = self.final_pulse {
            write!(f, ", final {last}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TranscriptRole {
    Script,
    Esc,
}

impl TranscriptRole {
    const fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Script => "NOISE",
            TranscriptRole::Esc => "ESC  ",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn create(path: &Path, seed: u64) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# ESC noise emulator transcript")?;
        writeln!(writer, "# seed: {seed}")?;
        writeln!(writer)?;
        Ok(Self { writer })
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        write_line(&mut self.writer, elapsed, role, line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
