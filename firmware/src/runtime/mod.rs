use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::time::hz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;
use noise_core::output::ThrottleOutput;
use noise_core::{NoiseConfig, NoiseSequencer, Phase, PulseWidth};
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::esc::{PWM_FREQUENCY_HZ, PwmEsc};
use crate::script::ScriptOutcome;
use crate::status;

mod noise_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Raised once by the noise task when the script stops driving the ESC.
pub(super) static SCRIPT_OUTCOME: Signal<CriticalSectionRawMutex, ScriptOutcome> = Signal::new();

/// Script executed at boot.
const SCRIPT: NoiseConfig = NoiseConfig::DEFAULT;

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals { PA6, TIM3, .. } = hal::init(config);

    let pwm = SimplePwm::new(
        TIM3,
        Some(PwmPin::new(PA6, OutputType::PushPull)),
        None,
        None,
        None,
        hz(PWM_FREQUENCY_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let mut esc = PwmEsc::new(pwm);

    let rng = SmallRng::seed_from_u64(boot_seed());
    let sequencer = match NoiseSequencer::new(SCRIPT, rng) {
        Ok(sequencer) => sequencer,
        Err(err) => {
            esc.set_pulse(SCRIPT.min_command);
            defmt::error!(
                "noise: invalid configuration ({}); ESC held at {}us",
                defmt::Display2Format(&err),
                SCRIPT.min_command.as_micros()
            );
            core::future::pending::<()>().await;
            return;
        }
    };

    if spawner.spawn(noise_task::run(sequencer, esc)).is_err() {
        defmt::error!("noise: failed to spawn script task");
        return;
    }

    match SCRIPT_OUTCOME.wait().await {
        ScriptOutcome::Completed { safe_command } => {
            defmt::info!("noise: script complete, ESC held at {}us", safe_command.as_micros());
        }
        ScriptOutcome::Aborted {
            safe_command,
            error,
        } => {
            defmt::warn!(
                "noise: script aborted ({}), ESC held at {}us",
                defmt::Display2Format(&error),
                safe_command.as_micros()
            );
        }
    }

    let progress = status::snapshot();
    defmt::info!(
        "noise: status phase={} iteration={} last_pulse={}us finished={}",
        progress.phase.map_or("none", Phase::label),
        progress.iteration,
        progress.last_pulse.map_or(0, PulseWidth::as_micros),
        progress.finished
    );

    core::future::pending::<()>().await;
}

/// Seeds the level generator from the device's unique ID and the boot clock.
fn boot_seed() -> u64 {
    let uid = hal::uid::uid();
    let mixed = uid
        .iter()
        .fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
        });
    mixed ^ Instant::now().as_ticks()
}
