use noise_core::NoiseSequencer;
use rand::rngs::SmallRng;

use super::SCRIPT_OUTCOME;
use crate::esc::PwmEsc;
use crate::script::{self, FirmwareSink};

#[embassy_executor::task]
pub async fn run(mut sequencer: NoiseSequencer<SmallRng>, mut esc: PwmEsc<'static>) -> ! {
    let mut sink = FirmwareSink::new();
    let outcome = script::run_script(&mut sequencer, &mut esc, &mut sink).await;
    defmt::debug!(
        "noise: {} events recorded",
        sink.history().total_recorded()
    );
    SCRIPT_OUTCOME.signal(outcome);

    // `esc` must outlive the script: dropping the PWM driver stops the timer.
    loop {
        core::future::pending::<()>().await;
    }
}
