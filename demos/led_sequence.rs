//! Example: play indicator sequences against a logging device.
//!
//! Run with: `RUST_LOG=info cargo run --example led_sequence`

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use log::info;
use piosk_core::{Easing, IndicatorDevice, IntensityStep, PioskError, Sequence, Sequencer};

/// Draws each written intensity as a bar.
#[derive(Default)]
struct LoggingLed {
    value: Mutex<f64>,
}

impl IndicatorDevice for LoggingLed {
    fn value(&self) -> f64 {
        *self.value.lock().unwrap()
    }

    fn set_value(&self, value: f64) -> Result<(), PioskError> {
        *self.value.lock().unwrap() = value;
        info!("{:<20} {:.2}", "#".repeat((value * 20.0).round() as usize), value);
        Ok(())
    }
}

fn main() -> Result<(), PioskError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let sequencer = Sequencer::new(LoggingLed::default());

    println!("Blink three times...");
    sequencer.play(
        Sequence::blink(
            1.0,
            Duration::from_millis(200),
            Duration::from_millis(200),
            Some(3),
        ),
        false,
    )?;

    println!("Eased fade up and back down...");
    sequencer.play(
        Sequence::once(vec![
            IntensityStep::new(1.0)
                .fade(Duration::from_millis(600))
                .frame_rate(10)
                .easing(Easing::SineInOut),
            IntensityStep::new(0.0)
                .fade(Duration::from_millis(600))
                .frame_rate(10)
                .easing(Easing::QuadOut),
        ]),
        false,
    )?;

    println!("Pulsing in the background, preempted after a second...");
    sequencer.play(
        Sequence::pulse(
            0.8,
            0.2,
            (Duration::from_millis(100), Duration::from_millis(100)),
            (Duration::from_millis(300), Duration::from_millis(300)),
            None,
        ),
        true,
    )?;
    thread::sleep(Duration::from_secs(1));
    sequencer.play(Sequence::off(), false)?;

    println!("Final intensity: {:.2}", sequencer.device().value());
    Ok(())
}
