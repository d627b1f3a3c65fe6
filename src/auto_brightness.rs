//! Ambient-light driven brightness.

use crate::backlight::{BacklightController, BacklightDevice};
use crate::error::PioskError;
use crate::signal::Signal;
use crate::state::PowerState;

use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// An ambient light sensor.
pub trait LightSensor: Send + Sync {
    /// Current reading in `[0, 1]`, darkest to brightest.
    fn reading(&self) -> Result<f64, PioskError>;
}

/// Mapping from sensor readings to backlight levels.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoBrightnessSettings {
    /// Level for a reading of 0.
    pub minimum: u8,
    /// Level for a reading of 1.
    pub maximum: u8,
    /// Number of evenly spaced levels between `minimum` and `maximum`.
    pub step_count: u32,
    /// Time between sensor samples.
    pub poll_interval: Duration,
}

impl Default for AutoBrightnessSettings {
    fn default() -> Self {
        Self {
            minimum: 15,
            maximum: 255,
            step_count: 8,
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl AutoBrightnessSettings {
    /// Backlight level for `reading`, snapped to the nearest step.
    pub fn target(&self, reading: f64) -> i32 {
        let range = f64::from(self.maximum.saturating_sub(self.minimum));
        let step = range / f64::from(self.step_count.max(1));
        let snapped = if step > 0.0 {
            step * (range * reading.clamp(0.0, 1.0) / step).round()
        } else {
            0.0
        };
        (snapped + f64::from(self.minimum)).round() as i32
    }
}

/// Handle to the auto-brightness worker.
pub struct AutoBrightness<B> {
    backlight: Arc<BacklightController<B>>,
    stop: Signal,
    handle: JoinHandle<()>,
}

impl<B: BacklightDevice + 'static> AutoBrightness<B> {
    /// Start polling `sensor` and driving `backlight`.
    pub fn spawn(
        settings: AutoBrightnessSettings,
        sensor: Arc<dyn LightSensor>,
        backlight: Arc<BacklightController<B>>,
    ) -> Result<Self, PioskError> {
        let stop = Signal::new();
        let handle = {
            let backlight = Arc::clone(&backlight);
            let stop = stop.clone();
            thread::Builder::new()
                .name("auto-brightness".into())
                .spawn(move || run(&settings, &*sensor, &backlight, &stop))
                .map_err(|source| PioskError::Spawn {
                    program: "auto-brightness worker".into(),
                    source,
                })?
        };
        info!("auto brightness started");
        Ok(Self {
            backlight,
            stop,
            handle,
        })
    }

    /// End the worker, waking it from any wait.
    pub fn stop(&self) {
        self.stop.set();
        self.backlight.display().interrupt();
    }

    /// Wait for the worker to exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("auto-brightness worker panicked");
        }
    }
}

fn run<B: BacklightDevice>(
    settings: &AutoBrightnessSettings,
    sensor: &dyn LightSensor,
    backlight: &BacklightController<B>,
    stop: &Signal,
) {
    let mut last_reading = None;
    loop {
        if backlight.power() == PowerState::Off {
            debug!("display off, pausing auto brightness");
            if !backlight.display().wait_for(PowerState::On, stop) {
                break;
            }
        }

        match sensor.reading() {
            Ok(reading) if last_reading == Some(reading) => {
                trace!("light reading unchanged at {reading:.3}");
            }
            Ok(reading) => {
                last_reading = Some(reading);
                let target = settings.target(reading);
                debug!("light reading {:.3} -> brightness {}", reading, target);
                if let Err(e) = backlight.set_brightness(target) {
                    warn!("failed to apply auto brightness: {e}");
                }
            }
            Err(e) => warn!("light sensor read failed: {e}"),
        }

        if stop.wait_timeout(settings.poll_interval) {
            break;
        }
    }
    info!("auto brightness stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlight::BacklightSettings;
    use crate::mock::{MockBacklight, MockLightSensor, MockMotionTrigger};
    use crate::state::DisplayState;
    use std::time::Instant;

    fn backlight(power: PowerState) -> Arc<BacklightController<MockBacklight>> {
        Arc::new(BacklightController::new(
            MockBacklight::new(255),
            Arc::new(DisplayState::new(power)),
            Arc::new(MockMotionTrigger::new()),
            BacklightSettings {
                smooth: false,
                ..Default::default()
            },
        ))
    }

    fn settings() -> AutoBrightnessSettings {
        AutoBrightnessSettings {
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_target_snaps_to_steps() {
        let settings = AutoBrightnessSettings::default();
        assert_eq!(settings.target(0.0), 15);
        assert_eq!(settings.target(0.5), 135);
        assert_eq!(settings.target(0.52), 135);
        assert_eq!(settings.target(0.57), 165);
        assert_eq!(settings.target(1.0), 255);
        assert_eq!(settings.target(3.0), 255);
    }

    #[test]
    fn test_target_with_empty_range() {
        let settings = AutoBrightnessSettings {
            minimum: 100,
            maximum: 100,
            ..Default::default()
        };
        assert_eq!(settings.target(0.7), 100);
    }

    #[test]
    fn test_worker_follows_sensor_and_skips_repeats() {
        let sensor = Arc::new(MockLightSensor::new(0.5));
        let backlight = backlight(PowerState::On);
        let worker = AutoBrightness::spawn(settings(), sensor.clone(), backlight.clone()).unwrap();

        thread::sleep(Duration::from_millis(50));
        sensor.set(1.0);
        thread::sleep(Duration::from_millis(50));
        worker.stop();
        worker.join();

        assert_eq!(backlight.device().brightness_writes(), vec![135, 255]);
        assert!(sensor.reads() > 2);
    }

    #[test]
    fn test_worker_pauses_while_display_off() {
        let sensor = Arc::new(MockLightSensor::new(0.0));
        let backlight = backlight(PowerState::Off);
        let worker = AutoBrightness::spawn(settings(), sensor.clone(), backlight.clone()).unwrap();

        thread::sleep(Duration::from_millis(40));
        assert_eq!(sensor.reads(), 0);

        backlight.set_power(PowerState::On).unwrap();
        thread::sleep(Duration::from_millis(40));
        assert_eq!(backlight.device().brightness_writes(), vec![15]);

        worker.stop();
        worker.join();
    }

    #[test]
    fn test_stop_while_paused_exits_promptly() {
        let sensor = Arc::new(MockLightSensor::new(0.0));
        let worker = AutoBrightness::spawn(settings(), sensor, backlight(PowerState::Off)).unwrap();

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        worker.stop();
        worker.join();
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
