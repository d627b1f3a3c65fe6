//! Indicator light and display power coordination for Raspberry Pi kiosks.
//!
//! This crate keeps a kiosk's indicator LED, backlight power and brightness,
//! and screensaver in step with a physical button, a motion sensor, and an
//! optional ambient light sensor.
//!
//! # Components
//!
//! - [`Sequencer`] plays animated, preemptible [`Sequence`]s on an [`IndicatorDevice`].
//! - [`BacklightController`] owns the backlight registers behind a single lock.
//! - [`AutoBrightness`] follows a [`LightSensor`] while the display is on.
//! - [`MotionMonitor`] wakes the display on motion while it is off.
//! - [`DisplayCoordinator`] ties screensaver, button, and motion events together.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use piosk_core::{
//!     BacklightController, Config, DisplayCoordinator, DisplayState, MotionSignals,
//!     PowerState, Sequencer, ShellCommands, SysfsBacklight, SysfsPwmLed,
//! };
//!
//! fn main() -> Result<(), piosk_core::PioskError> {
//!     let config = Config::default();
//!     let led = SysfsPwmLed::open(&config.led.pwm_chip, config.led.pwm_channel, 1_000_000)?;
//!     let backlight = SysfsBacklight::detect(&config.brightness.backlight_root)?;
//!
//!     let backlight = Arc::new(BacklightController::new(
//!         backlight,
//!         Arc::new(DisplayState::new(PowerState::On)),
//!         Arc::new(MotionSignals::new()),
//!         config.backlight(),
//!     ));
//!     let coordinator = DisplayCoordinator::new(
//!         Arc::new(Sequencer::new(led)),
//!         backlight,
//!         Arc::new(ShellCommands::new(":0", "sudo shutdown -h now")),
//!         config.coordinator(),
//!     );
//!
//!     coordinator.handle_screensaver_line("BLANK Sat Oct 18 10:00:00 2026");
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Use the mock devices to test without hardware:
//!
//! ```
//! use std::sync::Arc;
//! use piosk_core::{
//!     BacklightController, BacklightSettings, DisplayState, MockBacklight,
//!     MockMotionTrigger, PowerState,
//! };
//!
//! let controller = BacklightController::new(
//!     MockBacklight::new(255),
//!     Arc::new(DisplayState::new(PowerState::On)),
//!     Arc::new(MockMotionTrigger::new()),
//!     BacklightSettings { smooth: false, ..Default::default() },
//! );
//! controller.set_brightness_immediate(128).unwrap();
//! controller.set_brightness_immediate(128).unwrap();
//! assert_eq!(controller.device().brightness_writes(), vec![128]);
//! ```

#![warn(missing_docs)]

mod auto_brightness;
mod backlight;
mod commands;
mod config;
mod coordinator;
mod easing;
mod error;
mod gpio;
mod indicator;
mod mock;
mod motion;
mod screensaver;
mod sequence;
mod sequencer;
mod signal;
mod state;
mod sysfs;

// Re-export public API
pub use auto_brightness::{AutoBrightness, AutoBrightnessSettings, LightSensor};
pub use backlight::{
    BACKLIGHT_CANDIDATES, BacklightController, BacklightDevice, BacklightSettings,
    DEFAULT_BACKLIGHT_ROOT, SysfsBacklight,
};
pub use commands::{ExternalCommands, ShellCommands};
pub use config::{
    BrightnessConfig, ButtonConfig, Config, LedConfig, MotionConfig, ScreensaverConfig,
    ShutdownConfig,
};
pub use coordinator::{ButtonRelease, CoordinatorSettings, DisplayCoordinator};
pub use easing::Easing;
pub use error::PioskError;
pub use gpio::{
    ButtonHandlers, ButtonPoller, DEFAULT_GPIO_ROOT, DigitalInput, GpioInput, GpioMotionSensor,
    IioLightSensor,
};
pub use indicator::{IndicatorDevice, SysfsPwmLed};
pub use mock::{
    MockBacklight, MockCommands, MockIndicator, MockInput, MockLightSensor, MockMotionSensor,
    MockMotionTrigger,
};
pub use motion::{MotionMonitor, MotionSensor, MotionSignals, MotionTrigger};
pub use screensaver::{ScreensaverWatcher, classify, read_lines};
pub use sequence::{DEFAULT_FRAME_RATE, IntensityStep, Sequence};
pub use sequencer::Sequencer;
pub use signal::Signal;
pub use state::{DisplayState, PowerState, ScreensaverState, ScreensaverStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// The full chain: screensaver blanks, motion wakes it, watcher reports unblank.
    #[test]
    fn test_motion_wakes_blanked_display() {
        let signals = MotionSignals::new();
        let commands = Arc::new(MockCommands::new());
        let backlight = Arc::new(BacklightController::new(
            MockBacklight::new(255),
            Arc::new(DisplayState::new(PowerState::On)),
            Arc::new(signals.clone()),
            BacklightSettings {
                smooth: false,
                ..Default::default()
            },
        ));
        let coordinator = Arc::new(DisplayCoordinator::new(
            Arc::new(Sequencer::new(MockIndicator::new())),
            backlight,
            commands.clone(),
            CoordinatorSettings {
                led_fade: Duration::from_millis(20),
                settle_delay: Duration::from_millis(10),
                ..Default::default()
            },
        ));

        let sensor = Arc::new(MockMotionSensor::new());
        let monitor = {
            let coordinator = Arc::clone(&coordinator);
            MotionMonitor::spawn(signals, sensor.clone(), Duration::from_millis(20), move || {
                coordinator.on_motion_detected()
            })
            .unwrap()
        };

        coordinator.handle_screensaver_line("BLANK");
        assert_eq!(coordinator.backlight().power(), PowerState::Off);

        thread::sleep(Duration::from_millis(50));
        sensor.trigger();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(commands.deactivations(), 1);

        coordinator.handle_screensaver_line("UNBLANK");
        assert_eq!(coordinator.backlight().power(), PowerState::On);
        assert_eq!(
            coordinator.backlight().device().power_writes(),
            vec![PowerState::Off, PowerState::On]
        );

        monitor.stop();
        monitor.join();
    }

    #[test]
    fn test_blanked_display_stays_off_without_motion() {
        let signals = MotionSignals::new();
        let commands = Arc::new(MockCommands::new());
        let coordinator = Arc::new(DisplayCoordinator::new(
            Arc::new(Sequencer::new(MockIndicator::new())),
            Arc::new(BacklightController::new(
                MockBacklight::new(255),
                Arc::new(DisplayState::new(PowerState::On)),
                Arc::new(signals.clone()),
                BacklightSettings::default(),
            )),
            commands.clone(),
            CoordinatorSettings {
                led_fade: Duration::from_millis(20),
                settle_delay: Duration::from_millis(10),
                ..Default::default()
            },
        ));

        let sensor = Arc::new(MockMotionSensor::new());
        let monitor = {
            let coordinator = Arc::clone(&coordinator);
            MotionMonitor::spawn(signals, sensor, Duration::from_millis(20), move || {
                coordinator.on_motion_detected()
            })
            .unwrap()
        };

        coordinator.handle_screensaver_line("BLANK");
        // Well past the wake delay, with the sensor being watched.
        thread::sleep(Duration::from_millis(150));

        assert_eq!(coordinator.backlight().power(), PowerState::Off);
        assert_eq!(commands.deactivations(), 0);
        assert_eq!(
            coordinator.backlight().device().power_writes(),
            vec![PowerState::Off]
        );

        monitor.stop();
        monitor.join();
    }

    #[test]
    fn test_motion_ignored_after_wake_without_sensor() {
        let commands = Arc::new(MockCommands::new());
        let coordinator = DisplayCoordinator::new(
            Arc::new(Sequencer::new(MockIndicator::new())),
            Arc::new(BacklightController::new(
                MockBacklight::new(255),
                Arc::new(DisplayState::new(PowerState::On)),
                Arc::new(MockMotionTrigger::new()),
                BacklightSettings::default(),
            )),
            commands.clone(),
            CoordinatorSettings::default(),
        );

        coordinator.on_motion_detected();
        assert_eq!(commands.deactivations(), 0);
        assert_eq!(coordinator.screensaver_status(), ScreensaverStatus::None);
    }
}
