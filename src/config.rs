//! TOML configuration.
//!
//! Every table and key has a default, so an empty file is a valid config.

use crate::auto_brightness::AutoBrightnessSettings;
use crate::backlight::{BacklightSettings, DEFAULT_BACKLIGHT_ROOT};
use crate::coordinator::CoordinatorSettings;
use crate::easing::Easing;
use crate::error::PioskError;
use crate::gpio::DEFAULT_GPIO_ROOT;

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `[led]`
    pub led: LedConfig,
    /// `[button]`
    pub button: ButtonConfig,
    /// `[brightness]`
    pub brightness: BrightnessConfig,
    /// `[motion]`
    pub motion: MotionConfig,
    /// `[screensaver]`
    pub screensaver: ScreensaverConfig,
    /// `[shutdown]`
    pub shutdown: ShutdownConfig,
}

/// `[led]`: the indicator light.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedConfig {
    /// Intensity for "on".
    pub max: f64,
    /// Intensity the screensaver fade dims to.
    pub min: f64,
    /// Length of the screensaver dimming fade.
    pub fade_seconds: f64,
    /// PWM chip directory.
    pub pwm_chip: PathBuf,
    /// PWM channel on the chip.
    pub pwm_channel: u32,
    /// PWM period.
    pub period_ns: u64,
}

impl Default for LedConfig {
    fn default() -> Self {
        Self {
            max: 1.0,
            min: 0.1,
            fade_seconds: 1.0,
            pwm_chip: PathBuf::from("/sys/class/pwm/pwmchip0"),
            pwm_channel: 0,
            period_ns: 1_000_000,
        }
    }
}

/// `[button]`: the physical button.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ButtonConfig {
    /// Hold time before the shutdown strobe starts.
    pub min_hold_seconds: f64,
    /// Hold time that triggers the shutdown command.
    pub max_hold_seconds: f64,
    /// GPIO line.
    pub gpio: u32,
    /// Whether a low line means pressed.
    pub active_low: bool,
    /// Poll interval.
    pub poll_ms: u64,
    /// GPIO sysfs root.
    pub gpio_root: PathBuf,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            min_hold_seconds: 1.0,
            max_hold_seconds: 5.0,
            gpio: 17,
            active_low: true,
            poll_ms: 10,
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),
        }
    }
}

/// `[brightness]`: the backlight.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrightnessConfig {
    /// Start the auto-brightness worker.
    pub auto_enabled: bool,
    /// Level in the dark.
    pub auto_minimum: u8,
    /// Level in full light.
    pub auto_maximum: u8,
    /// Distinct levels between minimum and maximum.
    pub auto_step_count: u32,
    /// Sensor poll interval.
    pub poll_seconds: f64,
    /// Levels cycled by button taps.
    pub manual_steps: Vec<u8>,
    /// Animate brightness changes.
    pub smooth: bool,
    /// Length of an animated change.
    pub smooth_duration_seconds: f64,
    /// Frames per second of an animated change.
    pub smooth_fps: u32,
    /// Curve of an animated change.
    pub smooth_easing: Easing,
    /// Ambient light sensor file.
    pub sensor_path: PathBuf,
    /// Raw sensor value treated as full light.
    pub sensor_max: f64,
    /// Backlight sysfs root.
    pub backlight_root: PathBuf,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            auto_enabled: false,
            auto_minimum: 15,
            auto_maximum: 255,
            auto_step_count: 8,
            poll_seconds: 5.0,
            manual_steps: vec![255, 191, 127, 63, 15],
            smooth: true,
            smooth_duration_seconds: 1.0,
            smooth_fps: 30,
            smooth_easing: Easing::Linear,
            sensor_path: PathBuf::from("/sys/bus/iio/devices/iio:device0/in_illuminance_raw"),
            sensor_max: 1000.0,
            backlight_root: PathBuf::from(DEFAULT_BACKLIGHT_ROOT),
        }
    }
}

/// `[motion]`: the PIR sensor.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionConfig {
    /// GPIO line.
    pub gpio: u32,
    /// Whether a low line means motion.
    pub active_low: bool,
    /// Delay after the display turns off before watching for motion.
    pub wake_delay_seconds: f64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            gpio: 4,
            active_low: false,
            wake_delay_seconds: 15.0,
        }
    }
}

/// `[screensaver]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreensaverConfig {
    /// X display the screensaver runs on.
    pub display: String,
    /// Delay between activation and display power-off.
    pub settle_seconds: f64,
}

impl Default for ScreensaverConfig {
    fn default() -> Self {
        Self {
            display: ":0".into(),
            settle_seconds: 1.5,
        }
    }
}

/// `[shutdown]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Shell command run after a full-length hold.
    pub command: String,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            command: "sudo shutdown -h now".into(),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

impl Config {
    /// Read and validate `path`.
    pub fn load(path: &Path) -> Result<Self, PioskError> {
        let text = fs::read_to_string(path).map_err(|e| PioskError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, PioskError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the components cannot work with.
    pub fn validate(&self) -> Result<(), PioskError> {
        let invalid = |msg: &str| Err(PioskError::InvalidConfig(msg.into()));
        let b = &self.brightness;
        if b.manual_steps.is_empty() {
            return invalid("brightness.manual_steps must not be empty");
        }
        if b.auto_step_count == 0 {
            return invalid("brightness.auto_step_count must be positive");
        }
        if b.smooth_fps == 0 {
            return invalid("brightness.smooth_fps must be positive");
        }
        if b.auto_minimum > b.auto_maximum {
            return invalid("brightness.auto_minimum exceeds auto_maximum");
        }
        if self.button.min_hold_seconds > self.button.max_hold_seconds {
            return invalid("button.min_hold_seconds exceeds max_hold_seconds");
        }
        if !(0.0..=1.0).contains(&self.led.min) || !(0.0..=1.0).contains(&self.led.max) {
            return invalid("led levels must be within 0.0-1.0");
        }
        Ok(())
    }

    /// Settings for the [`DisplayCoordinator`](crate::DisplayCoordinator).
    pub fn coordinator(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            led_max: self.led.max,
            led_min: self.led.min,
            led_fade: seconds(self.led.fade_seconds),
            min_hold: seconds(self.button.min_hold_seconds),
            max_hold: seconds(self.button.max_hold_seconds),
            settle_delay: seconds(self.screensaver.settle_seconds),
        }
    }

    /// Settings for the [`BacklightController`](crate::BacklightController).
    pub fn backlight(&self) -> BacklightSettings {
        BacklightSettings {
            manual_steps: self.brightness.manual_steps.clone(),
            smooth: self.brightness.smooth,
            smooth_duration: seconds(self.brightness.smooth_duration_seconds),
            smooth_fps: self.brightness.smooth_fps,
            easing: self.brightness.smooth_easing,
        }
    }

    /// Settings for the [`AutoBrightness`](crate::AutoBrightness) worker.
    pub fn auto_brightness(&self) -> AutoBrightnessSettings {
        AutoBrightnessSettings {
            minimum: self.brightness.auto_minimum,
            maximum: self.brightness.auto_maximum,
            step_count: self.brightness.auto_step_count,
            poll_interval: seconds(self.brightness.poll_seconds),
        }
    }

    /// Delay before the motion monitor starts watching.
    pub fn motion_wake_delay(&self) -> Duration {
        seconds(self.motion.wake_delay_seconds)
    }
}
