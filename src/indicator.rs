//! Indicator light devices.

use crate::error::PioskError;
use crate::sysfs;

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// An output with a single intensity in `[0, 1]`.
///
/// The [`Sequencer`](crate::Sequencer) is the only writer of its device.
pub trait IndicatorDevice: Send + Sync {
    /// The last intensity written.
    fn value(&self) -> f64;

    /// Write a new intensity.
    fn set_value(&self, value: f64) -> Result<(), PioskError>;
}

/// A PWM channel exposed through `/sys/class/pwm`.
///
/// The channel is exported and enabled when opened; intensity maps linearly
/// onto the duty cycle.
#[derive(Debug)]
pub struct SysfsPwmLed {
    duty_cycle: PathBuf,
    period_ns: u64,
    value: Mutex<f64>,
}

impl SysfsPwmLed {
    /// Export (if needed) and enable `channel` of `chip` with the given period.
    pub fn open(chip: &Path, channel: u32, period_ns: u64) -> Result<Self, PioskError> {
        let dir = chip.join(format!("pwm{channel}"));
        if !dir.exists() {
            debug!("exporting pwm channel {} on {}", channel, chip.display());
            sysfs::write(&chip.join("export"), channel)?;
        }

        sysfs::write(&dir.join("period"), period_ns)?;
        let led = Self {
            duty_cycle: dir.join("duty_cycle"),
            period_ns,
            value: Mutex::new(0.0),
        };
        led.set_value(0.0)?;
        sysfs::write(&dir.join("enable"), 1)?;
        Ok(led)
    }
}

impl IndicatorDevice for SysfsPwmLed {
    fn value(&self) -> f64 {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_value(&self, value: f64) -> Result<(), PioskError> {
        let value = value.clamp(0.0, 1.0);
        let duty = (value * self.period_ns as f64).round() as u64;
        sysfs::write(&self.duty_cycle, duty)?;
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = value;
        Ok(())
    }
}
