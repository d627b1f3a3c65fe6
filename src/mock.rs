//! Mock devices for testing.
//!
//! These allow testing the coordinator and its workers without a Raspberry Pi.
//! Each mock records what was written to it.

use crate::auto_brightness::LightSensor;
use crate::backlight::BacklightDevice;
use crate::commands::ExternalCommands;
use crate::error::PioskError;
use crate::gpio::DigitalInput;
use crate::indicator::IndicatorDevice;
use crate::motion::{MotionSensor, MotionTrigger};
use crate::signal::Signal;
use crate::state::PowerState;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

fn write_failure() -> PioskError {
    PioskError::io("mock", std::io::Error::other("mock write failure"))
}

/// An indicator that remembers every value written to it.
///
/// # Example
///
/// ```
/// use piosk_core::{MockIndicator, Sequence, Sequencer};
///
/// let sequencer = Sequencer::new(MockIndicator::new());
/// sequencer.play(Sequence::solid(0.5), false).unwrap();
/// assert_eq!(sequencer.device().writes(), vec![0.5]);
/// ```
#[derive(Debug, Default)]
pub struct MockIndicator {
    writes: Mutex<Vec<f64>>,
}

impl MockIndicator {
    /// An indicator at 0 with no writes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value written so far, oldest first.
    pub fn writes(&self) -> Vec<f64> {
        self.writes.lock().unwrap().clone()
    }
}

impl IndicatorDevice for MockIndicator {
    fn value(&self) -> f64 {
        self.writes.lock().unwrap().last().copied().unwrap_or(0.0)
    }

    fn set_value(&self, value: f64) -> Result<(), PioskError> {
        self.writes.lock().unwrap().push(value);
        Ok(())
    }
}

#[derive(Debug)]
struct BacklightRegisters {
    brightness: u8,
    power: PowerState,
    brightness_writes: Vec<u8>,
    power_writes: Vec<PowerState>,
}

/// A backlight holding its registers in memory.
#[derive(Debug)]
pub struct MockBacklight {
    registers: Mutex<BacklightRegisters>,
    fail: AtomicBool,
}

impl MockBacklight {
    /// A powered-on backlight at `brightness`.
    pub fn new(brightness: u8) -> Self {
        Self {
            registers: Mutex::new(BacklightRegisters {
                brightness,
                power: PowerState::On,
                brightness_writes: Vec::new(),
                power_writes: Vec::new(),
            }),
            fail: AtomicBool::new(false),
        }
    }

    /// Make every later write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every brightness written, oldest first.
    pub fn brightness_writes(&self) -> Vec<u8> {
        self.registers.lock().unwrap().brightness_writes.clone()
    }

    /// Every power state written, oldest first.
    pub fn power_writes(&self) -> Vec<PowerState> {
        self.registers.lock().unwrap().power_writes.clone()
    }
}

impl BacklightDevice for MockBacklight {
    fn brightness(&self) -> Result<u8, PioskError> {
        Ok(self.registers.lock().unwrap().brightness)
    }

    fn set_brightness(&self, level: u8) -> Result<(), PioskError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(write_failure());
        }
        let mut registers = self.registers.lock().unwrap();
        registers.brightness = level;
        registers.brightness_writes.push(level);
        Ok(())
    }

    fn power(&self) -> Result<PowerState, PioskError> {
        Ok(self.registers.lock().unwrap().power)
    }

    fn set_power(&self, state: PowerState) -> Result<(), PioskError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(write_failure());
        }
        let mut registers = self.registers.lock().unwrap();
        registers.power = state;
        registers.power_writes.push(state);
        Ok(())
    }
}

/// Counts arm and disarm calls.
#[derive(Debug, Default)]
pub struct MockMotionTrigger {
    arms: AtomicUsize,
    disarms: AtomicUsize,
}

impl MockMotionTrigger {
    /// No calls yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of [`MotionTrigger::arm`] calls.
    pub fn arms(&self) -> usize {
        self.arms.load(Ordering::SeqCst)
    }

    /// Number of [`MotionTrigger::disarm`] calls.
    pub fn disarms(&self) -> usize {
        self.disarms.load(Ordering::SeqCst)
    }
}

impl MotionTrigger for MockMotionTrigger {
    fn arm(&self) {
        self.arms.fetch_add(1, Ordering::SeqCst);
    }

    fn disarm(&self) {
        self.disarms.fetch_add(1, Ordering::SeqCst);
    }
}

/// A motion sensor that reports motion once [`MockMotionSensor::trigger`]ed.
#[derive(Debug, Default)]
pub struct MockMotionSensor {
    motion: Signal,
}

impl MockMotionSensor {
    /// No motion yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report motion from now on.
    pub fn trigger(&self) {
        self.motion.set();
    }
}

impl MotionSensor for MockMotionSensor {
    fn wait_for_active(&self, timeout: Duration) -> Result<bool, PioskError> {
        Ok(self.motion.wait_timeout(timeout))
    }
}

/// A light sensor with a settable reading.
#[derive(Debug)]
pub struct MockLightSensor {
    reading: Mutex<f64>,
    reads: AtomicUsize,
}

impl MockLightSensor {
    /// Start at `reading`.
    pub fn new(reading: f64) -> Self {
        Self {
            reading: Mutex::new(reading),
            reads: AtomicUsize::new(0),
        }
    }

    /// Change the reading.
    pub fn set(&self, reading: f64) {
        *self.reading.lock().unwrap() = reading;
    }

    /// How many times the sensor was sampled.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl LightSensor for MockLightSensor {
    fn reading(&self) -> Result<f64, PioskError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(*self.reading.lock().unwrap())
    }
}

/// A settable digital input.
#[derive(Debug, Default)]
pub struct MockInput {
    active: AtomicBool,
}

impl MockInput {
    /// An inactive input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive the input.
    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }
}

impl DigitalInput for MockInput {
    fn is_active(&self) -> Result<bool, PioskError> {
        Ok(self.active.load(Ordering::SeqCst))
    }
}

/// Counts launched commands instead of running them.
#[derive(Debug, Default)]
pub struct MockCommands {
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    shutdowns: AtomicUsize,
    fail: AtomicBool,
}

impl MockCommands {
    /// Nothing launched yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later launch fail (or succeed again).
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Successful screensaver activations.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Successful screensaver deactivations.
    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    /// Successful shutdown launches.
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn launch(&self, counter: &AtomicUsize) -> Result<(), PioskError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PioskError::Spawn {
                program: "mock".into(),
                source: std::io::Error::other("mock launch failure"),
            });
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ExternalCommands for MockCommands {
    fn activate_screensaver(&self) -> Result<(), PioskError> {
        self.launch(&self.activations)
    }

    fn deactivate_screensaver(&self) -> Result<(), PioskError> {
        self.launch(&self.deactivations)
    }

    fn shutdown(&self) -> Result<(), PioskError> {
        self.launch(&self.shutdowns)
    }
}
