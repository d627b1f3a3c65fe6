//! Polled sysfs inputs: button, motion sensor, and ambient light.

use crate::auto_brightness::LightSensor;
use crate::error::PioskError;
use crate::motion::MotionSensor;
use crate::signal::Signal;
use crate::sysfs;

use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Where the kernel exposes exported GPIO lines.
pub const DEFAULT_GPIO_ROOT: &str = "/sys/class/gpio";

/// How often [`GpioMotionSensor`] samples its line.
const MOTION_POLL: Duration = Duration::from_millis(50);

/// A single on/off input line.
pub trait DigitalInput: Send + Sync {
    /// Whether the line is currently active.
    fn is_active(&self) -> Result<bool, PioskError>;
}

/// A GPIO line read through `/sys/class/gpio/gpioN/value`.
#[derive(Debug, Clone)]
pub struct GpioInput {
    value: PathBuf,
    active_low: bool,
}

impl GpioInput {
    /// Export `line` under `root` if needed and configure it as an input.
    ///
    /// With `active_low` set a `0` reading counts as active, as for a button
    /// wired against a pull-up.
    pub fn open(root: &Path, line: u32, active_low: bool) -> Result<Self, PioskError> {
        let dir = root.join(format!("gpio{line}"));
        if !dir.exists() {
            debug!("exporting gpio {}", line);
            sysfs::write(&root.join("export"), line)?;
        }
        sysfs::write(&dir.join("direction"), "in")?;
        Ok(Self {
            value: dir.join("value"),
            active_low,
        })
    }
}

impl DigitalInput for GpioInput {
    fn is_active(&self) -> Result<bool, PioskError> {
        let high = sysfs::read::<u8>(&self.value)? != 0;
        Ok(high != self.active_low)
    }
}

/// A PIR sensor on a digital input, polled while waiting.
pub struct GpioMotionSensor<I> {
    input: I,
}

impl<I: DigitalInput> GpioMotionSensor<I> {
    /// Watch `input` for motion.
    pub fn new(input: I) -> Self {
        Self { input }
    }
}

impl<I: DigitalInput> MotionSensor for GpioMotionSensor<I> {
    fn wait_for_active(&self, timeout: Duration) -> Result<bool, PioskError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.input.is_active()? {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            thread::sleep(MOTION_POLL.min(deadline - now));
        }
    }
}

/// An IIO illuminance channel, normalized against a full-scale raw value.
#[derive(Debug, Clone)]
pub struct IioLightSensor {
    path: PathBuf,
    full_scale: f64,
}

impl IioLightSensor {
    /// Read `path`, treating `full_scale` and above as the brightest reading.
    pub fn new(path: impl Into<PathBuf>, full_scale: f64) -> Self {
        Self {
            path: path.into(),
            full_scale,
        }
    }
}

impl LightSensor for IioLightSensor {
    fn reading(&self) -> Result<f64, PioskError> {
        let raw: f64 = sysfs::read(&self.path)?;
        if self.full_scale <= 0.0 {
            return Ok(0.0);
        }
        Ok((raw / self.full_scale).clamp(0.0, 1.0))
    }
}

/// Callbacks invoked by [`ButtonPoller`] on the poller's thread.
pub struct ButtonHandlers {
    /// The button went down.
    pub pressed: Box<dyn Fn() + Send>,
    /// The button has been down for the given time, past the hold threshold.
    pub held: Box<dyn Fn(Duration) + Send>,
    /// The button came up.
    pub released: Box<dyn Fn() + Send>,
}

/// Turns a polled input into press, hold, and release callbacks.
pub struct ButtonPoller {
    stop: Signal,
    handle: JoinHandle<()>,
}

impl ButtonPoller {
    /// Poll `input` every `interval`, reporting a hold once it has been down
    /// for `hold_after`.
    pub fn spawn(
        input: Arc<dyn DigitalInput>,
        interval: Duration,
        hold_after: Duration,
        handlers: ButtonHandlers,
    ) -> Result<Self, PioskError> {
        let stop = Signal::new();
        let handle = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("button".into())
                .spawn(move || poll(&*input, interval, hold_after, &handlers, &stop))
                .map_err(|source| PioskError::Spawn {
                    program: "button poller".into(),
                    source,
                })?
        };
        Ok(Self { stop, handle })
    }

    /// Ask the poller to exit.
    pub fn stop(&self) {
        self.stop.set();
    }

    /// Wait for the poller to exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("button poller panicked");
        }
    }
}

fn poll(
    input: &dyn DigitalInput,
    interval: Duration,
    hold_after: Duration,
    handlers: &ButtonHandlers,
    stop: &Signal,
) {
    let mut pressed_at: Option<Instant> = None;
    let mut held = false;
    let mut failing = false;

    loop {
        match input.is_active() {
            Ok(active) => {
                failing = false;
                match (active, pressed_at) {
                    (true, None) => {
                        pressed_at = Some(Instant::now());
                        held = false;
                        (handlers.pressed)();
                    }
                    (true, Some(since)) if !held && since.elapsed() >= hold_after => {
                        held = true;
                        (handlers.held)(since.elapsed());
                    }
                    (false, Some(_)) => {
                        pressed_at = None;
                        (handlers.released)();
                    }
                    _ => {}
                }
            }
            Err(e) if !failing => {
                failing = true;
                warn!("button read failed: {e}");
            }
            Err(_) => {}
        }

        if stop.wait_timeout(interval) {
            return;
        }
    }
}
