//! Wakes the display when motion is seen while it is off.

use crate::error::PioskError;
use crate::signal::Signal;

use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a single sensor wait lasts before cancellation is re-checked.
const SENSOR_SLICE: Duration = Duration::from_millis(250);

/// Receives display power transitions on behalf of a motion monitor.
pub trait MotionTrigger: Send + Sync {
    /// The display went off: start watching after the wake delay.
    fn arm(&self);

    /// The display came back on: abandon any pending watch.
    fn disarm(&self);
}

/// A passive-infrared motion sensor.
pub trait MotionSensor: Send + Sync {
    /// Block for up to `timeout` waiting for motion. Returns `true` on motion.
    fn wait_for_active(&self, timeout: Duration) -> Result<bool, PioskError>;
}

/// The wake and cancel signals shared between a [`MotionMonitor`] and the
/// [`BacklightController`](crate::BacklightController) that arms it.
#[derive(Debug, Clone, Default)]
pub struct MotionSignals {
    wake: Signal,
    cancel: Signal,
}

impl MotionSignals {
    /// Fresh, unarmed signals.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MotionTrigger for MotionSignals {
    fn arm(&self) {
        self.cancel.clear();
        self.wake.set();
    }

    fn disarm(&self) {
        self.wake.clear();
        self.cancel.set();
    }
}

/// Handle to the motion monitor worker.
pub struct MotionMonitor {
    signals: MotionSignals,
    shutdown: Signal,
    handle: JoinHandle<()>,
}

impl MotionMonitor {
    /// Start the worker.
    ///
    /// Each time `signals` is armed the worker waits `wake_delay`, then
    /// watches `sensor` until motion or disarm. On motion it calls `on_motion`.
    pub fn spawn(
        signals: MotionSignals,
        sensor: Arc<dyn MotionSensor>,
        wake_delay: Duration,
        on_motion: impl Fn() + Send + 'static,
    ) -> Result<Self, PioskError> {
        let shutdown = Signal::new();
        let handle = {
            let signals = signals.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("motion".into())
                .spawn(move || run(&signals, &*sensor, wake_delay, &shutdown, on_motion))
                .map_err(|source| PioskError::Spawn {
                    program: "motion worker".into(),
                    source,
                })?
        };
        Ok(Self {
            signals,
            shutdown,
            handle,
        })
    }

    /// Ask the worker to exit.
    pub fn stop(&self) {
        self.shutdown.set();
        self.signals.cancel.set();
        self.signals.wake.set();
    }

    /// Wait for the worker to exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("motion worker panicked");
        }
    }
}

fn run(
    signals: &MotionSignals,
    sensor: &dyn MotionSensor,
    wake_delay: Duration,
    shutdown: &Signal,
    on_motion: impl Fn(),
) {
    loop {
        signals.wake.wait();
        if shutdown.is_set() {
            return;
        }
        signals.wake.clear();

        debug!("display off, watching for motion in {:?}", wake_delay);
        if signals.cancel.wait_timeout(wake_delay) {
            debug!("motion watch cancelled before it started");
            continue;
        }

        if watch(signals, sensor) {
            info!("motion detected");
            on_motion();
        }
    }
}

fn watch(signals: &MotionSignals, sensor: &dyn MotionSensor) -> bool {
    while !signals.cancel.is_set() {
        match sensor.wait_for_active(SENSOR_SLICE) {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                warn!("motion sensor read failed: {e}");
                if signals.cancel.wait_timeout(SENSOR_SLICE) {
                    break;
                }
            }
        }
    }
    debug!("motion watch cancelled");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMotionSensor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monitor(
        sensor: Arc<MockMotionSensor>,
        delay: Duration,
    ) -> (MotionMonitor, MotionSignals, Arc<AtomicUsize>) {
        let signals = MotionSignals::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let monitor = MotionMonitor::spawn(signals.clone(), sensor, delay, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (monitor, signals, hits)
    }

    #[test]
    fn test_motion_after_arm_fires_once() {
        let sensor = Arc::new(MockMotionSensor::new());
        let (monitor, signals, hits) = monitor(sensor.clone(), Duration::from_millis(20));

        signals.arm();
        thread::sleep(Duration::from_millis(50));
        sensor.trigger();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        monitor.stop();
        monitor.join();
    }

    #[test]
    fn test_no_watch_without_arm() {
        let sensor = Arc::new(MockMotionSensor::new());
        sensor.trigger();
        let (monitor, _signals, hits) = monitor(sensor, Duration::ZERO);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        monitor.stop();
        monitor.join();
    }

    #[test]
    fn test_disarm_during_wake_delay_cancels() {
        let sensor = Arc::new(MockMotionSensor::new());
        sensor.trigger();
        let (monitor, signals, hits) = monitor(sensor, Duration::from_millis(100));

        signals.arm();
        thread::sleep(Duration::from_millis(20));
        signals.disarm();
        thread::sleep(Duration::from_millis(150));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        monitor.stop();
        monitor.join();
    }

    #[test]
    fn test_disarm_during_sensor_wait_cancels() {
        let sensor = Arc::new(MockMotionSensor::new());
        let (monitor, signals, hits) = monitor(sensor.clone(), Duration::ZERO);

        signals.arm();
        thread::sleep(Duration::from_millis(30));
        signals.disarm();
        // Let the current sensor slice run out before motion appears.
        thread::sleep(SENSOR_SLICE + Duration::from_millis(50));
        sensor.trigger();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        monitor.stop();
        monitor.join();
    }
}
