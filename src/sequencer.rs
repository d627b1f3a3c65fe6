//! Plays indicator sequences on a dedicated, preemptible worker.

use crate::error::PioskError;
use crate::indicator::IndicatorDevice;
use crate::sequence::Sequence;
use crate::signal::Signal;

use log::{debug, error, trace, warn};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Values written back-to-back, separated by `delay`.
#[derive(Debug)]
struct Leg {
    delay: Duration,
    values: Vec<f64>,
}

struct Player {
    stop: Signal,
    handle: JoinHandle<()>,
}

/// Sets the wrapped signal when dropped, even if the worker panics.
struct SetOnDrop(Signal);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.set();
    }
}

/// Owns an [`IndicatorDevice`] and plays [`Sequence`]s on it.
///
/// At most one sequence writes to the device at a time: starting a new one
/// stops the in-flight worker and joins it before the first new write.
pub struct Sequencer<D> {
    device: Arc<D>,
    player: Mutex<Option<Player>>,
}

impl<D: IndicatorDevice + 'static> Sequencer<D> {
    /// Take ownership of `device`.
    pub fn new(device: D) -> Self {
        Self {
            device: Arc::new(device),
            player: Mutex::new(None),
        }
    }

    /// The driven device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Stop whatever is playing, then play `sequence`.
    ///
    /// With `background` unset the caller blocks until the sequence finishes
    /// or is preempted by another caller.
    pub fn play(&self, sequence: Sequence, background: bool) -> Result<(), PioskError> {
        let mut slot = self.player.lock().unwrap_or_else(|e| e.into_inner());
        Self::halt(slot.take());

        if sequence.repeat == Some(0) || sequence.steps.is_empty() {
            return Ok(());
        }

        let stop = Signal::new();
        let done = Signal::new();
        let handle = {
            let device = Arc::clone(&self.device);
            let stop = stop.clone();
            let done = SetOnDrop(done.clone());
            thread::Builder::new()
                .name("indicator".into())
                .spawn(move || {
                    let _done = done;
                    run(&*device, &sequence, &stop);
                })
                .map_err(|source| PioskError::Spawn {
                    program: "indicator worker".into(),
                    source,
                })?
        };
        *slot = Some(Player { stop, handle });
        drop(slot);

        if !background {
            done.wait();
        }
        Ok(())
    }

    /// Stop the in-flight sequence, if any, leaving the device at its last value.
    pub fn stop(&self) {
        let mut slot = self.player.lock().unwrap_or_else(|e| e.into_inner());
        Self::halt(slot.take());
    }

    /// Whether a sequence worker is still running.
    pub fn is_playing(&self) -> bool {
        self.player
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|player| !player.handle.is_finished())
    }

    fn halt(player: Option<Player>) {
        if let Some(player) = player {
            player.stop.set();
            if player.handle.join().is_err() {
                error!("indicator worker panicked");
            }
        }
    }
}

impl<D> Drop for Sequencer<D> {
    fn drop(&mut self) {
        if let Some(player) = self.player.get_mut().ok().and_then(Option::take) {
            player.stop.set();
            let _ = player.handle.join();
        }
    }
}

fn plan(sequence: &Sequence, start: f64) -> Vec<Leg> {
    let mut previous = sequence.initial_value.unwrap_or(start);
    let mut legs = Vec::with_capacity(sequence.steps.len() * 2);
    for step in &sequence.steps {
        let frames = step.fade_frames(previous);
        if !frames.is_empty() {
            legs.push(Leg {
                delay: step.frame_interval(),
                values: frames,
            });
        }
        legs.push(Leg {
            delay: step.hold,
            values: vec![step.target],
        });
        previous = step.target;
    }
    legs
}

fn run<D: IndicatorDevice + ?Sized>(device: &D, sequence: &Sequence, stop: &Signal) {
    let legs = plan(sequence, device.value());
    let waits = legs.iter().any(|leg| !leg.delay.is_zero());
    debug!(
        "playing {} steps, repeat {:?}",
        sequence.steps.len(),
        sequence.repeat
    );

    let mut pass = 0;
    while sequence.repeat.is_none_or(|n| pass < n) {
        for leg in &legs {
            for &value in &leg.values {
                trace!("indicator <- {value:.3}");
                if let Err(e) = device.set_value(value) {
                    warn!("indicator write failed: {e}");
                }
                if stop.wait_timeout(leg.delay) {
                    debug!("sequence stopped");
                    return;
                }
            }
        }
        pass += 1;

        if sequence.repeat.is_none() && !waits {
            // Nothing left to animate; park until superseded.
            stop.wait();
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockIndicator;
    use crate::sequence::IntensityStep;
    use std::time::Instant;

    fn sequencer() -> Sequencer<MockIndicator> {
        Sequencer::new(MockIndicator::new())
    }

    #[test]
    fn test_finite_sequence_ends_on_last_target() {
        let seq = sequencer();
        let steps = vec![
            IntensityStep::new(1.0).fade(Duration::from_millis(80)),
            IntensityStep::new(0.3).hold(Duration::from_millis(10)),
        ];
        seq.play(Sequence::once(steps).repeat(Some(2)), false).unwrap();

        assert!(!seq.is_playing());
        assert_eq!(seq.device().value(), 0.3);
        assert_eq!(seq.device().writes().last(), Some(&0.3));
    }

    #[test]
    fn test_fade_writes_each_frame_then_target() {
        let seq = sequencer();
        let step = IntensityStep::new(1.0)
            .fade(Duration::from_millis(200))
            .frame_rate(25);
        seq.play(Sequence::once(vec![step]).starting_at(0.0), false)
            .unwrap();

        let writes = seq.device().writes();
        assert_eq!(writes.len(), 6);
        assert_eq!(writes[0], 0.0);
        assert_eq!(writes[5], 1.0);
    }

    #[test]
    fn test_zero_repeat_is_noop() {
        let seq = sequencer();
        seq.play(Sequence::solid(1.0).repeat(Some(0)), false).unwrap();
        assert!(seq.device().writes().is_empty());
    }

    #[test]
    fn test_unchanged_target_still_holds() {
        let seq = sequencer();
        seq.device().set_value(0.5).unwrap();
        let step = IntensityStep::new(0.5)
            .fade(Duration::from_secs(1))
            .hold(Duration::from_millis(60));

        let start = Instant::now();
        seq.play(Sequence::once(vec![step]), false).unwrap();

        assert!(start.elapsed() >= Duration::from_millis(60));
        assert!(start.elapsed() < Duration::from_millis(900));
        assert_eq!(seq.device().writes(), vec![0.5, 0.5]);
    }

    #[test]
    fn test_indefinite_sequence_runs_until_stopped() {
        let seq = sequencer();
        let blink = Sequence::blink(1.0, Duration::from_millis(5), Duration::from_millis(5), None);
        seq.play(blink, true).unwrap();

        std::thread::sleep(Duration::from_millis(60));
        assert!(seq.is_playing());
        seq.stop();
        assert!(!seq.is_playing());

        let count = seq.device().writes().len();
        assert!(count > 2);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(seq.device().writes().len(), count);
    }

    #[test]
    fn test_indefinite_sequence_without_waits_parks() {
        let seq = sequencer();
        seq.play(Sequence::forever(vec![IntensityStep::new(1.0)]), true)
            .unwrap();

        std::thread::sleep(Duration::from_millis(30));
        assert!(seq.is_playing());
        assert_eq!(seq.device().writes(), vec![1.0]);
        seq.stop();
    }

    #[test]
    fn test_new_sequence_supersedes_old() {
        let seq = sequencer();
        let pulse = Sequence::pulse(
            1.0,
            0.2,
            (Duration::ZERO, Duration::ZERO),
            (Duration::from_millis(40), Duration::from_millis(40)),
            None,
        );
        seq.play(pulse, true).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        seq.play(Sequence::solid(0.7), false).unwrap();
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(seq.device().writes().last(), Some(&0.7));
        assert_eq!(seq.device().value(), 0.7);
    }
}
