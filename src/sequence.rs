//! Indicator sequence definitions.

use crate::easing::Easing;
use std::time::Duration;

/// Frame rate used by steps that do not set one.
pub const DEFAULT_FRAME_RATE: u32 = 25;

/// One leg of an indicator animation.
///
/// An optional eased fade from the previously reached value to `target`,
/// followed by holding `target` for `hold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityStep {
    /// Intensity to reach, in `[0, 1]`.
    pub target: f64,
    /// How long to hold `target` once reached.
    pub hold: Duration,
    /// How long the fade towards `target` takes. Zero jumps immediately.
    pub fade: Duration,
    /// Fade frames per second.
    pub frame_rate: u32,
    /// Curve used for the fade.
    pub easing: Easing,
}

impl IntensityStep {
    /// Jump to `target` with no hold.
    pub fn new(target: f64) -> Self {
        Self {
            target: target.clamp(0.0, 1.0),
            hold: Duration::ZERO,
            fade: Duration::ZERO,
            frame_rate: DEFAULT_FRAME_RATE,
            easing: Easing::Linear,
        }
    }

    /// Hold `target` for `hold` after reaching it.
    pub fn hold(self, hold: Duration) -> Self {
        Self { hold, ..self }
    }

    /// Fade towards `target` over `fade`.
    pub fn fade(self, fade: Duration) -> Self {
        Self { fade, ..self }
    }

    /// Fade frames per second. Zero is treated as one.
    pub fn frame_rate(self, frame_rate: u32) -> Self {
        Self {
            frame_rate: frame_rate.max(1),
            ..self
        }
    }

    /// Curve used for the fade.
    pub fn easing(self, easing: Easing) -> Self {
        Self { easing, ..self }
    }

    /// Spacing between two fade frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate))
    }

    /// Fade frames leading from `previous` up to (not including) `target`.
    ///
    /// Empty when there is no fade or nothing to fade across.
    pub fn fade_frames(&self, previous: f64) -> Vec<f64> {
        if self.fade.is_zero() || previous == self.target {
            return Vec::new();
        }
        let count = (f64::from(self.frame_rate) * self.fade.as_secs_f64()).round() as usize;
        (0..count)
            .map(|i| {
                self.easing
                    .interpolate(previous, self.target, i as f64 / count as f64)
            })
            .collect()
    }
}

/// An ordered, optionally repeating list of [`IntensityStep`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    /// Steps played in order.
    pub steps: Vec<IntensityStep>,
    /// Number of passes over `steps`; `None` repeats until stopped.
    pub repeat: Option<u32>,
    /// Value the first fade starts from; `None` uses the device's current value.
    pub initial_value: Option<f64>,
}

impl Sequence {
    /// Play `steps` once, starting from the device's current value.
    pub fn once(steps: Vec<IntensityStep>) -> Self {
        Self {
            steps,
            repeat: Some(1),
            initial_value: None,
        }
    }

    /// Play `steps` until stopped.
    pub fn forever(steps: Vec<IntensityStep>) -> Self {
        Self {
            steps,
            repeat: None,
            initial_value: None,
        }
    }

    /// Override the number of passes.
    pub fn repeat(self, repeat: Option<u32>) -> Self {
        Self { repeat, ..self }
    }

    /// Start the first fade from `value` instead of the device's current value.
    pub fn starting_at(self, value: f64) -> Self {
        Self {
            initial_value: Some(value.clamp(0.0, 1.0)),
            ..self
        }
    }

    /// Jump to `value` and stay there.
    pub fn solid(value: f64) -> Self {
        Self::once(vec![IntensityStep::new(value)])
    }

    /// Turn the indicator off.
    pub fn off() -> Self {
        Self::solid(0.0)
    }

    /// Alternate between `value` and off. `n` of `None` blinks until stopped.
    pub fn blink(value: f64, on: Duration, off: Duration, n: Option<u32>) -> Self {
        Self::once(vec![
            IntensityStep::new(value).hold(on),
            IntensityStep::new(0.0).hold(off),
        ])
        .repeat(n)
    }

    /// Fade between `high` and `low`, holding at each end.
    pub fn pulse(
        high: f64,
        low: f64,
        hold: (Duration, Duration),
        fade: (Duration, Duration),
        n: Option<u32>,
    ) -> Self {
        Self::once(vec![
            IntensityStep::new(high).hold(hold.0).fade(fade.0),
            IntensityStep::new(low).hold(hold.1).fade(fade.1),
        ])
        .repeat(n)
    }

    /// Fade down to `dim`, then fade out completely.
    pub fn fade_out(dim: f64, fade: Duration) -> Self {
        Self::once(vec![
            IntensityStep::new(dim).fade(fade),
            IntensityStep::new(0.0).fade(fade / 2),
        ])
    }

    /// Strobe warning shown while the button is held towards a shutdown.
    ///
    /// The first leg fades in over whatever is left of the first second of
    /// holding, then the indicator resets and strobes once per second for the
    /// rest of the hold window.
    pub fn hold_strobe(value: f64, held: Duration, max_hold: Duration) -> Self {
        let first = Duration::from_secs_f64((1.0 - held.as_secs_f64()).clamp(0.0, 1.0));
        let strobe = IntensityStep::new(value)
            .fade(Duration::from_secs(1))
            .easing(Easing::ExponentialIn);
        let reset = IntensityStep::new(0.0);

        let mut steps = vec![strobe.fade(first)];
        let legs = (max_hold.as_secs_f64() - 1.0).round().max(0.0) as usize;
        for _ in 0..legs {
            steps.push(reset);
            steps.push(strobe);
        }
        Self::once(steps).starting_at(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_frames_count_and_range() {
        let step = IntensityStep::new(1.0)
            .fade(Duration::from_millis(400))
            .frame_rate(25);
        let frames = step.fade_frames(0.0);

        assert_eq!(frames.len(), 10);
        assert_eq!(frames[0], 0.0);
        assert!(frames.windows(2).all(|w| w[0] < w[1]));
        assert!(*frames.last().unwrap() < 1.0);
    }

    #[test]
    fn test_no_frames_without_fade_or_change() {
        assert!(IntensityStep::new(0.5).fade_frames(0.0).is_empty());

        let step = IntensityStep::new(0.5).fade(Duration::from_secs(1));
        assert!(step.fade_frames(0.5).is_empty());
    }

    #[test]
    fn test_target_is_clamped() {
        assert_eq!(IntensityStep::new(1.7).target, 1.0);
        assert_eq!(IntensityStep::new(-0.2).target, 0.0);
    }

    #[test]
    fn test_hold_strobe_compensates_for_time_held() {
        let seq = Sequence::hold_strobe(1.0, Duration::from_millis(1100), Duration::from_secs(5));

        assert_eq!(seq.initial_value, Some(0.0));
        assert_eq!(seq.steps[0].fade, Duration::ZERO);
        // One compensating leg plus a reset and strobe for each remaining second.
        assert_eq!(seq.steps.len(), 1 + 2 * 4);
        assert_eq!(seq.steps[1].target, 0.0);
        assert_eq!(seq.steps[2].fade, Duration::from_secs(1));

        let seq = Sequence::hold_strobe(1.0, Duration::from_millis(250), Duration::from_secs(5));
        assert_eq!(seq.steps[0].fade, Duration::from_millis(750));
    }

    #[test]
    fn test_solid_plays_once() {
        let seq = Sequence::solid(0.8);
        assert_eq!(seq.repeat, Some(1));
        assert_eq!(seq.steps, vec![IntensityStep::new(0.8)]);
    }
}
