//! Display coordination: screensaver, button, and motion events.

use crate::backlight::{BacklightController, BacklightDevice};
use crate::commands::ExternalCommands;
use crate::indicator::IndicatorDevice;
use crate::screensaver::classify;
use crate::sequence::Sequence;
use crate::sequencer::Sequencer;
use crate::signal::Signal;
use crate::state::{PowerState, ScreensaverState, ScreensaverStatus};

use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Timing and intensity settings for the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Indicator intensity for "on".
    pub led_max: f64,
    /// Indicator intensity the screensaver fade dims to.
    pub led_min: f64,
    /// Length of the screensaver dimming fade.
    pub led_fade: Duration,
    /// Holding the button this long starts the shutdown strobe.
    pub min_hold: Duration,
    /// Holding the button this long triggers the shutdown command on release.
    pub max_hold: Duration,
    /// Delay between screensaver activation and display power-off.
    pub settle_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            led_max: 1.0,
            led_min: 0.1,
            led_fade: Duration::from_secs(1),
            min_hold: Duration::from_secs(1),
            max_hold: Duration::from_secs(5),
            settle_delay: Duration::from_millis(1500),
        }
    }
}

/// One press-hold-release cycle of the button.
#[derive(Debug, Clone, Copy)]
struct ButtonGesture {
    pressed_at: Instant,
    held_since: Option<Instant>,
}

/// What a button release was interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRelease {
    /// Released before the hold threshold: next manual brightness step.
    Tap,
    /// Held, but released before the shutdown window closed.
    ModeToggle,
    /// Held through the whole shutdown window, counted from the press.
    Shutdown,
}

/// The hub tying screensaver, button, and motion events to the indicator
/// and the backlight.
///
/// Every handler is safe to call concurrently from any thread. None of them
/// blocks for long except [`DisplayCoordinator::handle_screensaver_line`],
/// which waits out the settle delay on the watcher's own thread.
pub struct DisplayCoordinator<D, B> {
    sequencer: Arc<Sequencer<D>>,
    backlight: Arc<BacklightController<B>>,
    commands: Arc<dyn ExternalCommands>,
    settings: CoordinatorSettings,
    screensaver: ScreensaverState,
    gesture: Mutex<Option<ButtonGesture>>,
    settle_abort: Signal,
}

impl<D, B> DisplayCoordinator<D, B>
where
    D: IndicatorDevice + 'static,
    B: BacklightDevice + 'static,
{
    /// Coordinate `sequencer` and `backlight`, launching `commands` as needed.
    pub fn new(
        sequencer: Arc<Sequencer<D>>,
        backlight: Arc<BacklightController<B>>,
        commands: Arc<dyn ExternalCommands>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            sequencer,
            backlight,
            commands,
            settings,
            screensaver: ScreensaverState::new(),
            gesture: Mutex::new(None),
            settle_abort: Signal::new(),
        }
    }

    /// The indicator sequencer.
    pub fn sequencer(&self) -> &Sequencer<D> {
        &self.sequencer
    }

    /// The backlight controller.
    pub fn backlight(&self) -> &BacklightController<B> {
        &self.backlight
    }

    /// Last screensaver status reported by the watcher.
    pub fn screensaver_status(&self) -> ScreensaverStatus {
        self.screensaver.status()
    }

    fn indicate(&self, sequence: Sequence) {
        if let Err(e) = self.sequencer.play(sequence, true) {
            warn!("failed to start indicator sequence: {e}");
        }
    }

    // =========================================================================
    // Screensaver
    // =========================================================================

    /// Classify one watcher line and act on it.
    pub fn handle_screensaver_line(&self, line: &str) -> ScreensaverStatus {
        let status = classify(line);
        match status {
            ScreensaverStatus::Activated => self.screensaver_activated(),
            ScreensaverStatus::Deactivated => self.screensaver_deactivated(),
            ScreensaverStatus::None => {}
        }
        status
    }

    fn screensaver_activated(&self) {
        if !self.screensaver.record(ScreensaverStatus::Activated) {
            debug!("screensaver already active");
            return;
        }
        info!("screensaver activated, dimming indicator");
        self.settle_abort.clear();
        self.indicate(Sequence::fade_out(
            self.settings.led_min,
            self.settings.led_fade,
        ));

        // Let the screensaver's own fade finish before cutting power.
        if self.settle_abort.wait_timeout(self.settings.settle_delay) {
            debug!("wake requested while settling, keeping display on");
            return;
        }
        if let Err(e) = self.backlight.set_power(PowerState::Off) {
            error!("failed to turn display off: {e}");
        }
    }

    fn screensaver_deactivated(&self) {
        if !self.screensaver.record(ScreensaverStatus::Deactivated) {
            debug!("screensaver already inactive");
            return;
        }
        info!("screensaver deactivated, turning indicator off");
        self.settle_abort.set();
        self.indicate(Sequence::off());
        if let Err(e) = self.backlight.set_power(PowerState::On) {
            error!("failed to turn display on: {e}");
        }
    }

    /// Ask the screensaver to unblank, unless it is inactive or already asked.
    ///
    /// Returns whether a command was sent.
    pub fn request_deactivate(&self) -> bool {
        if !self.screensaver.request_deactivation() {
            debug!("screensaver deactivation not needed");
            return false;
        }
        self.settle_abort.set();
        if let Err(e) = self.commands.deactivate_screensaver() {
            warn!("failed to deactivate screensaver: {e}");
            self.screensaver.withdraw_deactivation();
            return false;
        }
        true
    }

    /// Ask the screensaver to blank, unless it is active or already asked.
    ///
    /// Returns whether a command was sent.
    pub fn request_activate(&self) -> bool {
        if !self.screensaver.request_activation() {
            debug!("screensaver activation not needed");
            return false;
        }
        if let Err(e) = self.commands.activate_screensaver() {
            warn!("failed to activate screensaver: {e}");
            self.screensaver.withdraw_activation();
            return false;
        }
        true
    }

    // =========================================================================
    // Motion
    // =========================================================================

    /// Motion was seen: wake the display if it is off.
    pub fn on_motion_detected(&self) {
        if self.backlight.power() == PowerState::Off {
            self.request_deactivate();
        } else {
            debug!("motion while display is on, ignoring");
        }
    }

    // =========================================================================
    // Button
    // =========================================================================

    /// The button went down.
    pub fn on_button_pressed(&self) {
        *self.gesture.lock().unwrap_or_else(|e| e.into_inner()) = Some(ButtonGesture {
            pressed_at: Instant::now(),
            held_since: None,
        });
        self.indicate(Sequence::solid(self.settings.led_max));
        self.request_deactivate();
    }

    /// The button has been down for `held_for`, past the hold threshold.
    pub fn on_button_held(&self, held_for: Duration) {
        let now = Instant::now();
        {
            let mut gesture = self.gesture.lock().unwrap_or_else(|e| e.into_inner());
            let gesture = gesture.get_or_insert(ButtonGesture {
                pressed_at: now.checked_sub(held_for).unwrap_or(now),
                held_since: None,
            });
            gesture.held_since = Some(now);
        }
        debug!("button held for {:?}, starting shutdown strobe", held_for);
        self.indicate(Sequence::hold_strobe(
            self.settings.led_max,
            held_for,
            self.settings.max_hold,
        ));
    }

    /// The button came up.
    pub fn on_button_released(&self) -> ButtonRelease {
        let gesture = self
            .gesture
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        self.indicate(Sequence::off());

        let release = match gesture {
            Some(ButtonGesture {
                pressed_at,
                held_since: Some(_),
            }) if pressed_at.elapsed() >= self.settings.max_hold => ButtonRelease::Shutdown,
            Some(ButtonGesture {
                held_since: Some(_),
                ..
            }) => ButtonRelease::ModeToggle,
            _ => ButtonRelease::Tap,
        };
        debug!("button released: {:?}", release);

        match release {
            ButtonRelease::Tap => self.advance_brightness(),
            // TODO: switch between auto and manual brightness once the
            // auto-brightness worker can be paused without stopping it.
            ButtonRelease::ModeToggle => info!("brightness mode toggle requested"),
            ButtonRelease::Shutdown => {
                if let Err(e) = self.commands.shutdown() {
                    error!("failed to run shutdown command: {e}");
                }
            }
        }
        release
    }

    fn advance_brightness(&self) {
        let step = |backlight: &BacklightController<B>| {
            if let Err(e) = backlight.advance_manual_step() {
                warn!("failed to change brightness: {e}");
            }
        };

        if !self.backlight.smoothing_enabled() {
            step(&self.backlight);
            return;
        }
        // Smoothed steps take a while; keep them off the input thread.
        let backlight = Arc::clone(&self.backlight);
        let spawned = thread::Builder::new()
            .name("manual-step".into())
            .spawn(move || step(&backlight));
        if let Err(e) = spawned {
            warn!("failed to start brightness step: {e}");
        }
    }
}
