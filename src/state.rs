//! Shared display power and screensaver state.
//!
//! These are the only pieces of state visible to more than one component.
//! Each is guarded by its own lock, and every accessor short-circuits when the
//! requested state is already current, so transition requests are idempotent.

use crate::signal::Signal;

use std::sync::{Condvar, Mutex, MutexGuard};

/// Backlight power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Display lit.
    #[default]
    On,
    /// Display blanked.
    Off,
}

impl PowerState {
    /// Value of the `bl_power` register for this state.
    pub fn register_value(self) -> u8 {
        match self {
            PowerState::On => 0,
            PowerState::Off => 1,
        }
    }

    /// State for a `bl_power` register value. Anything but 0 is off.
    pub fn from_register(value: u8) -> Self {
        if value == 0 {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

/// The last screensaver transition reported by the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreensaverStatus {
    /// Nothing reported yet, or a line that is not a transition.
    #[default]
    None,
    /// The screen was blanked.
    Activated,
    /// The screen was unblanked.
    Deactivated,
}

/// The single source of truth for display power.
#[derive(Debug, Default)]
pub struct DisplayState {
    power: Mutex<PowerState>,
    changed: Condvar,
}

impl DisplayState {
    /// Start out in `power`.
    pub fn new(power: PowerState) -> Self {
        Self {
            power: Mutex::new(power),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PowerState> {
        self.power.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current power state.
    pub fn power(&self) -> PowerState {
        *self.lock()
    }

    /// Move to `target`, running `commit` while the state is locked.
    ///
    /// Returns `Ok(false)` without calling `commit` if already in `target`.
    /// The state only changes if `commit` succeeds.
    pub fn transition<E>(
        &self,
        target: PowerState,
        commit: impl FnOnce() -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut power = self.lock();
        if *power == target {
            return Ok(false);
        }
        commit()?;
        *power = target;
        self.changed.notify_all();
        Ok(true)
    }

    /// Block until the display is in `target` or `stop` is set.
    ///
    /// Returns `true` once `target` is reached. Callers setting `stop` must
    /// follow up with [`DisplayState::interrupt`].
    pub fn wait_for(&self, target: PowerState, stop: &Signal) -> bool {
        let mut power = self.lock();
        loop {
            if *power == target {
                return true;
            }
            if stop.is_set() {
                return false;
            }
            power = self.changed.wait(power).unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Wake every [`DisplayState::wait_for`] so it re-checks its stop signal.
    pub fn interrupt(&self) {
        let _power = self.lock();
        self.changed.notify_all();
    }
}

#[derive(Debug, Default)]
struct Screensaver {
    status: ScreensaverStatus,
    activation_pending: bool,
    deactivation_pending: bool,
}

/// Tracks the watcher's last reported status and outstanding deactivate commands.
#[derive(Debug, Default)]
pub struct ScreensaverState {
    inner: Mutex<Screensaver>,
}

impl ScreensaverState {
    /// Nothing reported yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Screensaver> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Last reported status.
    pub fn status(&self) -> ScreensaverStatus {
        self.lock().status
    }

    /// Record a reported transition. Returns `false` if it repeats the current status.
    pub fn record(&self, status: ScreensaverStatus) -> bool {
        let mut inner = self.lock();
        if status == ScreensaverStatus::None || inner.status == status {
            return false;
        }
        inner.status = status;
        inner.activation_pending = false;
        inner.deactivation_pending = false;
        true
    }

    /// Claim the right to send an activate command.
    ///
    /// Returns `false` if the screensaver is already active or a command
    /// is already on its way.
    pub fn request_activation(&self) -> bool {
        let mut inner = self.lock();
        if inner.status == ScreensaverStatus::Activated || inner.activation_pending {
            return false;
        }
        inner.activation_pending = true;
        true
    }

    /// Give up an activation claim whose command could not be sent.
    pub fn withdraw_activation(&self) {
        self.lock().activation_pending = false;
    }

    /// Claim the right to send a deactivate command.
    ///
    /// Returns `false` if the screensaver is already inactive or a command
    /// is already on its way.
    pub fn request_deactivation(&self) -> bool {
        let mut inner = self.lock();
        if inner.status == ScreensaverStatus::Deactivated || inner.deactivation_pending {
            return false;
        }
        inner.deactivation_pending = true;
        true
    }

    /// Give up a deactivation claim whose command could not be sent.
    pub fn withdraw_deactivation(&self) {
        self.lock().deactivation_pending = false;
    }
}
