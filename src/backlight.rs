//! Backlight power and brightness control.

use crate::easing::Easing;
use crate::error::PioskError;
use crate::motion::MotionTrigger;
use crate::state::{DisplayState, PowerState};
use crate::sysfs;

use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Where the kernel exposes backlight devices.
pub const DEFAULT_BACKLIGHT_ROOT: &str = "/sys/class/backlight";

/// Known Raspberry Pi touchscreen backlights, probed in order.
pub const BACKLIGHT_CANDIDATES: [&str; 4] = ["rpi_backlight", "10-0045", "4-0045", "6-0045"];

// =============================================================================
// Backlight Device Trait
// =============================================================================

/// The backlight register interface.
///
/// This allows for mock implementations in tests.
pub trait BacklightDevice: Send + Sync {
    /// Read the `brightness` register (0-255).
    fn brightness(&self) -> Result<u8, PioskError>;

    /// Write the `brightness` register.
    fn set_brightness(&self, level: u8) -> Result<(), PioskError>;

    /// Read the power register.
    fn power(&self) -> Result<PowerState, PioskError>;

    /// Write the power register.
    fn set_power(&self, state: PowerState) -> Result<(), PioskError>;
}

// =============================================================================
// Sysfs Backlight
// =============================================================================

/// A backlight under `/sys/class/backlight/<name>`.
#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    dir: PathBuf,
}

impl SysfsBacklight {
    /// Use the first of [`BACKLIGHT_CANDIDATES`] that exists under `root`.
    ///
    /// # Errors
    ///
    /// [`PioskError::BacklightNotFound`] if none of them exist.
    pub fn detect(root: &Path) -> Result<Self, PioskError> {
        let searched: Vec<PathBuf> = BACKLIGHT_CANDIDATES
            .iter()
            .map(|name| root.join(name))
            .collect();
        match searched.iter().find(|dir| dir.exists()) {
            Some(dir) => {
                info!("using backlight {}", dir.display());
                Ok(Self::new(dir.clone()))
            }
            None => Err(PioskError::BacklightNotFound { searched }),
        }
    }

    /// Use the backlight device directory `dir` directly.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The device directory.
    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl BacklightDevice for SysfsBacklight {
    fn brightness(&self) -> Result<u8, PioskError> {
        sysfs::read(&self.dir.join("brightness"))
    }

    fn set_brightness(&self, level: u8) -> Result<(), PioskError> {
        sysfs::write(&self.dir.join("brightness"), level)
    }

    fn power(&self) -> Result<PowerState, PioskError> {
        sysfs::read(&self.dir.join("bl_power")).map(PowerState::from_register)
    }

    fn set_power(&self, state: PowerState) -> Result<(), PioskError> {
        sysfs::write(&self.dir.join("bl_power"), state.register_value())
    }
}

// =============================================================================
// Backlight Controller
// =============================================================================

/// How brightness changes are animated.
#[derive(Debug, Clone, PartialEq)]
pub struct BacklightSettings {
    /// Levels cycled through by [`BacklightController::advance_manual_step`].
    pub manual_steps: Vec<u8>,
    /// Whether [`BacklightController::set_brightness`] animates.
    pub smooth: bool,
    /// Length of a smoothed transition.
    pub smooth_duration: Duration,
    /// Frames per second of a smoothed transition.
    pub smooth_fps: u32,
    /// Curve of a smoothed transition.
    pub easing: Easing,
}

impl Default for BacklightSettings {
    fn default() -> Self {
        Self {
            manual_steps: vec![255, 191, 127, 63, 15],
            smooth: true,
            smooth_duration: Duration::from_secs(1),
            smooth_fps: 30,
            easing: Easing::Linear,
        }
    }
}

#[derive(Debug, Default)]
struct Registers {
    brightness: Option<u8>,
    manual_index: usize,
}

/// Exclusive owner of a [`BacklightDevice`].
///
/// Every register access happens under one lock, so brightness and power
/// writes are strictly ordered. The last written brightness is cached so
/// repeated requests do not touch the device.
pub struct BacklightController<B> {
    device: B,
    display: Arc<DisplayState>,
    motion: Arc<dyn MotionTrigger>,
    settings: BacklightSettings,
    registers: Mutex<Registers>,
}

impl<B: BacklightDevice> BacklightController<B> {
    /// Wrap `device`. Power transitions are recorded in `display` and arm or
    /// disarm `motion`.
    pub fn new(
        device: B,
        display: Arc<DisplayState>,
        motion: Arc<dyn MotionTrigger>,
        settings: BacklightSettings,
    ) -> Self {
        Self {
            device,
            display,
            motion,
            settings,
            registers: Mutex::new(Registers::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registers> {
        self.registers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The wrapped device.
    pub fn device(&self) -> &B {
        &self.device
    }

    /// The shared display power state.
    pub fn display(&self) -> &Arc<DisplayState> {
        &self.display
    }

    /// Whether brightness changes are animated.
    pub fn smoothing_enabled(&self) -> bool {
        self.settings.smooth
    }

    /// Last brightness written through this controller.
    pub fn brightness(&self) -> Option<u8> {
        self.lock().brightness
    }

    /// Current display power.
    pub fn power(&self) -> PowerState {
        self.display.power()
    }

    /// Position in the manual step list.
    pub fn manual_step_index(&self) -> usize {
        self.lock().manual_index
    }

    /// Switch the display on or off.
    ///
    /// Writes nothing if the display is already in `state`. Turning off arms
    /// the motion monitor; turning on disarms it.
    pub fn set_power(&self, state: PowerState) -> Result<bool, PioskError> {
        let _registers = self.lock();
        let changed = self
            .display
            .transition(state, || self.device.set_power(state))?;
        if changed {
            info!("display power {:?}", state);
            match state {
                PowerState::Off => self.motion.arm(),
                PowerState::On => self.motion.disarm(),
            }
        }
        Ok(changed)
    }

    /// Write `level` straight to the device.
    ///
    /// Out-of-range levels and the cached value are ignored. Returns whether
    /// the register was written.
    pub fn set_brightness_immediate(&self, level: i32) -> Result<bool, PioskError> {
        let Ok(level) = u8::try_from(level) else {
            debug!("ignoring out-of-range brightness {}", level);
            return Ok(false);
        };
        self.write_level(&mut self.lock(), level)
    }

    /// Animate from the current brightness to `level` along `easing`.
    ///
    /// Runs on the caller's thread for the configured smoothing duration.
    pub fn set_brightness_smoothed(&self, level: i32, easing: Easing) -> Result<(), PioskError> {
        let Ok(level) = u8::try_from(level) else {
            debug!("ignoring out-of-range brightness {}", level);
            return Ok(());
        };
        self.smooth_to(&mut self.lock(), level, easing)
    }

    /// Apply `level`, smoothed or immediate as configured.
    pub fn set_brightness(&self, level: i32) -> Result<(), PioskError> {
        if self.settings.smooth {
            self.set_brightness_smoothed(level, self.settings.easing)
        } else {
            self.set_brightness_immediate(level).map(|_| ())
        }
    }

    /// Move to the next manual step, wrapping past the end, and apply it.
    ///
    /// Returns the new level.
    pub fn advance_manual_step(&self) -> Result<u8, PioskError> {
        let mut registers = self.lock();
        let steps = &self.settings.manual_steps;
        let Some(len) = std::num::NonZeroUsize::new(steps.len()) else {
            return Err(PioskError::InvalidConfig("no manual brightness steps".into()));
        };
        registers.manual_index = (registers.manual_index + 1) % len;
        let level = steps[registers.manual_index];
        info!("manual brightness step {} -> {}", registers.manual_index, level);

        if self.settings.smooth {
            self.smooth_to(&mut registers, level, self.settings.easing)?;
        } else {
            self.write_level(&mut registers, level)?;
        }
        Ok(level)
    }

    fn write_level(&self, registers: &mut Registers, level: u8) -> Result<bool, PioskError> {
        if registers.brightness == Some(level) {
            return Ok(false);
        }
        self.device.set_brightness(level)?;
        registers.brightness = Some(level);
        Ok(true)
    }

    fn smooth_to(
        &self,
        registers: &mut Registers,
        level: u8,
        easing: Easing,
    ) -> Result<(), PioskError> {
        let current = match registers.brightness {
            Some(current) => current,
            None => self.device.brightness()?,
        };
        registers.brightness = Some(current);

        let duration = self.settings.smooth_duration.as_secs_f64();
        let fps = self.settings.smooth_fps.max(1);
        let frame_count = (duration * f64::from(fps)).round() as u32;
        let delay = self.settings.smooth_duration / fps;
        debug!(
            "smoothing brightness {} -> {} over {} frames",
            current, level, frame_count
        );

        for frame in 0..=frame_count {
            let t = if frame_count == 0 {
                1.0
            } else {
                f64::from(frame) / f64::from(frame_count)
            };
            let value = easing
                .interpolate(f64::from(current), f64::from(level), t)
                .round() as u8;
            self.write_level(registers, value)?;
            if frame < frame_count {
                thread::sleep(delay);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBacklight, MockMotionTrigger};
    use std::fs;

    fn controller(
        settings: BacklightSettings,
    ) -> (BacklightController<MockBacklight>, Arc<MockMotionTrigger>) {
        let motion = Arc::new(MockMotionTrigger::new());
        let controller = BacklightController::new(
            MockBacklight::new(200),
            Arc::new(DisplayState::new(PowerState::On)),
            motion.clone(),
            settings,
        );
        (controller, motion)
    }

    fn immediate() -> BacklightSettings {
        BacklightSettings {
            smooth: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_first_existing_candidate() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("4-0045")).unwrap();
        fs::create_dir(root.path().join("6-0045")).unwrap();

        let backlight = SysfsBacklight::detect(root.path()).unwrap();
        assert_eq!(backlight.path(), root.path().join("4-0045"));
    }

    #[test]
    fn test_detect_fails_without_candidates() {
        let root = tempfile::tempdir().unwrap();
        let err = SysfsBacklight::detect(root.path()).unwrap_err();
        assert!(matches!(err, PioskError::BacklightNotFound { searched } if searched.len() == 4));
    }

    #[test]
    fn test_sysfs_registers() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("rpi_backlight");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("bl_power"), "1\n").unwrap();

        let backlight = SysfsBacklight::detect(root.path()).unwrap();
        assert_eq!(backlight.power().unwrap(), PowerState::Off);

        backlight.set_power(PowerState::On).unwrap();
        backlight.set_brightness(42).unwrap();
        assert_eq!(fs::read_to_string(dir.join("bl_power")).unwrap(), "0");
        assert_eq!(backlight.brightness().unwrap(), 42);
    }

    #[test]
    fn test_immediate_brightness_deduplicates() {
        let (controller, _) = controller(immediate());

        assert!(controller.set_brightness_immediate(120).unwrap());
        assert!(!controller.set_brightness_immediate(120).unwrap());
        assert_eq!(controller.device().brightness_writes(), vec![120]);
    }

    #[test]
    fn test_immediate_brightness_ignores_out_of_range() {
        let (controller, _) = controller(immediate());

        assert!(!controller.set_brightness_immediate(256).unwrap());
        assert!(!controller.set_brightness_immediate(-1).unwrap());
        assert!(controller.device().brightness_writes().is_empty());
    }

    #[test]
    fn test_set_power_is_idempotent_and_arms_motion() {
        let (controller, motion) = controller(immediate());

        assert!(!controller.set_power(PowerState::On).unwrap());
        assert!(controller.device().power_writes().is_empty());

        assert!(controller.set_power(PowerState::Off).unwrap());
        assert!(!controller.set_power(PowerState::Off).unwrap());
        assert_eq!(controller.device().power_writes(), vec![PowerState::Off]);
        assert_eq!(motion.arms(), 1);

        assert!(controller.set_power(PowerState::On).unwrap());
        assert_eq!(motion.disarms(), 1);
        assert_eq!(controller.power(), PowerState::On);
    }

    #[test]
    fn test_failed_power_write_keeps_state() {
        let (controller, motion) = controller(immediate());
        controller.device().fail_writes(true);

        assert!(controller.set_power(PowerState::Off).is_err());
        assert_eq!(controller.power(), PowerState::On);
        assert_eq!(motion.arms(), 0);
    }

    #[test]
    fn test_manual_step_wraps() {
        let (controller, _) = controller(BacklightSettings {
            manual_steps: vec![255, 127, 31],
            ..immediate()
        });

        assert_eq!(controller.advance_manual_step().unwrap(), 127);
        assert_eq!(controller.advance_manual_step().unwrap(), 31);
        assert_eq!(controller.manual_step_index(), 2);
        assert_eq!(controller.advance_manual_step().unwrap(), 255);
        assert_eq!(controller.manual_step_index(), 0);
        assert_eq!(controller.device().brightness_writes(), vec![127, 31, 255]);
    }

    #[test]
    fn test_smoothed_brightness_steps_to_target() {
        let (controller, _) = controller(BacklightSettings {
            smooth_duration: Duration::from_millis(100),
            smooth_fps: 50,
            ..Default::default()
        });

        controller
            .set_brightness_smoothed(100, Easing::Linear)
            .unwrap();

        // Starts from the device's 200 and writes every distinct sample after it.
        let writes = controller.device().brightness_writes();
        assert_eq!(writes, vec![180, 160, 140, 120, 100]);
        assert_eq!(controller.brightness(), Some(100));
    }
}
