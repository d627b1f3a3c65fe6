use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use piosk_core::{
    AutoBrightness, BacklightController, BacklightDevice, ButtonHandlers, ButtonPoller, Config,
    DisplayCoordinator, DisplayState, GpioInput, GpioMotionSensor, IioLightSensor, MotionMonitor,
    MotionSignals, PioskError, PowerState, ScreensaverWatcher, Sequencer, ShellCommands,
    SysfsBacklight, SysfsPwmLed,
};

type Coordinator = DisplayCoordinator<SysfsPwmLed, SysfsBacklight>;

/// Kiosk daemon driving the indicator light, backlight and screensaver.
#[derive(Parser, Debug)]
#[command(about, version)]
struct Cli {
    /// Configuration file. Defaults are used when it does not exist.
    #[arg(long, default_value = "/etc/piosk/config.toml")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `piosk_core=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new().parse_filters(&cli.log_level).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Result<Config, PioskError> {
    if path.exists() {
        info!("loading configuration from {}", path.display());
        Config::load(path)
    } else {
        warn!("{} not found, using default configuration", path.display());
        Ok(Config::default())
    }
}

fn run(cli: &Cli) -> Result<(), PioskError> {
    let config = load_config(&cli.config)?;

    // Hardware that must exist before any worker starts.
    let backlight = SysfsBacklight::detect(&config.brightness.backlight_root)?;
    let led = SysfsPwmLed::open(
        &config.led.pwm_chip,
        config.led.pwm_channel,
        config.led.period_ns,
    )?;

    let initial_power = backlight.power().unwrap_or_else(|e| {
        warn!("failed to read display power, assuming on: {e}");
        PowerState::On
    });
    let signals = MotionSignals::new();
    let backlight = Arc::new(BacklightController::new(
        backlight,
        Arc::new(DisplayState::new(initial_power)),
        Arc::new(signals.clone()),
        config.backlight(),
    ));
    let coordinator: Arc<Coordinator> = Arc::new(DisplayCoordinator::new(
        Arc::new(Sequencer::new(led)),
        Arc::clone(&backlight),
        Arc::new(ShellCommands::new(
            config.screensaver.display.as_str(),
            config.shutdown.command.as_str(),
        )),
        config.coordinator(),
    ));

    let motion = start_motion(&config, signals, &coordinator);
    let button = start_button(&config, &coordinator);
    let auto_brightness = if config.brightness.auto_enabled {
        let sensor = IioLightSensor::new(
            &config.brightness.sensor_path,
            config.brightness.sensor_max,
        );
        match AutoBrightness::spawn(config.auto_brightness(), Arc::new(sensor), backlight) {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("running without auto brightness: {e}");
                None
            }
        }
    } else {
        None
    };

    let watcher = {
        let coordinator = Arc::clone(&coordinator);
        ScreensaverWatcher::spawn(&config.screensaver.display, move |line| {
            coordinator.handle_screensaver_line(line);
        })
    };
    let watcher = match watcher {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            warn!("running without screensaver watcher: {e}");
            None
        }
    };

    Workers {
        watcher,
        button,
        motion,
        auto_brightness,
    }
    .wait();
    Ok(())
}

/// Long-running workers the daemon waits on.
struct Workers<B> {
    watcher: Option<ScreensaverWatcher>,
    button: Option<ButtonPoller>,
    motion: Option<MotionMonitor>,
    auto_brightness: Option<AutoBrightness<B>>,
}

impl<B: BacklightDevice + 'static> Workers<B> {
    /// Block until every worker has exited.
    ///
    /// The watcher ending does not stop the others: the display then follows
    /// only the button and the motion sensor.
    fn wait(self) {
        if let Some(watcher) = self.watcher {
            watcher.join();
            warn!("screensaver watcher ended, display now follows button and motion only");
        }
        if let Some(poller) = self.button {
            poller.join();
        }
        if let Some(monitor) = self.motion {
            monitor.join();
        }
        if let Some(worker) = self.auto_brightness {
            worker.join();
        }
        info!("all workers exited");
    }
}

fn start_motion(
    config: &Config,
    signals: MotionSignals,
    coordinator: &Arc<Coordinator>,
) -> Option<MotionMonitor> {
    let input = GpioInput::open(
        &config.button.gpio_root,
        config.motion.gpio,
        config.motion.active_low,
    );
    let coordinator = Arc::clone(coordinator);
    let started = input.and_then(|input| {
        MotionMonitor::spawn(
            signals,
            Arc::new(GpioMotionSensor::new(input)),
            config.motion_wake_delay(),
            move || coordinator.on_motion_detected(),
        )
    });
    match started {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            warn!("running without motion sensor: {e}");
            None
        }
    }
}

fn start_button(config: &Config, coordinator: &Arc<Coordinator>) -> Option<ButtonPoller> {
    let handlers = {
        let pressed = Arc::clone(coordinator);
        let held = Arc::clone(coordinator);
        let released = Arc::clone(coordinator);
        ButtonHandlers {
            pressed: Box::new(move || pressed.on_button_pressed()),
            held: Box::new(move |held_for| held.on_button_held(held_for)),
            released: Box::new(move || {
                released.on_button_released();
            }),
        }
    };
    let started = GpioInput::open(
        &config.button.gpio_root,
        config.button.gpio,
        config.button.active_low,
    )
    .and_then(|input| {
        ButtonPoller::spawn(
            Arc::new(input),
            Duration::from_millis(config.button.poll_ms),
            config.coordinator().min_hold,
            handlers,
        )
    });
    match started {
        Ok(poller) => Some(poller),
        Err(e) => {
            warn!("running without button: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piosk_core::{MockBacklight, MockInput};
    use std::process::Command;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn button(input: Arc<MockInput>, presses: Arc<AtomicUsize>) -> ButtonPoller {
        let handlers = ButtonHandlers {
            pressed: Box::new(move || {
                presses.fetch_add(1, Ordering::SeqCst);
            }),
            held: Box::new(|_| {}),
            released: Box::new(|| {}),
        };
        ButtonPoller::spawn(
            input,
            Duration::from_millis(5),
            Duration::from_secs(1),
            handlers,
        )
        .unwrap()
    }

    fn assert_button_keeps_working(watcher: Option<ScreensaverWatcher>) {
        let input = Arc::new(MockInput::new());
        let presses = Arc::new(AtomicUsize::new(0));
        let workers: Workers<MockBacklight> = Workers {
            watcher,
            button: Some(button(input.clone(), presses.clone())),
            motion: None,
            auto_brightness: None,
        };
        let daemon = thread::spawn(move || workers.wait());

        thread::sleep(Duration::from_millis(100));
        assert!(!daemon.is_finished());

        input.set(true);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(presses.load(Ordering::SeqCst), 1);
        assert!(!daemon.is_finished());
    }

    #[test]
    fn test_button_outlives_ended_watcher() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo 'BLANK Sat Oct 18 10:00:00 2026'"]);
        let lines = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&lines);
        let watcher = ScreensaverWatcher::spawn_command(command, move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_button_keeps_working(Some(watcher));
        assert_eq!(lines.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_button_runs_without_watcher() {
        assert_button_keeps_working(None);
    }

    #[test]
    fn test_wait_returns_when_nothing_runs() {
        let workers: Workers<MockBacklight> = Workers {
            watcher: None,
            button: None,
            motion: None,
            auto_brightness: None,
        };
        workers.wait();
    }
}
