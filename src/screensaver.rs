//! Reads screensaver transitions from `xscreensaver-command --watch`.

use crate::error::PioskError;
use crate::state::ScreensaverStatus;

use log::{debug, info, warn};
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

/// Classify one line of watcher output.
///
/// `UNBLANK` is checked first since it contains `BLANK`.
pub fn classify(line: &str) -> ScreensaverStatus {
    if line.contains("UNBLANK") {
        ScreensaverStatus::Deactivated
    } else if line.contains("BLANK") {
        ScreensaverStatus::Activated
    } else {
        ScreensaverStatus::None
    }
}

/// Feed every line of `reader` to `on_line` until the stream ends.
///
/// Returns the number of lines read. A read error ends the stream like EOF.
pub fn read_lines(reader: impl BufRead, mut on_line: impl FnMut(&str)) -> usize {
    let mut count = 0;
    for line in reader.lines() {
        match line {
            Ok(line) => {
                debug!("screensaver: {}", line.trim_end());
                on_line(&line);
                count += 1;
            }
            Err(e) => {
                warn!("screensaver watcher read failed: {e}");
                break;
            }
        }
    }
    count
}

/// Worker reading a watcher process's output.
pub struct ScreensaverWatcher {
    handle: JoinHandle<()>,
}

impl ScreensaverWatcher {
    /// Watch X display `display` with `xscreensaver-command`.
    pub fn spawn(
        display: &str,
        on_line: impl FnMut(&str) + Send + 'static,
    ) -> Result<Self, PioskError> {
        let mut command = Command::new("xscreensaver-command");
        command.args(["--display", display, "--watch"]);
        Self::spawn_command(command, on_line)
    }

    /// Run `command` and feed its standard output to `on_line`, line by line.
    ///
    /// The worker ends quietly once the process closes its output.
    pub fn spawn_command(
        mut command: Command,
        on_line: impl FnMut(&str) + Send + 'static,
    ) -> Result<Self, PioskError> {
        let program = format!("{:?}", command);
        let spawn_error = |source| PioskError::Spawn {
            program: program.clone(),
            source,
        };

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;
        let Some(stdout) = child.stdout.take() else {
            return Err(spawn_error(std::io::Error::other("no stdout pipe")));
        };
        info!("watching screensaver with {}", program);

        let handle = thread::Builder::new()
            .name("screensaver".into())
            .spawn(move || {
                let lines = read_lines(BufReader::new(stdout), on_line);
                match child.wait() {
                    Ok(status) => info!(
                        "screensaver watcher exited with {} after {} lines",
                        status, lines
                    ),
                    Err(e) => warn!("failed to wait on screensaver watcher: {e}"),
                }
            })
            .map_err(spawn_error)?;
        Ok(Self { handle })
    }

    /// Wait until the watcher's output ends.
    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("screensaver watcher panicked");
        }
    }
}
