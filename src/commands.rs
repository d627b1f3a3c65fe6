//! Fire-and-forget external commands.

use crate::error::PioskError;

use log::{debug, info, warn};
use std::process::{Command, Stdio};
use std::thread;

/// External programs the coordinator launches without waiting on.
///
/// This allows for mock implementations in tests.
pub trait ExternalCommands: Send + Sync {
    /// Blank the screen through the screensaver.
    fn activate_screensaver(&self) -> Result<(), PioskError>;

    /// Unblank the screen through the screensaver.
    fn deactivate_screensaver(&self) -> Result<(), PioskError>;

    /// Launch the shutdown confirmation command.
    fn shutdown(&self) -> Result<(), PioskError>;
}

/// Runs `xscreensaver-command` and the configured shutdown command line.
#[derive(Debug, Clone)]
pub struct ShellCommands {
    display: String,
    shutdown: String,
}

impl ShellCommands {
    /// Commands for X display `display`; `shutdown` is run through `sh -c`.
    pub fn new(display: impl Into<String>, shutdown: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            shutdown: shutdown.into(),
        }
    }

    fn screensaver(&self, action: &str) -> Result<(), PioskError> {
        let mut command = Command::new("xscreensaver-command");
        command.args(["--display", &self.display, action]);
        launch(command)
    }
}

impl ExternalCommands for ShellCommands {
    fn activate_screensaver(&self) -> Result<(), PioskError> {
        self.screensaver("--activate")
    }

    fn deactivate_screensaver(&self) -> Result<(), PioskError> {
        self.screensaver("--deactivate")
    }

    fn shutdown(&self) -> Result<(), PioskError> {
        info!("running shutdown command `{}`", self.shutdown);
        let mut command = Command::new("sh");
        command.args(["-c", &self.shutdown]);
        launch(command)
    }
}

/// Spawn `command` with its output discarded and reap it in the background.
fn launch(mut command: Command) -> Result<(), PioskError> {
    let program = format!("{:?}", command);
    debug!("launching {}", program);
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|source| PioskError::Spawn {
            program: program.clone(),
            source,
        })?;

    let reaper = thread::Builder::new()
        .name("reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => warn!("{} exited with {}", program, status),
            Ok(_) => {}
            Err(e) => warn!("failed to wait on {}: {}", program, e),
        });
    if let Err(e) = reaper {
        warn!("could not reap child process: {e}");
    }
    Ok(())
}
