//! Error types for the kiosk core.

use std::path::PathBuf;

/// Errors that can occur while driving the kiosk hardware.
#[derive(Debug, thiserror::Error)]
pub enum PioskError {
    /// None of the known backlight devices exist under the backlight root.
    #[error("Could not determine backlight type (searched {searched:?})")]
    BacklightNotFound {
        /// The device directories that were probed.
        searched: Vec<PathBuf>,
    },

    /// A register or GPIO file could not be read or written.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A register held something other than a number.
    #[error("Invalid register contents {contents:?} in {path}")]
    InvalidRegister {
        /// The register file.
        path: PathBuf,
        /// What was read from it.
        contents: String,
    },

    /// The configuration file is not valid TOML for [`Config`](crate::Config).
    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    /// The configuration parsed but holds values that cannot be used.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// An external command could not be launched.
    #[error("Failed to launch `{program}`: {source}")]
    Spawn {
        /// The program that was launched.
        program: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl PioskError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
