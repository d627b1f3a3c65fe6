//! Whole-file register access for sysfs attributes.

use crate::error::PioskError;

use log::trace;
use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub(crate) fn read<T: FromStr>(path: &Path) -> Result<T, PioskError> {
    let contents = fs::read_to_string(path).map_err(|e| PioskError::io(path, e))?;
    contents
        .trim()
        .parse()
        .map_err(|_| PioskError::InvalidRegister {
            path: path.to_path_buf(),
            contents,
        })
}

pub(crate) fn write(path: &Path, value: impl Display) -> Result<(), PioskError> {
    trace!("{} <- {}", path.display(), value);
    fs::write(path, value.to_string()).map_err(|e| PioskError::io(path, e))
}
