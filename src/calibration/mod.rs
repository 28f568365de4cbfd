//! Sensor-to-body rotation calibration
//!
//! A rover's IMU is rarely mounted perfectly aligned with the body frame.
//! [`RotationScaler`] holds the fixed calibration rotation determined at
//! installation time, applies it to incoming vector samples, and persists
//! it as a small JSON document next to the rover's other configuration.

use crate::core::types::Data;
use crate::math::{Quaternion, Vector};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Result type for calibration file operations
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Calibration persistence errors
#[derive(Debug)]
pub enum CalibrationError {
    /// Calibration file could not be read (missing, permissions, ...)
    Unreadable { path: String, source: io::Error },
    /// Calibration file exists but does not parse as a calibration document
    Malformed {
        path: String,
        source: serde_json::Error,
    },
    /// Calibration file could not be written
    WriteFailed { path: String, source: io::Error },
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::Unreadable { path, source } => {
                write!(f, "cannot read calibration file '{}': {}", path, source)
            }
            CalibrationError::Malformed { path, source } => {
                write!(f, "malformed calibration file '{}': {}", path, source)
            }
            CalibrationError::WriteFailed { path, source } => {
                write!(f, "cannot write calibration file '{}': {}", path, source)
            }
        }
    }
}

impl std::error::Error for CalibrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CalibrationError::Unreadable { source, .. }
            | CalibrationError::WriteFailed { source, .. } => Some(source),
            CalibrationError::Malformed { source, .. } => Some(source),
        }
    }
}

/// On-disk calibration document: `{"rotation": {"w": .., "i": .., ...}}`
#[derive(Debug, Deserialize)]
struct CalibrationFile {
    rotation: Quaternion,
}

/// Fixed sensor-to-body calibration rotation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationScaler {
    rotation: Quaternion,
}

impl RotationScaler {
    /// Create a scaler from a known calibration rotation
    pub fn new(rotation: Quaternion) -> Self {
        Self { rotation }
    }

    /// The calibration rotation currently in effect
    pub fn rotation(&self) -> Quaternion {
        self.rotation
    }

    /// Rotate a vector sample into the body frame, keeping its timestamp
    pub fn scale(&self, sample: &Data<Vector>) -> Data<Vector> {
        sample.map(|v| self.rotation.rotate(v))
    }

    /// Load a calibration rotation from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> CalibrationResult<Self> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(&path).map_err(|source| CalibrationError::Unreadable {
            path: path_str.clone(),
            source,
        })?;
        let file: CalibrationFile =
            serde_json::from_str(&content).map_err(|source| CalibrationError::Malformed {
                path: path_str.clone(),
                source,
            })?;
        debug!("loaded calibration rotation from {}", path_str);
        Ok(Self::new(file.rotation))
    }

    /// Save the calibration rotation as JSON
    ///
    /// Writes to a temporary file in the target directory and renames it
    /// into place, so a crash mid-write never leaves a truncated file.
    /// Identical calibration state always produces byte-identical output.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> CalibrationResult<()> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let content = self.to_json();

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, &content).map_err(|source| CalibrationError::WriteFailed {
            path: path_str.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| CalibrationError::WriteFailed {
            path: path_str.clone(),
            source,
        })?;
        debug!("saved calibration rotation to {}", path_str);
        Ok(())
    }

    /// Canonical JSON form of the calibration document
    ///
    /// Components are formatted with Rust's shortest round-trip notation
    /// (integral values carry no trailing `.0`), which is the on-disk
    /// contract for these files.
    fn to_json(&self) -> String {
        format!(
            "{{\"rotation\":{{\"w\":{},\"i\":{},\"j\":{},\"k\":{}}}}}",
            self.rotation.w, self.rotation.i, self.rotation.j, self.rotation.k
        )
    }
}
