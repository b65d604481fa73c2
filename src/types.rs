//! Core types for magnetometer stream processing
//!
//! Defines the shared scalar aliases and the central error taxonomy used
//! throughout the pipeline. Errors split into two families:
//!
//! - **Recoverable acquisition faults** (`NotFound`, `CorruptData`,
//!   `EmptyDay`): readers report the first two per hour; day-window assembly
//!   answers them with gap fill and raises the third when no hour of the day
//!   read back. They never abort a multi-day run on their own.
//! - **Processing faults** (everything else): numeric degeneracies and
//!   contract violations that abort the single (station, day) unit they occur
//!   in, carrying enough context to diagnose without re-running.

use chrono::NaiveDate;

/// A real-valued sample (all channels are f64 throughout the pipeline).
pub type Sample = f64;

/// Result type for pipeline operations.
pub type MagResult<T> = Result<T, MagError>;

/// Errors that can occur during magnetometer stream processing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MagError {
    #[error("degenerate vector: norm {norm} is zero or non-finite")]
    DegenerateVector { norm: f64 },

    #[error(
        "degenerate rotation: vectors are antiparallel (|sin phi| = {sin_phi:.3e}); no unique axis exists, rotate a half turn about any perpendicular axis instead"
    )]
    DegenerateRotation { sin_phi: f64 },

    #[error("series length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("channel arrays disagree in length: x={x}, y={y}, z={z}, time={time}")]
    ChannelMismatch {
        x: usize,
        y: usize,
        z: usize,
        time: usize,
    },

    #[error("no raw data for {station} {date} hour {hour:02}")]
    NotFound {
        station: String,
        date: NaiveDate,
        hour: u32,
    },

    #[error("corrupt raw data for {station} {date} hour {hour:02}: {detail}")]
    CorruptData {
        station: String,
        date: NaiveDate,
        hour: u32,
        detail: String,
    },

    #[error("no usable raw data for {station} {date}")]
    EmptyDay { station: String, date: NaiveDate },

    #[error(
        "low-pass output collapsed to zero (input energy {in_energy:.3e}, output energy {out_energy:.3e}); reduce the filter order"
    )]
    FilterDegeneracy { in_energy: f64, out_energy: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl MagError {
    /// True for acquisition faults the day-window assembler and the
    /// multi-day driver recover from: `NotFound` and `CorruptData` become
    /// gap fill, `EmptyDay` becomes a skipped day.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MagError::NotFound { .. } | MagError::CorruptData { .. } | MagError::EmptyDay { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        let date = NaiveDate::from_ymd_opt(2018, 2, 12).unwrap();
        let missing = MagError::NotFound {
            station: "LRE".to_string(),
            date,
            hour: 23,
        };
        let corrupt = MagError::CorruptData {
            station: "LRE".to_string(),
            date,
            hour: 4,
            detail: "short block".to_string(),
        };
        assert!(missing.is_recoverable());
        assert!(corrupt.is_recoverable());

        let fatal = MagError::LengthMismatch {
            expected: 10,
            got: 9,
        };
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_degenerate_rotation_message() {
        let err = MagError::DegenerateRotation { sin_phi: 1e-12 };
        let msg = err.to_string();
        assert!(msg.contains("antiparallel"));
        assert!(msg.contains("perpendicular"));
    }

    #[test]
    fn test_not_found_message_has_context() {
        let err = MagError::NotFound {
            station: "LRT".to_string(),
            date: NaiveDate::from_ymd_opt(2018, 2, 12).unwrap(),
            hour: 0,
        };
        let msg = err.to_string();
        assert!(msg.contains("LRT"));
        assert!(msg.contains("2018-02-12"));
        assert!(msg.contains("00"));
    }
}
