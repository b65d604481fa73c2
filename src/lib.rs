//! # Magnetometer Calibration & Conditioning Pipeline
//!
//! This crate turns raw three-axis magnetometer samples into calibrated,
//! rate-reduced daily records. It covers the two halves of that job:
//!
//! - **Orientation calibration**: closed-form vector-to-vector rotations
//!   (Rodrigues), angle-triplet rotations, and coordinate-descent searches
//!   for the rotation and per-axis scale that best align a station with a
//!   reference orientation
//! - **Signal conditioning**: zero-phase Butterworth low-pass filtering,
//!   spectral or stride rate reduction, moving-average smoothing, and
//!   sigma-threshold spike detection
//!
//! ## Processing Flow
//!
//! ```text
//! raw hours → 26 h window (prev 23h | day | next 00h) → gap bridge
//!           → low-pass → resample → chop padding → [scale → rotate → scale]
//!           → DayRecord → .sec / rotation-trace artifacts
//! ```
//!
//! The window carries one hour of the neighbouring days so filter edge
//! transients land in the padding, which is chopped after rate reduction;
//! every finished day is therefore seamless against its neighbours.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use magpipe::{MagpipeConfig, MemoryReader, Pipeline};
//!
//! let config = MagpipeConfig::load().unwrap();
//! magpipe::observe::init_logging(&config.logging);
//!
//! // Any RawSampleReader works here; MemoryReader is the in-memory adapter.
//! let reader = MemoryReader::new();
//! let pipeline = Pipeline::from_config(&config);
//! let date = NaiveDate::from_ymd_opt(2020, 4, 25).unwrap();
//!
//! let record = pipeline.process_day(&reader, "LRE", date).unwrap();
//! let path = magpipe::artifact::write_day_record(&config.output.directory, &record).unwrap();
//! println!("wrote {} samples to {}", record.series.len(), path.display());
//! ```

pub mod artifact;
pub mod butterworth;
pub mod calibration_search;
pub mod config;
pub mod fft_utils;
pub mod fit_metric;
pub mod observe;
pub mod pipeline;
pub mod rate_of_change;
pub mod resampler;
pub mod rotation_solver;
pub mod series;
pub mod smoother;
pub mod spike_detector;
pub mod types;
pub mod vector_math;
pub mod window_assembler;

// Re-export main types
pub use config::{CalibrationSettings, MagpipeConfig, OutputSettings, PipelineSettings, ResamplePath};
pub use pipeline::{CalibrationSummary, DayOutcome, DayRecord, Pipeline};
pub use series::{ChannelMeans, GapSpan, ThreeAxisSeries};
pub use types::{MagError, MagResult, Sample};
pub use vector_math::{Mat3, OrientationSpec, Vec3};
pub use window_assembler::{assemble_day_window, DayWindow, FilledHour, MemoryReader, RawSampleReader};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::MagpipeConfig;
    pub use crate::pipeline::{DayOutcome, DayRecord, Pipeline};
    pub use crate::series::ThreeAxisSeries;
    pub use crate::types::{MagError, MagResult};
    pub use crate::window_assembler::{MemoryReader, RawSampleReader};
}
