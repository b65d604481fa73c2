//! Day-level processing pipeline.
//!
//! One civil day is produced from a 26 hour raw window: the last hour of
//! the previous day, the 24 target hours, and the first hour of the next
//! day. The padding hours absorb filter edge transients and are chopped
//! off after rate reduction, so every output day is seamless against its
//! neighbours. Gaps in the raw window are bridged before filtering and
//! reported on the result so callers can mask them back out.

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::butterworth::low_pass_series;
use crate::calibration_search::{find_and_apply_best_rotation, find_and_apply_best_scale};
use crate::config::{CalibrationSettings, MagpipeConfig, PipelineSettings, ResamplePath};
use crate::resampler::{decimate_series, resample_series};
use crate::series::{GapSpan, ThreeAxisSeries};
use crate::types::{MagError, MagResult};
use crate::window_assembler::{assemble_day_window, DayWindow, FilledHour, RawSampleReader};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// What the orientation calibration did to one day.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSummary {
    /// Declination/inclination/ancillary rotation found, radians.
    pub angles: [f64; 3],
    /// Residual against the reference at the found rotation.
    pub accuracy: f64,
    /// Residual before any rotation was applied.
    pub initial_accuracy: f64,
    /// Per-axis factors applied after the rotation.
    pub scales: [f64; 3],
}

/// One finished day of conditioned data plus its processing record.
///
/// `series` holds the day at the output rate with the time axis rebuilt
/// to seconds since midnight and the total field attached. Bridged raw
/// gaps are listed in `gap_spans` at source resolution; callers that do
/// not want interpolated samples in the product can rescale the spans
/// and mask them out again.
#[derive(Debug, Clone)]
pub struct DayRecord {
    pub station: String,
    pub date: NaiveDate,
    pub series: ThreeAxisSeries,
    /// Raw-window sample runs that were bridged before filtering.
    pub gap_spans: Vec<GapSpan>,
    /// Hours the reader could not supply and the assembler filled.
    pub filled_hours: Vec<FilledHour>,
    /// Present when the day was calibrated against a reference.
    pub calibration: Option<CalibrationSummary>,
}

/// Outcome of one day inside a multi-day run.
#[derive(Debug, Clone)]
pub enum DayOutcome {
    Processed(DayRecord),
    Failed {
        station: String,
        date: NaiveDate,
        error: MagError,
    },
}

impl DayOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, DayOutcome::Processed(_))
    }

    /// The finished record, if the day produced one.
    pub fn record(&self) -> Option<&DayRecord> {
        match self {
            DayOutcome::Processed(record) => Some(record),
            DayOutcome::Failed { .. } => None,
        }
    }
}

/// Stateless day processor configured once and reused across days.
#[derive(Debug, Clone)]
pub struct Pipeline {
    settings: PipelineSettings,
    calibration: CalibrationSettings,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, calibration: CalibrationSettings) -> Self {
        Self {
            settings,
            calibration,
        }
    }

    pub fn from_config(config: &MagpipeConfig) -> Self {
        Self::new(config.pipeline.clone(), config.calibration.clone())
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Produce one day without orientation calibration.
    pub fn process_day(
        &self,
        reader: &dyn RawSampleReader,
        station: &str,
        date: NaiveDate,
    ) -> MagResult<DayRecord> {
        self.process(reader, station, date, None)
    }

    /// Produce one day calibrated against `reference`.
    ///
    /// The reference must already be at the output rate and day length;
    /// the calibration derotates first and matches per-axis amplitude
    /// second, each search minimizing its residual against the reference.
    pub fn process_day_with_reference(
        &self,
        reader: &dyn RawSampleReader,
        station: &str,
        date: NaiveDate,
        reference: &ThreeAxisSeries,
    ) -> MagResult<DayRecord> {
        self.process(reader, station, date, Some(reference))
    }

    /// Process every day from `first` to `last` inclusive.
    ///
    /// Failures are logged and recorded per day; one bad day never stops
    /// the run. Recoverable faults (missing or corrupt raw data) log at
    /// warn, everything else at error.
    pub fn process_range(
        &self,
        reader: &dyn RawSampleReader,
        station: &str,
        first: NaiveDate,
        last: NaiveDate,
    ) -> MagResult<Vec<DayOutcome>> {
        if last < first {
            return Err(MagError::InvalidParameter(format!(
                "day range ends {last} before it starts {first}"
            )));
        }

        let mut outcomes = Vec::new();
        let mut date = first;
        loop {
            match self.process_day(reader, station, date) {
                Ok(record) => outcomes.push(DayOutcome::Processed(record)),
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(station, %date, "skipping day: {}", e);
                    } else {
                        error!(station, %date, "day failed: {}", e);
                    }
                    outcomes.push(DayOutcome::Failed {
                        station: station.to_string(),
                        date,
                        error: e,
                    });
                }
            }
            if date == last {
                break;
            }
            date = date.succ_opt().ok_or_else(|| {
                MagError::InvalidParameter(format!("no day follows {date} in the calendar"))
            })?;
        }
        Ok(outcomes)
    }

    fn process(
        &self,
        reader: &dyn RawSampleReader,
        station: &str,
        date: NaiveDate,
        reference: Option<&ThreeAxisSeries>,
    ) -> MagResult<DayRecord> {
        let DayWindow {
            mut series,
            lead_padding,
            trail_padding,
            filled,
        } = assemble_day_window(reader, station, date, self.settings.source_rate_hz)?;

        let len_before = series.len();
        let gap_spans = series.bridge_nan_runs();
        if gap_spans.iter().any(|span| span.len == len_before) {
            // every sample in the window is non-finite
            return Err(MagError::EmptyDay {
                station: station.to_string(),
                date,
            });
        }

        let target_len = (len_before as f64 * self.settings.output_rate_hz
            / self.settings.source_rate_hz)
            .round() as usize;
        if target_len == 0 {
            return Err(MagError::InvalidParameter(format!(
                "rate reduction {} Hz -> {} Hz leaves no samples in a {len_before} sample window",
                self.settings.source_rate_hz, self.settings.output_rate_hz
            )));
        }

        let mut series = match self.settings.resample_path {
            ResamplePath::Spectral => {
                low_pass_series(&mut series, self.settings.cutoff_hz, self.settings.filter_order)?;
                resample_series(&series, target_len)?
            }
            ResamplePath::Decimate => decimate_series(
                &series,
                self.settings.cutoff_hz,
                target_len,
                self.settings.filter_order,
            )?,
        };

        // Padding hours shrink with the series; chop what is left of them.
        let ratio = series.len() as f64 / len_before as f64;
        let lead = (lead_padding as f64 * ratio).round() as usize;
        let trail = (trail_padding as f64 * ratio).round() as usize;
        series.chop(lead, trail)?;
        series.rebuild_time_axis(0.0);

        let day_len = (SECONDS_PER_DAY * self.settings.output_rate_hz).round() as usize;
        if series.len() != day_len {
            warn!(
                station,
                %date,
                len = series.len(),
                expected = day_len,
                "day record length off nominal"
            );
        }

        let calibration = match reference {
            Some(reference) => Some(self.calibrate(&mut series, reference)?),
            None => None,
        };

        series.compute_total_field();

        info!(
            station,
            %date,
            len = series.len(),
            gaps = gap_spans.len(),
            filled_hours = filled.len(),
            calibrated = calibration.is_some(),
            "day processed"
        );

        Ok(DayRecord {
            station: station.to_string(),
            date,
            series,
            gap_spans,
            filled_hours: filled,
            calibration,
        })
    }

    /// The rotation must run before the scale match. Until the series is
    /// derotated, every channel of the reference carries cross-axis
    /// mixtures, and the range objective will absorb those into anisotropic
    /// per-axis scales; applied against the full field (baseline included)
    /// such scales shift the channel baselines far enough that no rotation
    /// can recover alignment afterwards.
    fn calibrate(
        &self,
        series: &mut ThreeAxisSeries,
        reference: &ThreeAxisSeries,
    ) -> MagResult<CalibrationSummary> {
        let rotation =
            find_and_apply_best_rotation(series, reference, &self.calibration.angle_search())?;
        let scale =
            find_and_apply_best_scale(series, reference, &self.calibration.scale_search())?;

        Ok(CalibrationSummary {
            angles: rotation.angles,
            accuracy: rotation.accuracy,
            initial_accuracy: rotation.initial_accuracy,
            scales: scale.scales,
        })
    }
}
