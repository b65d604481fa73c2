//! Cross-day window assembly.
//!
//! Filtering and resampling smear whatever sits at the edges of their
//! input, so a day is conditioned inside a 26 hour window: the last hour
//! of the previous day, the 24 target hours, and the first hour of the
//! next day. The extra hours absorb the edge artifacts and are chopped
//! off after rate conversion, rescaled by however much the length changed
//! in between.
//!
//! Raw hours come from a [`RawSampleReader`]. A missing or corrupt hour
//! is logged and replaced by a NaN block of the expected length, so one
//! bad hour cannot sink the day. A day with no readable target hours at
//! all is refused as [`MagError::EmptyDay`].

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};

/// Source of raw per-hour sample fragments.
///
/// Implementations decode whatever the station actually records; the
/// assembler only relies on the error split. [`MagError::NotFound`] and
/// [`MagError::CorruptData`] are answered with gap fill, anything else
/// aborts the day.
pub trait RawSampleReader {
    /// Read one hour of three-axis samples for a station.
    fn read_hour(&self, station: &str, date: NaiveDate, hour: u32) -> MagResult<ThreeAxisSeries>;
}

/// One hour that had to be replaced by a NaN block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledHour {
    pub date: NaiveDate,
    pub hour: u32,
    /// True when the reader returned corrupt data rather than nothing.
    pub corrupt: bool,
}

/// A 26 hour window of raw samples around one target day.
#[derive(Debug, Clone)]
pub struct DayWindow {
    pub series: ThreeAxisSeries,
    /// Samples contributed by the previous day's last hour.
    pub lead_padding: usize,
    /// Samples contributed by the next day's first hour.
    pub trail_padding: usize,
    /// Hours that were gap-filled, in window order.
    pub filled: Vec<FilledHour>,
}

/// Pull the 26 hours around `date` from the reader and concatenate them
/// in chronological order.
///
/// Lead and trail padding record how many samples the neighbor-day hours
/// actually contributed; a gap-filled hour counts at the expected length
/// `round(3600 * source_rate_hz)`. Short fragments are taken as they come,
/// so the padding lengths are measurements, not assumptions.
pub fn assemble_day_window(
    reader: &dyn RawSampleReader,
    station: &str,
    date: NaiveDate,
    source_rate_hz: f64,
) -> MagResult<DayWindow> {
    if !source_rate_hz.is_finite() || source_rate_hz <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "source rate must be positive and finite, got {source_rate_hz}"
        )));
    }
    let prev = date.pred_opt().ok_or_else(|| {
        MagError::InvalidParameter(format!("no previous day exists before {date}"))
    })?;
    let next = date
        .succ_opt()
        .ok_or_else(|| MagError::InvalidParameter(format!("no next day exists after {date}")))?;

    let hour_len = (3600.0 * source_rate_hz).round() as usize;
    let mut series = ThreeAxisSeries::empty(source_rate_hz);
    let mut filled = Vec::new();

    let (lead_padding, _) =
        append_hour(reader, station, prev, 23, hour_len, &mut series, &mut filled)?;

    let mut live_target_hours = 0usize;
    for hour in 0..24 {
        let (_, live) =
            append_hour(reader, station, date, hour, hour_len, &mut series, &mut filled)?;
        if live {
            live_target_hours += 1;
        }
    }
    if live_target_hours == 0 {
        return Err(MagError::EmptyDay {
            station: station.to_string(),
            date,
        });
    }

    let (trail_padding, _) =
        append_hour(reader, station, next, 0, hour_len, &mut series, &mut filled)?;

    debug!(
        station,
        %date,
        len = series.len(),
        lead_padding,
        trail_padding,
        filled_hours = filled.len(),
        "assembled day window"
    );

    Ok(DayWindow {
        series,
        lead_padding,
        trail_padding,
        filled,
    })
}

/// Append one hour to the window, gap-filling on recoverable read faults.
/// Returns the number of samples appended and whether they are live data.
fn append_hour(
    reader: &dyn RawSampleReader,
    station: &str,
    date: NaiveDate,
    hour: u32,
    hour_len: usize,
    series: &mut ThreeAxisSeries,
    filled: &mut Vec<FilledHour>,
) -> MagResult<(usize, bool)> {
    match reader.read_hour(station, date, hour) {
        Ok(fragment) => {
            let appended = fragment.len();
            series.append(fragment)?;
            Ok((appended, true))
        }
        Err(err @ MagError::NotFound { .. }) => {
            warn!(station, %date, hour, "missing raw hour, filling with NaN: {}", err);
            series.append(ThreeAxisSeries::nans(hour_len, series.sample_rate_hz()))?;
            filled.push(FilledHour {
                date,
                hour,
                corrupt: false,
            });
            Ok((hour_len, false))
        }
        Err(err @ MagError::CorruptData { .. }) => {
            warn!(station, %date, hour, "corrupt raw hour, filling with NaN: {}", err);
            series.append(ThreeAxisSeries::nans(hour_len, series.sample_rate_hz()))?;
            filled.push(FilledHour {
                date,
                hour,
                corrupt: true,
            });
            Ok((hour_len, false))
        }
        Err(err) => Err(err),
    }
}

/// In-memory [`RawSampleReader`] keyed by `(date, hour)`.
///
/// One reader holds one station's archive; absent keys read back as
/// [`MagError::NotFound`] and stored errors are replayed on every read,
/// so recoverable faults can be staged deterministically. Real
/// deployments implement [`RawSampleReader`] over their instrument
/// format instead; this type is the reference adapter and the test
/// fixture.
#[derive(Debug, Default)]
pub struct MemoryReader {
    hours: HashMap<(NaiveDate, u32), Result<ThreeAxisSeries, MagError>>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one hour of raw samples.
    pub fn insert(&mut self, date: NaiveDate, hour: u32, series: ThreeAxisSeries) {
        self.hours.insert((date, hour), Ok(series));
    }

    /// Store a read fault to be returned for one hour.
    pub fn insert_error(&mut self, date: NaiveDate, hour: u32, error: MagError) {
        self.hours.insert((date, hour), Err(error));
    }

    /// Drop an hour, turning later reads into [`MagError::NotFound`].
    pub fn remove(&mut self, date: NaiveDate, hour: u32) {
        self.hours.remove(&(date, hour));
    }
}

impl RawSampleReader for MemoryReader {
    fn read_hour(&self, station: &str, date: NaiveDate, hour: u32) -> MagResult<ThreeAxisSeries> {
        match self.hours.get(&(date, hour)) {
            Some(entry) => entry.clone(),
            None => Err(MagError::NotFound {
                station: station.to_string(),
                date,
                hour,
            }),
        }
    }
}
