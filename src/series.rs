//! In-memory representation of a three-axis magnetometer record.
//!
//! A [`ThreeAxisSeries`] holds the X/Y/Z channels, an optional total-field
//! channel, and a time axis in seconds, all sampled at one fixed rate. The
//! channel vectors always share a single length; constructors and mutators
//! preserve that invariant. Missing stretches are carried as NaN samples
//! and reported as [`GapSpan`]s so the conditioning stages can bridge them
//! before filtering and restore them afterwards.

use tracing::debug;

use crate::types::{MagError, MagResult};

/// A contiguous run of missing samples, by start index and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapSpan {
    pub start: usize,
    pub len: usize,
}

/// Per-channel arithmetic means removed by [`ThreeAxisSeries::remove_mean`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMeans {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub f: Option<f64>,
}

/// A fixed-rate three-axis record with optional total field.
#[derive(Debug, Clone)]
pub struct ThreeAxisSeries {
    pub(crate) x: Vec<f64>,
    pub(crate) y: Vec<f64>,
    pub(crate) z: Vec<f64>,
    pub(crate) f: Option<Vec<f64>>,
    pub(crate) time: Vec<f64>,
    pub(crate) sample_rate_hz: f64,
}

impl ThreeAxisSeries {
    /// Build a series from the three field channels and a time axis.
    ///
    /// All four vectors must share one length and the rate must be positive
    /// and finite.
    pub fn from_channels(
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        time: Vec<f64>,
        sample_rate_hz: f64,
    ) -> MagResult<Self> {
        Self::from_components(x, y, z, None, time, sample_rate_hz)
    }

    /// Build a series that also carries a measured total-field channel.
    pub fn from_components(
        x: Vec<f64>,
        y: Vec<f64>,
        z: Vec<f64>,
        f: Option<Vec<f64>>,
        time: Vec<f64>,
        sample_rate_hz: f64,
    ) -> MagResult<Self> {
        if x.len() != y.len() || x.len() != z.len() || x.len() != time.len() {
            return Err(MagError::ChannelMismatch {
                x: x.len(),
                y: y.len(),
                z: z.len(),
                time: time.len(),
            });
        }
        if let Some(ref total) = f {
            if total.len() != x.len() {
                return Err(MagError::LengthMismatch {
                    expected: x.len(),
                    got: total.len(),
                });
            }
        }
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(MagError::InvalidParameter(format!(
                "sample rate must be positive and finite, got {sample_rate_hz}"
            )));
        }
        Ok(Self {
            x,
            y,
            z,
            f,
            time,
            sample_rate_hz,
        })
    }

    /// An empty series at the given rate, ready to [`append`](Self::append)
    /// into.
    pub fn empty(sample_rate_hz: f64) -> Self {
        Self {
            x: Vec::new(),
            y: Vec::new(),
            z: Vec::new(),
            f: None,
            time: Vec::new(),
            sample_rate_hz,
        }
    }

    /// An all-NaN placeholder of `len` samples, used to stand in for a
    /// missing block of raw data. The time axis counts up from zero.
    pub fn nans(len: usize, sample_rate_hz: f64) -> Self {
        let step = 1.0 / sample_rate_hz;
        Self {
            x: vec![f64::NAN; len],
            y: vec![f64::NAN; len],
            z: vec![f64::NAN; len],
            f: None,
            time: (0..len).map(|i| i as f64 * step).collect(),
            sample_rate_hz,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// True when the series holds no samples.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Sample rate in hertz.
    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// X channel.
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Y channel.
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Z channel.
    pub fn z(&self) -> &[f64] {
        &self.z
    }

    /// Total-field channel, when present.
    pub fn f(&self) -> Option<&[f64]> {
        self.f.as_deref()
    }

    /// Time axis in seconds.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    /// Recompute the total field as `sqrt(x² + y² + z²)` per sample,
    /// replacing any measured channel. NaN components yield NaN totals.
    pub fn compute_total_field(&mut self) {
        let total = self
            .x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .map(|((&x, &y), &z)| (x * x + y * y + z * z).sqrt())
            .collect();
        self.f = Some(total);
    }

    /// Subtract each channel's arithmetic mean in place and return the
    /// removed means.
    ///
    /// Non-finite samples are excluded from the mean and left untouched,
    /// so NaN gaps survive the operation. A channel with no finite samples
    /// reports a NaN mean.
    pub fn remove_mean(&mut self) -> ChannelMeans {
        let means = ChannelMeans {
            x: subtract_finite_mean(&mut self.x),
            y: subtract_finite_mean(&mut self.y),
            z: subtract_finite_mean(&mut self.z),
            f: self.f.as_mut().map(|f| subtract_finite_mean(f)),
        };
        match means.f {
            Some(f) => debug!(
                "removed channel means x={:.2} y={:.2} z={:.2} f={:.2}",
                means.x, means.y, means.z, f
            ),
            None => debug!(
                "removed channel means x={:.2} y={:.2} z={:.2}",
                means.x, means.y, means.z
            ),
        }
        means
    }

    /// Drop `lead` samples from the front and `trail` from the back of
    /// every channel.
    pub fn chop(&mut self, lead: usize, trail: usize) -> MagResult<()> {
        let n = self.len();
        if lead + trail > n {
            return Err(MagError::InvalidParameter(format!(
                "cannot chop {lead} leading and {trail} trailing samples from a series of {n}"
            )));
        }
        chop_channel(&mut self.x, lead, trail);
        chop_channel(&mut self.y, lead, trail);
        chop_channel(&mut self.z, lead, trail);
        chop_channel(&mut self.time, lead, trail);
        if let Some(ref mut f) = self.f {
            chop_channel(f, lead, trail);
        }
        Ok(())
    }

    /// Copy out the samples covering hours `start_hour..end_hour` of the
    /// series, counting whole hours from its first sample.
    pub fn hour_range(&self, start_hour: usize, end_hour: usize) -> MagResult<ThreeAxisSeries> {
        if end_hour <= start_hour {
            return Err(MagError::InvalidParameter(format!(
                "hour range {start_hour}..{end_hour} is empty"
            )));
        }
        let per_hour = (self.sample_rate_hz * 3600.0).round() as usize;
        let a = start_hour * per_hour;
        let b = end_hour * per_hour;
        if b > self.len() {
            return Err(MagError::InvalidParameter(format!(
                "hour range {start_hour}..{end_hour} needs {b} samples but the series has {}",
                self.len()
            )));
        }
        Ok(Self {
            x: self.x[a..b].to_vec(),
            y: self.y[a..b].to_vec(),
            z: self.z[a..b].to_vec(),
            f: self.f.as_ref().map(|f| f[a..b].to_vec()),
            time: self.time[a..b].to_vec(),
            sample_rate_hz: self.sample_rate_hz,
        })
    }

    /// Concatenate `other` onto the end of this series.
    ///
    /// The rates must match. When only one side carries a total-field
    /// channel the other side contributes NaN there, so measured totals
    /// are never silently dropped.
    pub fn append(&mut self, other: ThreeAxisSeries) -> MagResult<()> {
        if (self.sample_rate_hz - other.sample_rate_hz).abs() > f64::EPSILON {
            return Err(MagError::InvalidParameter(format!(
                "cannot append a series sampled at {} Hz to one at {} Hz",
                other.sample_rate_hz, self.sample_rate_hz
            )));
        }
        let old_len = self.len();
        let added = other.len();
        self.f = match (self.f.take(), other.f) {
            (Some(mut a), Some(b)) => {
                a.extend(b);
                Some(a)
            }
            (Some(mut a), None) => {
                a.extend(std::iter::repeat(f64::NAN).take(added));
                Some(a)
            }
            (None, Some(b)) => {
                let mut a = vec![f64::NAN; old_len];
                a.extend(b);
                Some(a)
            }
            (None, None) => None,
        };
        self.x.extend(other.x);
        self.y.extend(other.y);
        self.z.extend(other.z);
        self.time.extend(other.time);
        Ok(())
    }

    /// Rewrite the time axis as `start_s + i / rate`.
    pub fn rebuild_time_axis(&mut self, start_s: f64) {
        let step = 1.0 / self.sample_rate_hz;
        for (i, t) in self.time.iter_mut().enumerate() {
            *t = start_s + i as f64 * step;
        }
    }

    /// Replace every NaN run with values interpolated from the finite
    /// samples on either side, returning the runs that were bridged.
    ///
    /// A sample counts as missing when any of x, y, or z is non-finite;
    /// the total-field channel is bridged over the same runs but does not
    /// trigger them. Runs touching an edge hold the nearest finite value.
    /// A series with no finite samples at all is returned unchanged, as a
    /// single spanning gap.
    pub fn bridge_nan_runs(&mut self) -> Vec<GapSpan> {
        let n = self.len();
        let mut spans = Vec::new();
        let mut i = 0;
        while i < n {
            if self.sample_is_finite(i) {
                i += 1;
                continue;
            }
            let start = i;
            while i < n && !self.sample_is_finite(i) {
                i += 1;
            }
            spans.push(GapSpan {
                start,
                len: i - start,
            });
        }
        if spans.len() == 1 && spans[0].len == n {
            return spans;
        }
        for span in &spans {
            bridge_channel(&mut self.x, *span);
            bridge_channel(&mut self.y, *span);
            bridge_channel(&mut self.z, *span);
            if let Some(ref mut f) = self.f {
                bridge_channel(f, *span);
            }
        }
        if !spans.is_empty() {
            let total: usize = spans.iter().map(|s| s.len).sum();
            debug!("bridged {} gap runs covering {} samples", spans.len(), total);
        }
        spans
    }

    /// Write NaN back over the given spans on every channel. Spans are
    /// clamped to the series bounds.
    pub fn mask_gaps(&mut self, spans: &[GapSpan]) {
        let n = self.len();
        for span in spans {
            let a = span.start.min(n);
            let b = (span.start + span.len).min(n);
            for i in a..b {
                self.x[i] = f64::NAN;
                self.y[i] = f64::NAN;
                self.z[i] = f64::NAN;
                if let Some(ref mut f) = self.f {
                    f[i] = f64::NAN;
                }
            }
        }
    }

    /// Mean field vector `[x̄, ȳ, z̄]` over the samples where all three
    /// components are finite.
    pub fn mean_vector(&self) -> MagResult<[f64; 3]> {
        let mut sums = [0.0; 3];
        let mut count = 0usize;
        for i in 0..self.len() {
            if self.sample_is_finite(i) {
                sums[0] += self.x[i];
                sums[1] += self.y[i];
                sums[2] += self.z[i];
                count += 1;
            }
        }
        if count == 0 {
            return Err(MagError::InvalidParameter(
                "cannot average a series with no finite samples".to_string(),
            ));
        }
        let c = count as f64;
        Ok([sums[0] / c, sums[1] / c, sums[2] / c])
    }

    fn sample_is_finite(&self, i: usize) -> bool {
        self.x[i].is_finite() && self.y[i].is_finite() && self.z[i].is_finite()
    }
}

fn chop_channel(v: &mut Vec<f64>, lead: usize, trail: usize) {
    v.truncate(v.len() - trail);
    v.drain(..lead);
}

fn subtract_finite_mean(data: &mut [f64]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &v in data.iter() {
        if v.is_finite() {
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return f64::NAN;
    }
    let mean = sum / count as f64;
    for v in data.iter_mut() {
        if v.is_finite() {
            *v -= mean;
        }
    }
    mean
}

/// Linear interpolation across one missing run. The run is maximal, so the
/// neighbors just outside it are finite; an edge run holds its single
/// neighbor instead.
fn bridge_channel(data: &mut [f64], span: GapSpan) {
    let n = data.len();
    let right_idx = span.start + span.len;
    let left = span.start.checked_sub(1).map(|i| data[i]);
    let right = if right_idx < n {
        Some(data[right_idx])
    } else {
        None
    };
    match (left, right) {
        (Some(a), Some(b)) => {
            let steps = (span.len + 1) as f64;
            for k in 0..span.len {
                data[span.start + k] = a + (b - a) * (k + 1) as f64 / steps;
            }
        }
        (Some(a), None) => {
            for k in 0..span.len {
                data[span.start + k] = a;
            }
        }
        (None, Some(b)) => {
            for k in 0..span.len {
                data[span.start + k] = b;
            }
        }
        (None, None) => {}
    }
}
