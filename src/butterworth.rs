//! Butterworth low-pass design and zero-phase application.
//!
//! The filter is built as a cascade of biquad sections (one per pole pair)
//! for numerical stability at the orders and the very low normalized
//! cutoffs this pipeline runs at, e.g. 0.5 Hz against a 100 Hz stream.
//! Anti-alias filtering ahead of resampling must not shift features in
//! time, so the public entry point runs the cascade forward and backward
//! over the channel (zero-phase) with a short odd-reflection padding at
//! each edge.
//!
//! Pushing the order too high collapses the cascade toward an all-zero
//! output instead of failing loudly; the result is therefore energy-checked
//! and reported as [`MagError::FilterDegeneracy`] rather than trusted.

use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::debug;

use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};

/// Samples of odd-reflection padding added at each edge before the
/// forward-backward pass.
pub const EDGE_PAD: usize = 10;

const MAX_ORDER: usize = 20;

/// Output energy below this fraction of the input energy counts as
/// collapsed.
const DEGENERACY_RATIO: f64 = 1e-12;

/// A single second-order section.
///
/// Transfer function `H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)`,
/// evaluated in Direct Form II Transposed.
#[derive(Debug, Clone)]
pub struct Biquad {
    /// Numerator coefficients [b0, b1, b2].
    b: [f64; 3],
    /// Denominator coefficients [a1, a2], a0 normalized to 1.
    a: [f64; 2],
    state: [f64; 2],
}

impl Biquad {
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self {
            b,
            a,
            state: [0.0; 2],
        }
    }

    /// A pass-through (unity gain) section.
    pub fn unity() -> Self {
        Self::new([1.0, 0.0, 0.0], [0.0, 0.0])
    }

    /// Process a single sample.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.state[0];
        self.state[0] = self.b[1] * input - self.a[0] * output + self.state[1];
        self.state[1] = self.b[2] * input - self.a[1] * output;
        output
    }

    /// Clear the delay line.
    pub fn reset(&mut self) {
        self.state = [0.0; 2];
    }

    /// Preload the state as if the section had been fed `level` forever.
    ///
    /// The low-pass sections designed below have unity DC gain, so after
    /// settling the first output equals `level` exactly. This is what lets
    /// the zero-phase pass get away with a short edge padding.
    pub fn settle(&mut self, level: f64) {
        let denom = 1.0 + self.a[0] + self.a[1];
        if denom.abs() < f64::EPSILON {
            self.reset();
            return;
        }
        let output = level * (self.b[0] + self.b[1] + self.b[2]) / denom;
        self.state[1] = self.b[2] * level - self.a[1] * output;
        self.state[0] = self.b[1] * level - self.a[0] * output + self.state[1];
    }

    /// True when both poles sit inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }
}

/// Butterworth low-pass as a cascade of biquad sections.
#[derive(Debug, Clone)]
pub struct ButterworthLowPass {
    sections: Vec<Biquad>,
    order: usize,
    cutoff_hz: f64,
    sample_rate_hz: f64,
}

impl ButterworthLowPass {
    /// Design a low-pass of the given order with `cutoff_hz` as the −3 dB
    /// point, via analog prototype poles and the bilinear transform with
    /// frequency prewarping.
    pub fn design(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> MagResult<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(MagError::InvalidParameter(format!(
                "filter order must be 1..={MAX_ORDER}, got {order}"
            )));
        }
        if !sample_rate_hz.is_finite() || sample_rate_hz <= 0.0 {
            return Err(MagError::InvalidParameter(format!(
                "sample rate must be positive and finite, got {sample_rate_hz}"
            )));
        }
        if !cutoff_hz.is_finite() || cutoff_hz <= 0.0 || cutoff_hz >= sample_rate_hz / 2.0 {
            return Err(MagError::InvalidParameter(format!(
                "cutoff must sit strictly between 0 and the Nyquist frequency {} Hz, got {cutoff_hz} Hz",
                sample_rate_hz / 2.0
            )));
        }

        let wc = prewarp(cutoff_hz, sample_rate_hz);
        let sections = poles_to_biquads(&butterworth_poles(order), wc, sample_rate_hz);
        Ok(Self {
            sections,
            order,
            cutoff_hz,
            sample_rate_hz,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    /// Number of biquad sections in the cascade.
    pub fn num_sections(&self) -> usize {
        self.sections.len()
    }

    /// True when every section is stable.
    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(|s| s.is_stable())
    }

    /// Process one sample through the cascade.
    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let mut output = input;
        for section in &mut self.sections {
            output = section.process(output);
        }
        output
    }

    /// Clear every section's delay line.
    pub fn reset(&mut self) {
        for section in &mut self.sections {
            section.reset();
        }
    }

    /// Settle every section at a constant input level. Each section has
    /// unity DC gain, so the level carries through the cascade unchanged.
    fn settle(&mut self, level: f64) {
        for section in &mut self.sections {
            section.settle(level);
        }
    }

    /// Complex frequency response `H(e^{jω})` at `freq_hz`.
    pub fn frequency_response(&self, freq_hz: f64) -> Complex64 {
        let omega = 2.0 * PI * freq_hz / self.sample_rate_hz;
        let z_inv = Complex64::new(omega.cos(), -omega.sin());
        let z_inv2 = z_inv * z_inv;

        let mut response = Complex64::new(1.0, 0.0);
        for section in &self.sections {
            let num = section.b[0] + section.b[1] * z_inv + section.b[2] * z_inv2;
            let den = 1.0 + section.a[0] * z_inv + section.a[1] * z_inv2;
            response *= num / den;
        }
        response
    }

    /// Magnitude response in dB at `freq_hz`.
    pub fn magnitude_response_db(&self, freq_hz: f64) -> f64 {
        20.0 * self.frequency_response(freq_hz).norm().log10()
    }
}

/// Zero-phase Butterworth low-pass of one channel.
///
/// Designs the filter, runs it forward and backward over the channel with
/// [`EDGE_PAD`] samples of odd-reflection padding at each end, and trims
/// the padding off again, so the output carries no phase lag relative to
/// the input. The cutoff is taken against the Nyquist frequency
/// `source_rate / 2`. Gaps must be bridged first: a NaN anywhere poisons
/// the recursive state from that sample on.
pub fn low_pass_filter(
    data: &[f64],
    cutoff_hz: f64,
    source_rate_hz: f64,
    order: usize,
) -> MagResult<Vec<f64>> {
    let mut filter = ButterworthLowPass::design(order, cutoff_hz, source_rate_hz)?;
    if data.len() <= EDGE_PAD {
        return Err(MagError::InvalidParameter(format!(
            "zero-phase filtering needs more than {EDGE_PAD} samples, got {}",
            data.len()
        )));
    }

    let output = filtfilt(&mut filter, data);
    check_energy(data, &output)?;
    debug!(
        order,
        cutoff_hz,
        source_rate_hz,
        len = output.len(),
        "applied zero-phase low-pass"
    );
    Ok(output)
}

/// Zero-phase low-pass of the x, y, z channels in place.
///
/// The total-field channel, when present, is recomputed from the filtered
/// components rather than filtered itself.
pub fn low_pass_series(
    series: &mut ThreeAxisSeries,
    cutoff_hz: f64,
    order: usize,
) -> MagResult<()> {
    let rate = series.sample_rate_hz();
    series.x = low_pass_filter(series.x(), cutoff_hz, rate, order)?;
    series.y = low_pass_filter(series.y(), cutoff_hz, rate, order)?;
    series.z = low_pass_filter(series.z(), cutoff_hz, rate, order)?;
    if series.f.is_some() {
        series.compute_total_field();
    }
    Ok(())
}

fn filtfilt(filter: &mut ButterworthLowPass, data: &[f64]) -> Vec<f64> {
    let mut ext = odd_extend(data, EDGE_PAD);

    filter.settle(ext[0]);
    for v in ext.iter_mut() {
        *v = filter.process(*v);
    }

    ext.reverse();
    filter.settle(ext[0]);
    for v in ext.iter_mut() {
        *v = filter.process(*v);
    }
    ext.reverse();

    ext[EDGE_PAD..ext.len() - EDGE_PAD].to_vec()
}

/// Extend the channel by `pad` samples of odd reflection at each end:
/// `2·x[0] − x[pad..1]` in front, mirrored likewise behind.
fn odd_extend(data: &[f64], pad: usize) -> Vec<f64> {
    let n = data.len();
    let mut ext = Vec::with_capacity(n + 2 * pad);
    let first = data[0];
    for i in (1..=pad).rev() {
        ext.push(2.0 * first - data[i]);
    }
    ext.extend_from_slice(data);
    let last = data[n - 1];
    for i in 1..=pad {
        ext.push(2.0 * last - data[n - 1 - i]);
    }
    ext
}

fn energy(data: &[f64]) -> f64 {
    data.iter().filter(|v| v.is_finite()).map(|v| v * v).sum()
}

fn check_energy(input: &[f64], output: &[f64]) -> MagResult<()> {
    let in_energy = energy(input);
    let out_energy = energy(output);
    if in_energy > 0.0 && out_energy <= in_energy * DEGENERACY_RATIO {
        return Err(MagError::FilterDegeneracy {
            in_energy,
            out_energy,
        });
    }
    Ok(())
}

/// Prewarp a frequency for the bilinear transform.
fn prewarp(freq_hz: f64, sample_rate: f64) -> f64 {
    2.0 * sample_rate * (PI * freq_hz / sample_rate).tan()
}

/// Butterworth analog prototype poles on the left half of the s-plane unit
/// circle.
fn butterworth_poles(order: usize) -> Vec<Complex64> {
    let mut poles = Vec::with_capacity(order);
    for k in 0..order {
        let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
        poles.push(Complex64::new(theta.cos(), theta.sin()));
    }
    poles
}

/// Convert analog prototype poles to digital biquads via the bilinear
/// transform. Complex poles consume two slots per section; the section
/// covers the pole's conjugate pair through its real part and magnitude.
fn poles_to_biquads(poles: &[Complex64], wc: f64, sample_rate: f64) -> Vec<Biquad> {
    let k = 2.0 * sample_rate;
    let mut sections = Vec::new();

    let mut i = 0;
    while i < poles.len() {
        if poles[i].im.abs() < 1e-10 {
            let (b, a) = bilinear_1pole(poles[i].re * wc, k);
            sections.push(Biquad::new(b, a));
            i += 1;
        } else {
            let (b, a) = bilinear_2pole(poles[i] * wc, k);
            sections.push(Biquad::new(b, a));
            i += 2;
        }
    }

    sections
}

/// Bilinear transform of `H(s) = −p / (s − p)` for a single real pole.
fn bilinear_1pole(p: f64, k: f64) -> ([f64; 3], [f64; 2]) {
    let alpha = k - p;
    let beta = k + p;
    let b0 = -p / alpha;
    ([b0, b0, 0.0], [-beta / alpha, 0.0])
}

/// Bilinear transform of `H(s) = |p|² / (s² − 2·Re(p)·s + |p|²)` for a
/// complex conjugate pole pair.
fn bilinear_2pole(p: Complex64, k: f64) -> ([f64; 3], [f64; 2]) {
    let p_mag_sq = p.norm_sqr();
    let k2 = k * k;
    let d = k2 - 2.0 * k * p.re + p_mag_sq;

    let b0 = p_mag_sq / d;
    let b = [b0, 2.0 * b0, b0];
    let a = [
        2.0 * (p_mag_sq - k2) / d,
        (k2 + 2.0 * k * p.re + p_mag_sq) / d,
    ];
    (b, a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_biquad_unity_passthrough() {
        let mut bq = Biquad::unity();
        for &v in &[1.0, -3.5, 0.0, 7.25] {
            assert_relative_eq!(bq.process(v), v);
        }
    }

    #[test]
    fn test_biquad_stability_conditions() {
        assert!(Biquad::new([1.0, 0.0, 0.0], [0.5, 0.2]).is_stable());
        assert!(!Biquad::new([1.0, 0.0, 0.0], [2.0, 0.5]).is_stable());
    }

    #[test]
    fn test_design_rejects_bad_parameters() {
        assert!(ButterworthLowPass::design(0, 1.0, 100.0).is_err());
        assert!(ButterworthLowPass::design(21, 1.0, 100.0).is_err());
        assert!(ButterworthLowPass::design(5, 0.0, 100.0).is_err());
        assert!(ButterworthLowPass::design(5, 50.0, 100.0).is_err());
        assert!(ButterworthLowPass::design(5, 60.0, 100.0).is_err());
        assert!(ButterworthLowPass::design(5, 1.0, 0.0).is_err());
    }

    #[test]
    fn test_design_shape_and_stability() {
        let even = ButterworthLowPass::design(4, 1.0, 100.0).unwrap();
        assert_eq!(even.num_sections(), 2);
        assert!(even.is_stable());

        let odd = ButterworthLowPass::design(5, 0.5, 100.0).unwrap();
        assert_eq!(odd.num_sections(), 3);
        assert!(odd.is_stable());
    }

    #[test]
    fn test_dc_gain_is_unity() {
        let filter = ButterworthLowPass::design(5, 0.5, 100.0).unwrap();
        assert!(filter.magnitude_response_db(0.0).abs() < 1e-9);
    }

    #[test]
    fn test_cutoff_sits_three_db_down() {
        // Prewarping makes the −3 dB point land exactly on the cutoff.
        let filter = ButterworthLowPass::design(5, 10.0, 100.0).unwrap();
        assert_relative_eq!(
            filter.magnitude_response_db(10.0),
            -3.0102999566398,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_stopband_attenuation() {
        let filter = ButterworthLowPass::design(5, 5.0, 100.0).unwrap();
        assert!(filter.magnitude_response_db(25.0) < -60.0);
        assert!(filter.magnitude_response_db(45.0) < -100.0);
    }

    #[test]
    fn test_settle_removes_dc_transient() {
        let mut filter = ButterworthLowPass::design(3, 1.0, 100.0).unwrap();
        filter.settle(2.5);
        for _ in 0..20 {
            assert_relative_eq!(filter.process(2.5), 2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_phase_preserves_constant() {
        let data = vec![42.0; 64];
        let out = low_pass_filter(&data, 5.0, 100.0, 5).unwrap();
        assert_eq!(out.len(), 64);
        for &v in &out {
            assert_relative_eq!(v, 42.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_phase_keeps_slow_component_in_place() {
        let n = 400;
        let rate = 100.0;
        let slow: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 0.5 * i as f64 / rate).sin())
            .collect();
        let noisy: Vec<f64> = slow
            .iter()
            .enumerate()
            .map(|(i, &s)| s + 0.5 * (2.0 * PI * 30.0 * i as f64 / rate).sin())
            .collect();

        let out = low_pass_filter(&noisy, 5.0, rate, 5).unwrap();
        assert_eq!(out.len(), n);
        // Away from the edges the output tracks the slow component with no
        // lag; the forward-backward pass cancels the phase shift.
        for i in 50..n - 50 {
            assert!(
                (out[i] - slow[i]).abs() < 0.01,
                "sample {i}: {} vs {}",
                out[i],
                slow[i]
            );
        }
    }

    #[test]
    fn test_energy_collapse_detection() {
        let input = vec![1.0; 100];
        let collapsed = vec![0.0; 100];
        assert!(matches!(
            check_energy(&input, &collapsed),
            Err(MagError::FilterDegeneracy { .. })
        ));
        assert!(check_energy(&input, &input).is_ok());
        // A silent channel in and out is not degeneracy.
        assert!(check_energy(&collapsed, &collapsed).is_ok());
    }

    #[test]
    fn test_short_input_rejected() {
        let data = vec![1.0; EDGE_PAD];
        assert!(low_pass_filter(&data, 1.0, 100.0, 5).is_err());
    }

    #[test]
    fn test_series_filter_recomputes_total_field() {
        let n = 200;
        let mut series = ThreeAxisSeries::from_channels(
            (0..n).map(|i| 30.0 + (0.8 * i as f64).sin()).collect(),
            vec![40.0; n],
            (0..n).map(|i| 20.0 + (0.9 * i as f64).cos()).collect(),
            (0..n).map(|i| i as f64 / 100.0).collect(),
            100.0,
        )
        .unwrap();
        series.compute_total_field();

        low_pass_series(&mut series, 2.0, 5).unwrap();
        let f = series.f().expect("total field should survive filtering");
        for i in 0..n {
            let norm = (series.x()[i].powi(2) + series.y()[i].powi(2) + series.z()[i].powi(2))
                .sqrt();
            assert_relative_eq!(f[i], norm, epsilon = 1e-9);
        }
    }
}
