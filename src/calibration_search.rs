//! Coordinate-descent searches for the best orientation and scale.
//!
//! Both searches share one shape: try a step up and a step down on one
//! variable, adopt whichever strictly improves the objective, and halve the
//! step once a full pass changes nothing. The step keeps halving until it
//! drops below a small epsilon. This is greedy per-variable descent, not a
//! global optimizer; it can settle in a local minimum, which is accepted
//! behavior here.
//!
//! The rotation search walks all three Euler angles through shared passes.
//! The scale search runs each axis to its own convergence independently,
//! with an offset-insensitive range objective.

use tracing::{debug, info};

use crate::fit_metric::rotated_residual;
use crate::series::ThreeAxisSeries;
use crate::types::{MagError, MagResult};
use crate::vector_math::rotation_from_angles;

/// Tunables for the rotation-angle search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSearchConfig {
    /// First step applied to each angle, radians.
    pub initial_step: f64,
    /// The search stops once the step drops below this, radians.
    pub epsilon: f64,
    /// Remove per-channel means from working copies of both series before
    /// searching, so a constant sensor bias cannot masquerade as a
    /// rotation error. The returned angles still apply to the raw series.
    pub remove_bias: bool,
}

impl Default for AngleSearchConfig {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            epsilon: 1e-7,
            remove_bias: false,
        }
    }
}

/// Outcome of [`find_best_rotation_angles`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSearchResult {
    /// Best declination/inclination/ancillary triplet found, radians.
    pub angles: [f64; 3],
    /// Residual at the best angles.
    pub accuracy: f64,
    /// Residual before any rotation, for judging the improvement.
    pub initial_accuracy: f64,
    /// Full passes over the three axes.
    pub passes: usize,
}

/// Tunables for the per-axis scale search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSearchConfig {
    /// First step applied to each scale factor.
    pub initial_step: f64,
    /// The search stops once the step drops below this.
    pub epsilon: f64,
    /// Nominal zero-field baseline subtracted from both series before
    /// scaling and added back when the scaled series is materialized.
    pub offset: f64,
}

impl Default for ScaleSearchConfig {
    fn default() -> Self {
        Self {
            initial_step: 0.1,
            epsilon: 1e-7,
            offset: 0.0,
        }
    }
}

/// Outcome of [`find_best_scale_per_axis`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleSearchResult {
    /// Best multiplicative factor per axis.
    pub scales: [f64; 3],
    /// Range objective remaining per axis at the best factor.
    pub ranges: [f64; 3],
}

/// Residual surface over a declination/inclination grid, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSurface {
    /// Trial declinations, ascending.
    pub declinations: Vec<f64>,
    /// Trial inclinations, ascending.
    pub inclinations: Vec<f64>,
    /// Combined residual per cell, row-major by inclination index.
    pub accuracy: Vec<f64>,
}

impl FitSurface {
    /// Residual at one grid cell.
    pub fn at(&self, inclination_idx: usize, declination_idx: usize) -> f64 {
        self.accuracy[inclination_idx * self.declinations.len() + declination_idx]
    }
}

fn check_step_config(initial_step: f64, epsilon: f64) -> MagResult<()> {
    if !initial_step.is_finite() || initial_step <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "search step must be positive and finite, got {initial_step}"
        )));
    }
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(MagError::InvalidParameter(format!(
            "search epsilon must be positive and finite, got {epsilon}"
        )));
    }
    Ok(())
}

/// Search for the angle triplet whose rotation best aligns `series` with
/// `reference`, without modifying either.
///
/// Every candidate triplet is applied to the original series, so the
/// returned angles are absolute, not incremental.
pub fn find_best_rotation_angles(
    series: &ThreeAxisSeries,
    reference: &ThreeAxisSeries,
    config: &AngleSearchConfig,
) -> MagResult<AngleSearchResult> {
    check_step_config(config.initial_step, config.epsilon)?;

    // The bias option searches demeaned copies; the caller's series stay
    // untouched either way.
    let (owned_series, owned_reference);
    let (series, reference) = if config.remove_bias {
        owned_series = {
            let mut s = series.clone();
            s.remove_mean();
            s
        };
        owned_reference = {
            let mut r = reference.clone();
            r.remove_mean();
            r
        };
        (&owned_series, &owned_reference)
    } else {
        (series, reference)
    };

    let objective = |angles: &[f64; 3]| -> MagResult<f64> {
        let rotation = rotation_from_angles(angles[0], angles[1], angles[2]);
        Ok(rotated_residual(series, reference, &rotation)?.combined())
    };

    let mut angles = [0.0f64; 3];
    let mut best = objective(&angles)?;
    let initial_accuracy = best;
    let mut step = config.initial_step;
    let mut passes = 0usize;

    while step >= config.epsilon {
        let pass_start = angles;
        for axis in 0..3 {
            let mut plus = angles;
            plus[axis] += step;
            let plus_accuracy = objective(&plus)?;

            let mut minus = angles;
            minus[axis] -= step;
            let minus_accuracy = objective(&minus)?;

            if plus_accuracy < best && plus_accuracy < minus_accuracy {
                angles = plus;
                best = plus_accuracy;
            } else if minus_accuracy < best {
                angles = minus;
                best = minus_accuracy;
            }
        }
        passes += 1;
        if angles == pass_start {
            step /= 2.0;
            debug!(step, "no improving axis step, halving");
        }
    }

    info!(
        declination = angles[0],
        inclination = angles[1],
        ancillary = angles[2],
        accuracy = best,
        initial_accuracy,
        passes,
        "rotation search converged"
    );
    Ok(AngleSearchResult {
        angles,
        accuracy: best,
        initial_accuracy,
        passes,
    })
}

/// Run [`find_best_rotation_angles`] and apply the winning rotation to
/// `series` in place.
pub fn find_and_apply_best_rotation(
    series: &mut ThreeAxisSeries,
    reference: &ThreeAxisSeries,
    config: &AngleSearchConfig,
) -> MagResult<AngleSearchResult> {
    let result = find_best_rotation_angles(series, reference, config)?;
    crate::rotation_solver::apply_angle_rotation(
        series,
        result.angles[0],
        result.angles[1],
        result.angles[2],
    );
    Ok(result)
}

fn search_axis_scale(
    data: &[f64],
    reference: &[f64],
    config: &ScaleSearchConfig,
) -> MagResult<(f64, f64)> {
    let objective = |scale: f64| -> MagResult<f64> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for (&d, &r) in data.iter().zip(reference) {
            let diff = (r - config.offset) - (d - config.offset) * scale;
            if diff.is_finite() {
                lo = lo.min(diff);
                hi = hi.max(diff);
            }
        }
        if lo > hi {
            return Err(MagError::InvalidParameter(
                "no finite sample pairs to compare".to_string(),
            ));
        }
        Ok(hi - lo)
    };

    let mut scale = 1.0f64;
    let mut best = objective(scale)?;
    let mut step = config.initial_step;
    while step >= config.epsilon {
        let plus_accuracy = objective(scale + step)?;
        let minus_accuracy = objective(scale - step)?;
        if plus_accuracy < best && plus_accuracy < minus_accuracy {
            scale += step;
            best = plus_accuracy;
        } else if minus_accuracy < best {
            scale -= step;
            best = minus_accuracy;
        } else {
            step /= 2.0;
        }
    }
    Ok((scale, best))
}

/// Search for the per-axis factor that best matches each channel's
/// amplitude to the reference, each axis independently of the others.
///
/// The objective is [`range_of_difference`](crate::fit_metric::range_of_difference)
/// of the scaled channel after the configured baseline offset is removed
/// from both sides, so a constant offset between the instruments cannot
/// bias the factor.
pub fn find_best_scale_per_axis(
    series: &ThreeAxisSeries,
    reference: &ThreeAxisSeries,
    config: &ScaleSearchConfig,
) -> MagResult<ScaleSearchResult> {
    check_step_config(config.initial_step, config.epsilon)?;
    if series.len() != reference.len() {
        return Err(MagError::LengthMismatch {
            expected: reference.len(),
            got: series.len(),
        });
    }

    let axes = [
        (series.x(), reference.x()),
        (series.y(), reference.y()),
        (series.z(), reference.z()),
    ];
    let mut scales = [1.0f64; 3];
    let mut ranges = [0.0f64; 3];
    for (i, (data, reference_axis)) in axes.iter().enumerate() {
        let (scale, range) = search_axis_scale(data, reference_axis, config)?;
        scales[i] = scale;
        ranges[i] = range;
    }
    info!(
        scale_x = scales[0],
        scale_y = scales[1],
        scale_z = scales[2],
        "scale search converged"
    );
    Ok(ScaleSearchResult { scales, ranges })
}

/// Run [`find_best_scale_per_axis`] and rescale `series` in place, with
/// the baseline offset removed before scaling and restored afterwards.
pub fn find_and_apply_best_scale(
    series: &mut ThreeAxisSeries,
    reference: &ThreeAxisSeries,
    config: &ScaleSearchConfig,
) -> MagResult<ScaleSearchResult> {
    let result = find_best_scale_per_axis(series, reference, config)?;
    let channels = [&mut series.x, &mut series.y, &mut series.z];
    for (channel, &scale) in channels.into_iter().zip(&result.scales) {
        for v in channel.iter_mut() {
            *v = (*v - config.offset) * scale + config.offset;
        }
    }
    if series.f.is_some() {
        series.compute_total_field();
    }
    Ok(result)
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

/// Evaluate the residual over a `bins × bins` grid of declination and
/// inclination values spanning `±declination_range` and
/// `±inclination_range`. Pure evaluation; no search state.
pub fn grid_search_accuracy(
    series: &ThreeAxisSeries,
    reference: &ThreeAxisSeries,
    declination_range: f64,
    inclination_range: f64,
    bins: usize,
) -> MagResult<FitSurface> {
    if bins == 0 {
        return Err(MagError::InvalidParameter(
            "grid search needs at least one bin".to_string(),
        ));
    }
    let declinations = linspace(-declination_range, declination_range, bins);
    let inclinations = linspace(-inclination_range, inclination_range, bins);

    let mut accuracy = Vec::with_capacity(bins * bins);
    for &inc in &inclinations {
        for &dec in &declinations {
            let rotation = rotation_from_angles(dec, inc, 0.0);
            accuracy.push(rotated_residual(series, reference, &rotation)?.combined());
        }
    }
    Ok(FitSurface {
        declinations,
        inclinations,
        accuracy,
    })
}
