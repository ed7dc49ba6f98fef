//! Percentile bootstrap confidence interval of the log2 proportion ratio.

use crate::testing::effect::log2_ratio_from_counts;
use rand::Rng;
use statrs::statistics::{Data, OrderStatistics};

/// Bootstrap confidence interval for the effect of `category`.
///
/// Each of the `n_bootstrap` trials resamples `numerator` and `denominator` with
/// replacement, keeping their sizes, and recomputes the log2 proportion ratio. The
/// bounds are the `alpha / 2` and `1 - alpha / 2` quantiles of the measured replicates.
/// Sentinel replicates are left out: the infinities, and the `0.0` of a trial that drew
/// the category in neither group. When no measured replicate remains both bounds are
/// NaN.
///
/// # Arguments
///
/// * `numerator` - Category codes of the group in the numerator of the ratio
/// * `denominator` - Category codes of the group in the denominator
/// * `category` - Code of the category under test
/// * `n_bootstrap` - Number of resampling trials
/// * `alpha` - Significance level of the interval
/// * `rng` - Random source, advanced by every draw
pub fn bootstrap_ci<R>(
    numerator: &[usize],
    denominator: &[usize],
    category: usize,
    n_bootstrap: usize,
    alpha: f64,
    rng: &mut R,
) -> (f64, f64)
where
    R: Rng + ?Sized,
{
    let replicates: Vec<f64> = (0..n_bootstrap)
        .filter_map(|_| {
            let numerator_count = resample_count(numerator, category, rng);
            let denominator_count = resample_count(denominator, category, rng);
            if numerator_count == 0 && denominator_count == 0 {
                return None;
            }
            Some(log2_ratio_from_counts(
                numerator_count,
                numerator.len(),
                denominator_count,
                denominator.len(),
            ))
        })
        .collect();

    percentile_interval(replicates, alpha)
}

/// Draw `codes.len()` observations with replacement and count those in `category`.
fn resample_count<R>(codes: &[usize], category: usize, rng: &mut R) -> usize
where
    R: Rng + ?Sized,
{
    let n = codes.len();
    if n == 0 {
        return 0;
    }
    (0..n)
        .filter(|_| codes[rng.gen_range(0..n)] == category)
        .count()
}

/// `alpha / 2` and `1 - alpha / 2` quantiles over the finite values.
pub fn percentile_interval(values: Vec<f64>, alpha: f64) -> (f64, f64) {
    let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return (f64::NAN, f64::NAN);
    }

    let n = finite.len();
    let mut data = Data::new(finite);
    let lower = linear_quantile(&mut data, n, alpha / 2.0);
    let upper = linear_quantile(&mut data, n, 1.0 - alpha / 2.0);
    (lower, upper)
}

/// Quantile with linear interpolation between closest ranks (R type 7, numpy's
/// default percentile): `h = (n - 1) * tau`, interpolated between the order statistics
/// at `floor(h)` and `ceil(h)`.
fn linear_quantile(data: &mut Data<Vec<f64>>, n: usize, tau: f64) -> f64 {
    let h = (n - 1) as f64 * tau.clamp(0.0, 1.0);
    let below = h.floor();
    let above = h.ceil();

    // order statistics are 1-based
    let x_below = data.order_statistic(below as usize + 1);
    if above == below {
        return x_below;
    }
    let x_above = data.order_statistic(above as usize + 1);
    x_below + (h - below) * (x_above - x_below)
}
