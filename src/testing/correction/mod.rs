//! Multiple testing correction methods to control for false positives
//! when performing many statistical tests simultaneously.

use crate::testing::CorrectionMethod;
use anyhow::{Result, anyhow};
use std::cmp::Ordering;

/// Adjust p-values with the given method.
///
/// The permutation test calls this exactly once per run, on the pooled p-values of
/// every comparison.
pub fn adjust_p_values(p_values: &[f64], method: CorrectionMethod) -> Result<Vec<f64>> {
    match method {
        CorrectionMethod::Bonferroni => bonferroni_correction(p_values),
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg_correction(p_values),
        CorrectionMethod::BenjaminiYekutieli => benjamini_yekutieli_correction(p_values),
        CorrectionMethod::Holm => holm_bonferroni_correction(p_values),
        CorrectionMethod::Hochberg => hochberg_correction(p_values),
        CorrectionMethod::Storey { lambda } => storey_qvalues(p_values, lambda),
        CorrectionMethod::AdaptiveStorey => adaptive_storey_qvalues(p_values),
    }
}

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }

    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }
    Ok(())
}

/// Index-value pairs sorted by p-value in ascending order.
fn sorted_ascending(p_values: &[f64]) -> Vec<(usize, f64)> {
    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    indexed_p_values
}

/// Step-up adjustment shared by BH and BY: `min_{j >= i} p_(j) * factor * n / j`.
fn step_up(p_values: &[f64], factor: f64) -> Vec<f64> {
    let n = p_values.len();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    // Process from largest to smallest p-value
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;

        let adjustment = (p_val * factor * n as f64 / rank as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    adjusted_p_values
}

/// Apply Bonferroni correction to p-values
///
/// Bonferroni correction is a simple but conservative method that multiplies
/// each p-value by the number of tests.
///
/// # Example
/// ```
/// use single_proportion::testing::correction::bonferroni_correction;
///
/// let adjusted = bonferroni_correction(&[0.01, 0.03, 0.05]).unwrap();
/// assert!((adjusted[0] - 0.03).abs() < 1e-12);
/// ```
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    // Multiply each p-value by n, capping at 1.0
    let adjusted = p_values.iter().map(|&p| (p * n as f64).min(1.0)).collect();

    Ok(adjusted)
}

/// Apply Benjamini-Hochberg (BH) procedure for controlling false discovery rate
///
/// The BH procedure controls the false discovery rate (FDR), which is the expected
/// proportion of false positives among all rejected null hypotheses. This is the
/// default correction of the permutation test (`"fdr_bh"`).
///
/// # Example
/// ```
/// use single_proportion::testing::correction::benjamini_hochberg_correction;
///
/// let adjusted = benjamini_hochberg_correction(&[0.01, 0.03, 0.05]).unwrap();
/// assert!(adjusted.iter().all(|&q| (q - 0.05).abs() < 1e-12 || q < 0.05));
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    Ok(step_up(p_values, 1.0))
}

/// Apply Benjamini-Yekutieli (BY) procedure for controlling false discovery rate under dependence
///
/// The BY procedure is a more conservative variant of the BH procedure that is valid
/// under arbitrary dependence structures among the tests.
pub fn benjamini_yekutieli_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    // Calculate the correction factor
    let c_n: f64 = (1..=n).map(|i| 1.0 / i as f64).sum();

    Ok(step_up(p_values, c_n))
}

/// Apply Holm-Bonferroni (step-down) method for controlling family-wise error rate
///
/// The i-th smallest p-value is multiplied by `n - i + 1` and the running maximum
/// is taken so the adjusted values stay monotone.
pub fn holm_bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_max: f64 = 0.0;

    for (i, &(orig_idx, p_val)) in indexed_p_values.iter().enumerate() {
        let adjustment = (p_val * (n - i) as f64).min(1.0);
        current_max = current_max.max(adjustment);
        adjusted_p_values[orig_idx] = current_max;
    }

    Ok(adjusted_p_values)
}

/// Apply Hochberg's step-up method for controlling family-wise error rate
///
/// The i-th largest p-value is multiplied by `i` and the running minimum is taken
/// from the largest p-value downwards.
pub fn hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();
    let indexed_p_values = sorted_ascending(p_values);

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min = 1.0;

    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let adjustment = (p_val * (n - i) as f64).min(1.0);
        current_min = adjustment.min(current_min);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

/// Apply Storey's q-value method for controlling false discovery rate
///
/// Storey's q-value method estimates the proportion of true null hypotheses (π0)
/// and uses this to obtain more powerful FDR control than the BH procedure.
///
/// # Arguments
/// * `p_values` - A slice of p-values to adjust
/// * `lambda` - Tuning parameter for π0 estimation (between 0 and 1, typically 0.5)
pub fn storey_qvalues(p_values: &[f64], lambda: f64) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    if !(0.0..1.0).contains(&lambda) {
        return Err(anyhow!("Lambda must be between 0 and 1, got {}", lambda));
    }

    let pi0 = estimate_pi0(p_values, lambda);

    // First apply Benjamini-Hochberg to get base adjusted values
    let bh_adjusted = benjamini_hochberg_correction(p_values)?;

    Ok(bh_adjusted.iter().map(|&p| (p * pi0).min(1.0)).collect())
}

/// Apply Storey's q-value method with π0 averaged over a grid of lambda values.
pub fn adaptive_storey_qvalues(p_values: &[f64]) -> Result<Vec<f64>> {
    const LAMBDA_GRID: [f64; 10] = [0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

    validate_p_values(p_values)?;

    let pi0 = LAMBDA_GRID
        .iter()
        .map(|&lambda| estimate_pi0(p_values, lambda))
        .sum::<f64>()
        / LAMBDA_GRID.len() as f64;

    let bh_adjusted = benjamini_hochberg_correction(p_values)?;

    Ok(bh_adjusted.iter().map(|&p| (p * pi0.min(1.0)).min(1.0)).collect())
}

fn estimate_pi0(p_values: &[f64], lambda: f64) -> f64 {
    let w = p_values.iter().filter(|&&p| p > lambda).count() as f64;
    (w / (p_values.len() as f64 * (1.0 - lambda))).min(1.0)
}
