//! log2 proportion ratio of one category between two groups of observations.
//!
//! Groups are given as slices of category codes (see
//! [`CategoryCodes`](crate::testing::utils::CategoryCodes)), one entry per observation.
//!
//! Zero proportions follow one fixed rule everywhere the statistic is computed
//! (observed effect, bootstrap replicates, permutation replicates):
//!
//! | numerator | denominator | effect |
//! |-----------|-------------|--------|
//! | > 0       | > 0         | `log2(num / den)` |
//! | 0         | > 0         | `-inf` |
//! | > 0       | 0           | `+inf` |
//! | 0         | 0           | `0.0` |
//!
//! The sentinels never produce NaN, so the permutation p-value treats a one-sided
//! absence as maximally extreme. The bootstrap interval leaves out every sentinel
//! replicate, including the `0.0` of a trial without the category on either side.

/// Number of observations in `codes` that belong to `category`.
#[inline]
pub fn count_category(codes: &[usize], category: usize) -> usize {
    codes.iter().filter(|&&code| code == category).count()
}

/// Fraction of `total` observations that are `count`. An empty group has proportion 0.
#[inline]
pub fn proportion(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// log2 ratio of two proportions with the zero-proportion sentinels.
pub fn log2_ratio(numerator: f64, denominator: f64) -> f64 {
    match (numerator > 0.0, denominator > 0.0) {
        (true, true) => (numerator / denominator).log2(),
        (false, true) => f64::NEG_INFINITY,
        (true, false) => f64::INFINITY,
        (false, false) => 0.0,
    }
}

/// log2 ratio computed from category counts and group sizes.
#[inline]
pub fn log2_ratio_from_counts(
    numerator_count: usize,
    numerator_size: usize,
    denominator_count: usize,
    denominator_size: usize,
) -> f64 {
    log2_ratio(
        proportion(numerator_count, numerator_size),
        proportion(denominator_count, denominator_size),
    )
}

/// Observed effect of `category`: log2(proportion in `numerator` / proportion in `denominator`).
pub fn log2_proportion_ratio(numerator: &[usize], denominator: &[usize], category: usize) -> f64 {
    log2_ratio_from_counts(
        count_category(numerator, category),
        numerator.len(),
        count_category(denominator, category),
        denominator.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_equal_proportions_give_zero() {
        // 2/6 and 4/12 of category 0
        let group1 = vec![0, 1, 0, 2, 1, 2];
        let group2 = vec![0, 0, 1, 1, 2, 2, 0, 1, 2, 0, 1, 2];
        assert_abs_diff_eq!(log2_proportion_ratio(&group2, &group1, 0), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(log2_proportion_ratio(&group1, &group2, 1), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_direction_of_effect() {
        // Category 0: 1/4 in group1, 3/4 in group2
        let group1 = vec![0, 1, 1, 1];
        let group2 = vec![0, 0, 0, 1];

        let up = log2_proportion_ratio(&group2, &group1, 0);
        assert_abs_diff_eq!(up, 3.0_f64.log2(), epsilon = 1e-12);

        let down = log2_proportion_ratio(&group1, &group2, 0);
        assert_abs_diff_eq!(down, -up, epsilon = 1e-12);

        // Halving the proportion is exactly -1
        assert_abs_diff_eq!(log2_ratio(0.25, 0.5), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_proportion_sentinels() {
        let with_t = vec![0, 0, 1];
        let without_t = vec![1, 1, 1, 1];

        assert_eq!(log2_proportion_ratio(&without_t, &with_t, 0), f64::NEG_INFINITY);
        assert_eq!(log2_proportion_ratio(&with_t, &without_t, 0), f64::INFINITY);
        // Category absent from both groups
        assert_eq!(log2_proportion_ratio(&with_t, &without_t, 7), 0.0);
    }

    #[test]
    fn test_empty_groups() {
        assert_eq!(proportion(0, 0), 0.0);
        assert_eq!(log2_proportion_ratio(&[], &[0, 1], 0), f64::NEG_INFINITY);
        assert_eq!(log2_proportion_ratio(&[0], &[], 0), f64::INFINITY);
        assert_eq!(log2_proportion_ratio(&[], &[], 0), 0.0);
    }

    #[test]
    fn test_sentinels_are_never_nan() {
        for num in 0..=3 {
            for den in 0..=3 {
                let effect = log2_ratio_from_counts(num, 3, den, 3);
                assert!(!effect.is_nan(), "NaN for {}/3 vs {}/3", num, den);
            }
        }
    }
}
