//! Label-permutation null distribution and empirical p-value.

use crate::testing::effect::{count_category, log2_ratio_from_counts};
use rand::Rng;
use rand::seq::SliceRandom;

/// Null distribution of the effect of `category` under random relabelling.
///
/// `pool` holds the category codes of both groups, the numerator group first. Each of
/// the `n_permutations` trials shuffles the whole pool, takes the first `n_numerator`
/// entries as the pseudo-numerator group and the rest as the pseudo-denominator group,
/// and recomputes the log2 proportion ratio. Both pseudo-groups together always cover
/// the whole pool, so category totals are the same in every trial.
pub fn permutation_null<R>(
    pool: &[usize],
    n_numerator: usize,
    category: usize,
    n_permutations: usize,
    rng: &mut R,
) -> Vec<f64>
where
    R: Rng + ?Sized,
{
    let n_denominator = pool.len().saturating_sub(n_numerator);
    let mut shuffled = pool.to_vec();

    (0..n_permutations)
        .map(|_| {
            let (numerator_count, denominator_count) =
                shuffle_split_counts(&mut shuffled, n_numerator, category, rng);
            log2_ratio_from_counts(
                numerator_count,
                n_numerator,
                denominator_count,
                n_denominator,
            )
        })
        .collect()
}

/// Shuffle `pool` in place and count `category` in both halves of the split.
fn shuffle_split_counts<R>(
    pool: &mut [usize],
    n_numerator: usize,
    category: usize,
    rng: &mut R,
) -> (usize, usize)
where
    R: Rng + ?Sized,
{
    pool.shuffle(rng);
    let (numerator, denominator) = pool.split_at(n_numerator.min(pool.len()));
    (
        count_category(numerator, category),
        count_category(denominator, category),
    )
}

/// Two-sided empirical p-value with the +1 correction.
///
/// `(#{|null| >= |observed|} + 1) / (n + 1)` where `n` is the number of null values.
/// The result is never 0; a NaN on either side never counts as extreme.
pub fn empirical_p_value<'a, I>(observed: f64, null: I) -> f64
where
    I: IntoIterator<Item = &'a f64>,
{
    let threshold = observed.abs();
    let (n_extreme, n_total) = null.into_iter().fold((0usize, 0usize), |(extreme, total), v| {
        let is_extreme = v.abs() >= threshold;
        (extreme + usize::from(is_extreme), total + 1)
    });

    (n_extreme as f64 + 1.0) / (n_total as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_permutations_preserve_category_totals() {
        let pool: Vec<usize> = (0..60).map(|i| i % 4).collect();
        let mut shuffled = pool.clone();
        let mut rng = ChaCha8Rng::seed_from_u64(21);

        for category in 0..4 {
            let total = count_category(&pool, category);
            for _ in 0..500 {
                let (a, b) = shuffle_split_counts(&mut shuffled, 25, category, &mut rng);
                assert_eq!(a + b, total);
            }
        }
        assert_eq!(shuffled.len(), pool.len());
    }

    #[test]
    fn test_null_has_requested_length() {
        let pool = vec![0, 1, 0, 1, 1, 0, 2];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let null = permutation_null(&pool, 3, 0, 250, &mut rng);
        assert_eq!(null.len(), 250);
        assert!(null.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_null_centred_on_zero_for_balanced_pool() {
        let pool: Vec<usize> = (0..400).map(|i| i % 2).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let null = permutation_null(&pool, 200, 1, 2000, &mut rng);

        let mean = null.iter().sum::<f64>() / null.len() as f64;
        assert!(mean.abs() < 0.05, "mean of null = {}", mean);
    }

    #[test]
    fn test_p_value_bounds() {
        let null = vec![0.1, -0.2, 0.05, 0.3];
        // More extreme than every null value
        assert_relative_eq!(empirical_p_value(5.0, &null), 1.0 / 5.0);
        // Zero effect: every null value is at least as extreme
        assert_relative_eq!(empirical_p_value(0.0, &null), 1.0);
        // Two-sided: |-0.2| and |0.3| are >= 0.2
        assert_relative_eq!(empirical_p_value(-0.2, &null), 3.0 / 5.0);
    }

    #[test]
    fn test_p_value_with_sentinels() {
        let null = vec![f64::NEG_INFINITY, 0.5, f64::INFINITY, -1.0];
        assert_relative_eq!(empirical_p_value(f64::NEG_INFINITY, &null), 3.0 / 5.0);
        assert_relative_eq!(empirical_p_value(f64::INFINITY, &null), 3.0 / 5.0);

        // NaN observed or null values never count as extreme
        assert_relative_eq!(empirical_p_value(f64::NAN, &null), 1.0 / 5.0);
        assert_relative_eq!(empirical_p_value(0.1, &[f64::NAN, 0.2]), 2.0 / 3.0);
    }

    #[test]
    fn test_p_value_without_null() {
        assert_relative_eq!(empirical_p_value(1.0, &Vec::<f64>::new()), 1.0);
    }
}
