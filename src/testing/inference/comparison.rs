//! One reference-versus-comparison permutation test across all categories.

use crate::error::ProportionError;
use crate::observations::ObservationSource;
use crate::testing::effect::log2_proportion_ratio;
use crate::testing::inference::bootstrap::bootstrap_ci;
use crate::testing::inference::permutation::{empirical_p_value, permutation_null};
use crate::testing::utils::CategoryCodes;
use crate::testing::{CategoryResult, ComparisonTable, ProportionTestConfig};
use log::Level;
use ndarray::Array2;
use rand::Rng;

/// Run the permutation test of `group2` against `group1` for every category present in
/// either group.
///
/// The effect is `log2(proportion in group2 / proportion in group1)`. Categories appear
/// in order of first appearance in group1, then group2. Only `n_permutations`,
/// `n_bootstrap`, `alpha` and `verbose` are read from `config`; the draws come from `rng`
/// in a fixed order (per category: bootstrap, then permutations), so a seeded generator
/// reproduces the table exactly.
///
/// # Errors
///
/// `SelfComparison` when both labels are equal, `DegenerateGroup` when either group has
/// no observations.
pub fn single_comparison<S, R>(
    source: &S,
    group1: &str,
    group2: &str,
    config: &ProportionTestConfig,
    rng: &mut R,
) -> anyhow::Result<ComparisonTable>
where
    S: ObservationSource + ?Sized,
    R: Rng + ?Sized,
{
    if group1 == group2 {
        return Err(ProportionError::SelfComparison(group2.to_string()).into());
    }

    let group1_ids = source.observations_in_group(group1);
    if group1_ids.is_empty() {
        return Err(ProportionError::DegenerateGroup(group1.to_string()).into());
    }
    let group2_ids = source.observations_in_group(group2);
    if group2_ids.is_empty() {
        return Err(ProportionError::DegenerateGroup(group2.to_string()).into());
    }

    let codes = CategoryCodes::encode(source, &group1_ids, &group2_ids);
    let pool = codes.pool();
    let n_categories = codes.n_categories();
    let progress_level = if config.verbose { Level::Info } else { Level::Debug };

    log::debug!(
        "Comparing '{}' ({} cells) with '{}' ({} cells) over {} cell types",
        group2,
        group2_ids.len(),
        group1,
        group1_ids.len(),
        n_categories
    );

    let mut observed = Vec::with_capacity(n_categories);
    let mut intervals = Vec::with_capacity(n_categories);
    let mut null_values = Vec::with_capacity(n_categories * config.n_permutations);

    for (category, label) in codes.labels.iter().enumerate() {
        log::log!(
            progress_level,
            "{} vs {}: processing cell type '{}' ({}/{})",
            group1,
            group2,
            label,
            category + 1,
            n_categories
        );

        observed.push(log2_proportion_ratio(&codes.group2, &codes.group1, category));
        intervals.push(bootstrap_ci(
            &codes.group2,
            &codes.group1,
            category,
            config.n_bootstrap,
            config.alpha,
            rng,
        ));
        null_values.extend(permutation_null(
            &pool,
            codes.group2.len(),
            category,
            config.n_permutations,
            rng,
        ));
    }

    let null_table = Array2::from_shape_vec((n_categories, config.n_permutations), null_values)?;

    let categories = codes
        .labels
        .into_iter()
        .enumerate()
        .map(|(category, cell_type)| {
            let (lower_ci, upper_ci) = intervals[category];
            CategoryResult {
                cell_type,
                p_value: empirical_p_value(observed[category], &null_table.row(category)),
                observed_diff: observed[category],
                lower_ci,
                upper_ci,
            }
        })
        .collect();

    Ok(ComparisonTable {
        group1: group1.to_string(),
        group2: group2.to_string(),
        categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::ObservationTable;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// `counts[g][c]` cells of cell type `T{c+1}` in group `groups[g]`.
    fn table_from_counts(groups: &[&str], counts: &[&[usize]]) -> ObservationTable {
        let mut group_col = Vec::new();
        let mut type_col = Vec::new();
        for (group, row) in groups.iter().zip(counts) {
            for (c, &n) in row.iter().enumerate() {
                for _ in 0..n {
                    group_col.push(group.to_string());
                    type_col.push(format!("T{}", c + 1));
                }
            }
        }
        ObservationTable::new((0..group_col.len()).map(|i| format!("cell_{}", i)).collect())
            .with_column("group", group_col)
            .unwrap()
            .with_column("cell_type", type_col)
            .unwrap()
    }

    fn config() -> ProportionTestConfig {
        ProportionTestConfig::default()
            .with_permutations(999)
            .with_bootstrap(500)
            .with_verbose(false)
    }

    #[test]
    fn test_identical_distributions() {
        let table = table_from_counts(&["ctrl", "treated"], &[&[17, 17, 16], &[17, 17, 16]]);
        let labels = table.labels("group", "cell_type").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let result = single_comparison(&labels, "ctrl", "treated", &config(), &mut rng).unwrap();

        assert_eq!(result.categories.len(), 3);
        for row in &result.categories {
            assert_abs_diff_eq!(row.observed_diff, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(row.p_value, 1.0, epsilon = 1e-12);
            assert!(row.lower_ci <= 0.0 && row.upper_ci >= 0.0);
        }
    }

    #[test]
    fn test_strong_shift_is_detected() {
        let table = table_from_counts(&["ctrl", "treated"], &[&[60, 20, 20], &[20, 60, 20]]);
        let labels = table.labels("group", "cell_type").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let result = single_comparison(&labels, "ctrl", "treated", &config(), &mut rng).unwrap();
        let by_type = |name: &str| {
            result
                .categories
                .iter()
                .find(|c| c.cell_type == name)
                .unwrap()
                .clone()
        };

        let t1 = by_type("T1");
        assert_abs_diff_eq!(t1.observed_diff, (20.0_f64 / 60.0).log2(), epsilon = 1e-12);
        assert!(t1.p_value < 0.01);
        assert!(t1.upper_ci < 0.0);

        let t2 = by_type("T2");
        assert_abs_diff_eq!(t2.observed_diff, 3.0_f64.log2(), epsilon = 1e-12);
        assert!(t2.p_value < 0.01);
        assert!(t2.lower_ci > 0.0);

        let t3 = by_type("T3");
        assert_abs_diff_eq!(t3.observed_diff, 0.0, epsilon = 1e-12);
        assert!(t3.p_value > 0.5);
    }

    #[test]
    fn test_p_values_within_bounds() {
        let table = table_from_counts(&["ctrl", "treated"], &[&[5, 30, 2], &[25, 4, 9]]);
        let labels = table.labels("group", "cell_type").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let config = config();

        let result = single_comparison(&labels, "ctrl", "treated", &config, &mut rng).unwrap();
        let floor = 1.0 / (config.n_permutations as f64 + 1.0);
        for row in &result.categories {
            assert!(row.p_value >= floor && row.p_value <= 1.0);
        }
    }

    #[test]
    fn test_absent_cell_type_in_comparison_group() {
        let table = table_from_counts(&["ctrl", "treated"], &[&[10, 20, 20], &[0, 25, 25]]);
        let labels = table.labels("group", "cell_type").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1234);

        let result = single_comparison(&labels, "ctrl", "treated", &config(), &mut rng).unwrap();
        let t1 = &result.categories[0];

        assert_eq!(t1.cell_type, "T1");
        assert_eq!(t1.observed_diff, f64::NEG_INFINITY);
        assert!(t1.p_value < 0.01);
        assert!(t1.lower_ci.is_nan() && t1.upper_ci.is_nan());
    }

    #[test]
    fn test_degenerate_and_self_comparison() {
        let table = table_from_counts(&["ctrl", "treated"], &[&[3, 3], &[3, 3]]);
        let labels = table.labels("group", "cell_type").unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let err = single_comparison(&labels, "ctrl", "other", &config(), &mut rng).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProportionError>(),
            Some(&ProportionError::DegenerateGroup("other".to_string()))
        );

        let err = single_comparison(&labels, "ctrl", "ctrl", &config(), &mut rng).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProportionError>(),
            Some(&ProportionError::SelfComparison("ctrl".to_string()))
        );
    }

    #[test]
    fn test_same_seed_same_table() {
        let table = table_from_counts(&["ctrl", "treated"], &[&[12, 7, 30], &[9, 15, 22]]);
        let labels = table.labels("group", "cell_type").unwrap();

        let first = single_comparison(
            &labels,
            "ctrl",
            "treated",
            &config(),
            &mut ChaCha8Rng::seed_from_u64(5),
        )
        .unwrap();
        let second = single_comparison(
            &labels,
            "ctrl",
            "treated",
            &config(),
            &mut ChaCha8Rng::seed_from_u64(5),
        )
        .unwrap();
        assert_eq!(first, second);
    }
}
