//! Parallel reference-versus-many permutation tests with one global correction.

use crate::error::ProportionError;
use crate::observations::ObservationSource;
use crate::testing::inference::comparison::single_comparison;
use crate::testing::{ComparisonTable, ProportionTestConfig, ProportionTestResults};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Random source of the comparison at position `index`.
///
/// All comparisons of a run share the master seed and differ in their ChaCha stream,
/// so their draws are independent and do not depend on thread scheduling.
pub fn comparison_rng(seed: u64, index: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(index as u64);
    rng
}

/// Check the labels of a multi-comparison run before any resampling starts.
pub fn validate_comparisons<S, G>(source: &S, reference: &str, comparisons: &[G]) -> anyhow::Result<()>
where
    S: ObservationSource + ?Sized,
    G: AsRef<str>,
{
    if comparisons.is_empty() {
        return Err(ProportionError::EmptyGroupList.into());
    }
    if !source.contains_group(reference) {
        return Err(ProportionError::UnknownGroupLabel(reference.to_string()).into());
    }
    for group in comparisons {
        let group = group.as_ref();
        if group == reference {
            return Err(ProportionError::SelfComparison(group.to_string()).into());
        }
        if !source.contains_group(group) {
            return Err(ProportionError::UnknownGroupLabel(group.to_string()).into());
        }
    }
    Ok(())
}

/// Compare `reference` with every group in `comparisons` and correct all p-values
/// together.
///
/// Comparisons run concurrently on rayon (a dedicated pool of `config.n_threads`
/// threads when set). The result keeps the submission order of `comparisons` and the
/// category order within each comparison. The adjusted p-values come from a single
/// `config.correction` pass over every raw p-value in the table. If any comparison
/// fails the whole run fails and no table is returned.
///
/// # Errors
///
/// `InvalidParameter` for an invalid configuration, `EmptyGroupList`,
/// `SelfComparison` and `UnknownGroupLabel` for invalid labels, and any error of
/// [`single_comparison`].
pub fn multiple_permutation_test<S, G>(
    source: &S,
    reference: &str,
    comparisons: &[G],
    config: &ProportionTestConfig,
) -> anyhow::Result<ProportionTestResults>
where
    S: ObservationSource + ?Sized,
    G: AsRef<str> + Sync,
{
    config.validate()?;
    validate_comparisons(source, reference, comparisons)?;

    let seed = config.seed.unwrap_or_else(rand::random);
    log::debug!("Permutation test master seed: {}", seed);

    let run = || -> anyhow::Result<Vec<ComparisonTable>> {
        log::info!(
            "Using {} threads for {} comparisons against '{}'",
            rayon::current_num_threads(),
            comparisons.len(),
            reference
        );
        comparisons
            .par_iter()
            .enumerate()
            .map(|(index, group)| {
                let mut rng = comparison_rng(seed, index);
                single_comparison(source, reference, group.as_ref(), config, &mut rng)
            })
            .collect()
    };

    let tables = match config.n_threads {
        Some(n_threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()?
            .install(run)?,
        None => run()?,
    };

    let results = ProportionTestResults::from_comparisons(tables, config.correction)?;
    Ok(with_run_metadata(results, reference, seed, config))
}

/// Single (group1, group2) test with the correction applied across its categories.
///
/// Uses the random stream of comparison 0, so it reproduces the raw columns of a
/// multi-comparison run whose only comparison is `group2`.
pub fn permutation_test<S>(
    source: &S,
    group1: &str,
    group2: &str,
    config: &ProportionTestConfig,
) -> anyhow::Result<ProportionTestResults>
where
    S: ObservationSource + ?Sized,
{
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random);
    log::debug!("Permutation test master seed: {}", seed);

    let mut rng = comparison_rng(seed, 0);
    let table = single_comparison(source, group1, group2, config, &mut rng)?;

    let results = ProportionTestResults::from_comparisons(vec![table], config.correction)?;
    Ok(with_run_metadata(results, group1, seed, config))
}

fn with_run_metadata(
    results: ProportionTestResults,
    reference: &str,
    seed: u64,
    config: &ProportionTestConfig,
) -> ProportionTestResults {
    results
        .with_global_metadata("test_type", "permutation")
        .with_global_metadata("reference", reference)
        .with_global_metadata("seed", &seed.to_string())
        .with_global_metadata("n_permutations", &config.n_permutations.to_string())
        .with_global_metadata("n_bootstrap", &config.n_bootstrap.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::LabeledObservations;
    use rand::RngCore;

    fn labels(groups: &[&str], types: &[&str]) -> (Vec<String>, Vec<String>) {
        (
            groups.iter().map(|s| s.to_string()).collect(),
            types.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_streams_differ_per_comparison() {
        let mut a = comparison_rng(42, 0);
        let mut b = comparison_rng(42, 1);
        let mut a_again = comparison_rng(42, 0);

        let first = a.next_u64();
        assert_ne!(first, b.next_u64());
        assert_eq!(first, a_again.next_u64());
    }

    #[test]
    fn test_validation_errors() {
        let (groups, types) = labels(&["ctrl", "ctrl", "A", "B"], &["T", "B", "T", "B"]);
        let source = LabeledObservations::new(&groups, &types).unwrap();

        let err = validate_comparisons::<_, &str>(&source, "ctrl", &[]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProportionError>(),
            Some(&ProportionError::EmptyGroupList)
        );

        let err = validate_comparisons(&source, "ctrl", &["A", "ctrl"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProportionError>(),
            Some(&ProportionError::SelfComparison("ctrl".to_string()))
        );

        let err = validate_comparisons(&source, "ctrl", &["A", "C"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProportionError>(),
            Some(&ProportionError::UnknownGroupLabel("C".to_string()))
        );

        let err = validate_comparisons(&source, "control", &["A"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProportionError>(),
            Some(&ProportionError::UnknownGroupLabel("control".to_string()))
        );

        assert!(validate_comparisons(&source, "ctrl", &["A", "B"]).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let (groups, types) = labels(&["ctrl", "A"], &["T", "T"]);
        let source = LabeledObservations::new(&groups, &types).unwrap();
        let config = ProportionTestConfig::default().with_alpha(2.0);

        let err = multiple_permutation_test(&source, "ctrl", &["A"], &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProportionError>(),
            Some(ProportionError::InvalidParameter(_))
        ));
        assert!(permutation_test(&source, "ctrl", "A", &config).is_err());
    }
}
