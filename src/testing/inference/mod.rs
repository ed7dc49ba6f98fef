use crate::observations::ObservationTable;
use crate::testing::{ProportionTestConfig, ProportionTestResults};

pub mod bootstrap;

pub mod comparison;

pub mod multiple;

pub mod permutation;

pub use multiple::{multiple_permutation_test, permutation_test};

/// Proportion tests on an observation table, reading the group and cell type columns
/// named in the configuration.
pub trait ProportionStatTests {
    /// Test `group2` against `group1` and correct across its cell types.
    fn permutation_test(
        &self,
        group1: &str,
        group2: &str,
        config: &ProportionTestConfig,
    ) -> anyhow::Result<ProportionTestResults>;

    /// Test every group in `comparisons` against `reference` with one global correction.
    fn multiple_permutation_test(
        &self,
        reference: &str,
        comparisons: &[&str],
        config: &ProportionTestConfig,
    ) -> anyhow::Result<ProportionTestResults>;
}

impl ProportionStatTests for ObservationTable {
    fn permutation_test(
        &self,
        group1: &str,
        group2: &str,
        config: &ProportionTestConfig,
    ) -> anyhow::Result<ProportionTestResults> {
        let labels = self.labels(&config.group_col, &config.cell_type_col)?;
        multiple::permutation_test(&labels, group1, group2, config)
    }

    fn multiple_permutation_test(
        &self,
        reference: &str,
        comparisons: &[&str],
        config: &ProportionTestConfig,
    ) -> anyhow::Result<ProportionTestResults> {
        let labels = self.labels(&config.group_col, &config.cell_type_col)?;
        multiple::multiple_permutation_test(&labels, reference, comparisons, config)
    }
}
