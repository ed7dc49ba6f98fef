use crate::error::ProportionError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

pub mod correction;
pub mod effect;
pub mod inference;

pub mod utils;

/// Multiple testing correction applied across all raw p-values of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    Bonferroni,
    #[default]
    BenjaminiHochberg,
    BenjaminiYekutieli,
    Holm,
    Hochberg,
    Storey { lambda: f64 },
    AdaptiveStorey,
}

impl CorrectionMethod {
    /// Short name, matching the names accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            CorrectionMethod::Bonferroni => "bonferroni",
            CorrectionMethod::BenjaminiHochberg => "fdr_bh",
            CorrectionMethod::BenjaminiYekutieli => "fdr_by",
            CorrectionMethod::Holm => "holm",
            CorrectionMethod::Hochberg => "simes-hochberg",
            CorrectionMethod::Storey { .. } => "qvalue",
            CorrectionMethod::AdaptiveStorey => "adaptive_qvalue",
        }
    }
}

impl fmt::Display for CorrectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CorrectionMethod {
    type Err = ProportionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bonferroni" => Ok(CorrectionMethod::Bonferroni),
            "fdr_bh" | "bh" | "benjamini-hochberg" => Ok(CorrectionMethod::BenjaminiHochberg),
            "fdr_by" | "by" | "benjamini-yekutieli" => Ok(CorrectionMethod::BenjaminiYekutieli),
            "holm" | "holm-bonferroni" => Ok(CorrectionMethod::Holm),
            "simes-hochberg" | "hochberg" => Ok(CorrectionMethod::Hochberg),
            "qvalue" | "storey" => Ok(CorrectionMethod::Storey { lambda: 0.5 }),
            "adaptive_qvalue" => Ok(CorrectionMethod::AdaptiveStorey),
            other => Err(ProportionError::InvalidParameter(format!(
                "Unknown p-value correction method '{}'",
                other
            ))),
        }
    }
}

/// Parameters of a permutation test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProportionTestConfig {
    /// Observation column holding group labels.
    pub group_col: String,
    /// Observation column holding category (cell type) labels.
    pub cell_type_col: String,
    pub n_permutations: usize,
    pub n_bootstrap: usize,
    /// Significance level of the bootstrap confidence interval.
    pub alpha: f64,
    pub correction: CorrectionMethod,
    /// Master seed. Drawn from entropy and recorded in the results when absent.
    pub seed: Option<u64>,
    /// Report per-category progress at `info` level instead of `debug`.
    pub verbose: bool,
    /// Worker threads for multi-comparison runs; the global rayon pool when absent.
    pub n_threads: Option<usize>,
}

impl Default for ProportionTestConfig {
    fn default() -> Self {
        ProportionTestConfig {
            group_col: "group".to_string(),
            cell_type_col: "cell_type".to_string(),
            n_permutations: 10000,
            n_bootstrap: 10000,
            alpha: 0.05,
            correction: CorrectionMethod::BenjaminiHochberg,
            seed: None,
            verbose: true,
            n_threads: None,
        }
    }
}

impl ProportionTestConfig {
    /// Fewer resampling trials, for exploratory runs.
    pub fn quick() -> Self {
        ProportionTestConfig {
            n_permutations: 1000,
            n_bootstrap: 1000,
            ..Default::default()
        }
    }

    pub fn with_columns(mut self, group_col: &str, cell_type_col: &str) -> Self {
        self.group_col = group_col.to_string();
        self.cell_type_col = cell_type_col.to_string();
        self
    }

    pub fn with_permutations(mut self, n_permutations: usize) -> Self {
        self.n_permutations = n_permutations;
        self
    }

    pub fn with_bootstrap(mut self, n_bootstrap: usize) -> Self {
        self.n_bootstrap = n_bootstrap;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_correction(mut self, correction: CorrectionMethod) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.n_threads = Some(n_threads);
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.n_permutations == 0 {
            return Err(invalid("n_permutations must be at least 1"));
        }
        if self.n_bootstrap == 0 {
            return Err(invalid("n_bootstrap must be at least 1"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(invalid(&format!("alpha must be in (0, 1), got {}", self.alpha)));
        }
        if self.n_threads == Some(0) {
            return Err(invalid("n_threads must be at least 1"));
        }
        if let CorrectionMethod::Storey { lambda } = self.correction {
            if !(0.0..1.0).contains(&lambda) {
                return Err(invalid(&format!(
                    "Lambda must be between 0 and 1, got {}",
                    lambda
                )));
            }
        }
        Ok(())
    }
}

fn invalid(message: &str) -> anyhow::Error {
    ProportionError::InvalidParameter(message.to_string()).into()
}

/// Outcome for one category within one comparison, before correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub cell_type: String,
    /// Empirical two-sided permutation p-value.
    pub p_value: f64,
    /// log2(proportion in group2 / proportion in group1), ±inf when one side is zero.
    pub observed_diff: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

/// All category results of one (group1, group2) comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub group1: String,
    pub group2: String,
    pub categories: Vec<CategoryResult>,
}

impl ComparisonTable {
    pub fn p_values(&self) -> Vec<f64> {
        self.categories.iter().map(|c| c.p_value).collect()
    }
}

/// One row of the corrected result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub group1: String,
    pub group2: String,
    pub cell_type: String,
    pub p_value: f64,
    pub adj_p_value: f64,
    pub observed_diff: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

impl ResultRow {
    /// Significant when the adjusted p-value is below `alpha` and the absolute log2
    /// difference exceeds `fold_difference`.
    pub fn is_significant(&self, alpha: f64, fold_difference: f64) -> bool {
        self.adj_p_value < alpha && self.observed_diff.abs() > fold_difference
    }
}

/// A labelled matrix pivoted from the result rows.
#[derive(Debug, Clone)]
pub struct ResultMatrix {
    /// Cell types, one per matrix row.
    pub row_labels: Vec<String>,
    /// Comparison groups (`group2`), one per matrix column.
    pub column_labels: Vec<String>,
    /// NaN where a cell type was not tested in a comparison.
    pub values: Array2<f64>,
}

/// Result rows of every comparison in a run with adjusted p-values.
#[derive(Debug, Clone)]
pub struct ProportionTestResults {
    pub rows: Vec<ResultRow>,
    /// Run parameters, such as the correction method and the seed used.
    pub global_metadata: HashMap<String, String>,
}

impl ProportionTestResults {
    /// Concatenate comparison tables in the given order and apply one correction
    /// across all of their raw p-values.
    pub fn from_comparisons(
        tables: Vec<ComparisonTable>,
        correction: CorrectionMethod,
    ) -> anyhow::Result<Self> {
        let p_values: Vec<f64> = tables.iter().flat_map(|t| t.p_values()).collect();
        let adjusted = correction::adjust_p_values(&p_values, correction)?;

        let rows = tables
            .into_iter()
            .flat_map(|table| {
                let ComparisonTable {
                    group1,
                    group2,
                    categories,
                } = table;
                categories.into_iter().map(move |c| (group1.clone(), group2.clone(), c))
            })
            .zip(adjusted)
            .map(|((group1, group2, c), adj_p_value)| ResultRow {
                group1,
                group2,
                cell_type: c.cell_type,
                p_value: c.p_value,
                adj_p_value,
                observed_diff: c.observed_diff,
                lower_ci: c.lower_ci,
                upper_ci: c.upper_ci,
            })
            .collect();

        Ok(ProportionTestResults {
            rows,
            global_metadata: HashMap::new(),
        }
        .with_global_metadata("correction", correction.name()))
    }

    pub fn with_global_metadata(mut self, key: &str, value: &str) -> Self {
        self.global_metadata
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn p_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.p_value).collect()
    }

    pub fn adjusted_p_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.adj_p_value).collect()
    }

    /// Rows of the comparison against `group2`, in table order.
    pub fn comparison(&self, group2: &str) -> Vec<&ResultRow> {
        self.rows.iter().filter(|r| r.group2 == group2).collect()
    }

    pub fn significant(&self, alpha: f64, fold_difference: f64) -> Vec<&ResultRow> {
        self.rows
            .iter()
            .filter(|r| r.is_significant(alpha, fold_difference))
            .collect()
    }

    /// Get top n rows by adjusted p-value
    pub fn top_rows(&self, n: usize) -> Vec<&ResultRow> {
        let mut sorted: Vec<&ResultRow> = self.rows.iter().collect();
        sorted.sort_by(|a, b| {
            a.adj_p_value
                .partial_cmp(&b.adj_p_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    /// Pivot one numeric column into a cell type × comparison group matrix.
    ///
    /// Labels keep their order of first appearance in the table.
    pub fn pivot<F>(&self, value: F) -> ResultMatrix
    where
        F: Fn(&ResultRow) -> f64,
    {
        let mut row_labels: Vec<String> = Vec::new();
        let mut column_labels: Vec<String> = Vec::new();
        for row in &self.rows {
            if !row_labels.contains(&row.cell_type) {
                row_labels.push(row.cell_type.clone());
            }
            if !column_labels.contains(&row.group2) {
                column_labels.push(row.group2.clone());
            }
        }

        let mut values = Array2::from_elem((row_labels.len(), column_labels.len()), f64::NAN);
        for row in &self.rows {
            let i = row_labels.iter().position(|l| *l == row.cell_type);
            let j = column_labels.iter().position(|l| *l == row.group2);
            if let (Some(i), Some(j)) = (i, j) {
                values[[i, j]] = value(row);
            }
        }

        ResultMatrix {
            row_labels,
            column_labels,
            values,
        }
    }

    /// Write the table as CSV with a header row.
    pub fn write_csv<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_csv_path<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }
}
