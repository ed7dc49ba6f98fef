//! # single-proportion
//!
//! Permutation testing of cell type proportion differences between groups of single-cell
//! data, part of the single-rust ecosystem.
//!
//! For a reference group and one or more comparison groups, the crate reports for every
//! cell type the log2 ratio of its proportion in the comparison group over the reference
//! group, a percentile bootstrap confidence interval of that ratio, an empirical
//! two-sided permutation p-value, and a p-value adjusted for multiple testing across
//! every comparison of the run.
//!
//! ## Core Features
//!
//! - **Permutation Test**: label shuffling of the pooled cells of two groups
//! - **Bootstrap Confidence Intervals**: resampling with replacement within each group
//! - **Multiple Testing Correction**: FDR (Benjamini-Hochberg by default), Bonferroni and others
//! - **Parallel Comparisons**: one rayon task per comparison group, reproducible from one seed
//!
//! ## Quick Start
//!
//! ```rust
//! use single_proportion::observations::ObservationTable;
//! use single_proportion::testing::ProportionTestConfig;
//! use single_proportion::testing::inference::ProportionStatTests;
//!
//! let groups = ["ctrl", "ctrl", "ctrl", "ctrl", "A", "A", "A", "A"];
//! let types = ["T", "B", "T", "B", "T", "T", "T", "B"];
//! let table = ObservationTable::new((0..8).map(|i| format!("cell_{}", i)).collect())
//!     .with_column("group", groups)?
//!     .with_column("cell_type", types)?;
//!
//! let config = ProportionTestConfig::quick().with_seed(42);
//! let results = table.multiple_permutation_test("ctrl", &["A"], &config)?;
//! assert_eq!(results.len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Module Organization
//!
//! - **[`observations`]**: Observation label access and the in-memory observation table
//! - **[`testing`]**: Effect estimation, resampling, correction and result tables
//! - **[`error`]**: Validation error kinds

pub mod error;
pub mod observations;
pub mod testing;

pub use error::ProportionError;
