//! Observation metadata access.
//!
//! The resampling engine never touches a data container directly. It reads group and
//! category labels through [`ObservationSource`], which any annotated-data container can
//! implement. [`ObservationTable`] is a small in-memory implementation holding string
//! label columns, comparable to the `obs` frame of an AnnData object, and can be loaded
//! from a CSV/TSV export of that frame.

use crate::error::ProportionError;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Read-only label lookups consumed by the permutation test.
///
/// Observations are identified by their row position (`0..n_observations()`).
/// Implementations must be `Sync`: comparisons run concurrently and share the source.
pub trait ObservationSource: Sync {
    fn n_observations(&self) -> usize;

    /// Positions of all observations whose group label equals `group`, in row order.
    fn observations_in_group(&self, group: &str) -> Vec<usize>;

    /// Category label of the observation at `observation`.
    fn category_of(&self, observation: usize) -> &str;

    fn contains_group(&self, group: &str) -> bool {
        !self.observations_in_group(group).is_empty()
    }
}

/// Observation names plus named string columns of equal length.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    obs_names: Vec<String>,
    column_names: Vec<String>,
    columns: HashMap<String, Vec<String>>,
}

impl ObservationTable {
    pub fn new(obs_names: Vec<String>) -> Self {
        ObservationTable {
            obs_names,
            column_names: Vec::new(),
            columns: HashMap::new(),
        }
    }

    /// Add a column, consuming and returning the table.
    pub fn with_column<I, S>(mut self, name: &str, values: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_column(name, values.into_iter().map(Into::into).collect())?;
        Ok(self)
    }

    /// Insert or replace a column. The column must have one value per observation.
    pub fn insert_column(&mut self, name: &str, values: Vec<String>) -> anyhow::Result<()> {
        if values.len() != self.obs_names.len() {
            return Err(ProportionError::LengthMismatch {
                column: name.to_string(),
                expected: self.obs_names.len(),
                actual: values.len(),
            }
            .into());
        }
        if !self.columns.contains_key(name) {
            self.column_names.push(name.to_string());
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Load a table from delimited text.
    ///
    /// The first header field names the observation index (it may be empty, as in a
    /// pandas export); every further field becomes a string column.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(ProportionError::EmptyData(
                "Observation table needs an index column and at least one label column".to_string(),
            )
            .into());
        }

        let column_names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
        let mut obs_names = Vec::new();
        let mut values: Vec<Vec<String>> = vec![Vec::new(); column_names.len()];

        for record in csv_reader.records() {
            let record = record?;
            obs_names.push(record.get(0).unwrap_or_default().to_string());
            for (column, field) in values.iter_mut().zip(record.iter().skip(1)) {
                column.push(field.to_string());
            }
        }

        if obs_names.is_empty() {
            return Err(ProportionError::EmptyData("No observations in table".to_string()).into());
        }

        let mut table = ObservationTable::new(obs_names);
        for (name, column) in column_names.iter().zip(values) {
            if table.has_column(name) {
                return Err(ProportionError::InvalidParameter(format!(
                    "Duplicate column '{}'",
                    name
                ))
                .into());
            }
            table.insert_column(name, column)?;
        }
        Ok(table)
    }

    /// Load a table from a file, tab-delimited for `.tsv`/`.txt`, comma-delimited otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let delimiter = match path.extension().and_then(|ext| ext.to_str()) {
            Some("tsv") | Some("txt") => b'\t',
            _ => b',',
        };
        let file = std::fs::File::open(path)?;
        Self::from_reader(file, delimiter)
    }

    pub fn n_obs(&self) -> usize {
        self.obs_names.len()
    }

    pub fn obs_names(&self) -> &[String] {
        &self.obs_names
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&[String]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Resolve the group and category columns into an [`ObservationSource`].
    pub fn labels<'a>(
        &'a self,
        group_col: &str,
        cell_type_col: &str,
    ) -> anyhow::Result<LabeledObservations<'a>> {
        let groups = self
            .column(group_col)
            .ok_or_else(|| ProportionError::MissingColumn(group_col.to_string()))?;
        let categories = self
            .column(cell_type_col)
            .ok_or_else(|| ProportionError::MissingColumn(cell_type_col.to_string()))?;
        LabeledObservations::new(groups, categories)
    }
}

/// Borrowed group and category label columns.
#[derive(Debug, Clone, Copy)]
pub struct LabeledObservations<'a> {
    groups: &'a [String],
    categories: &'a [String],
}

impl<'a> LabeledObservations<'a> {
    /// Both slices are indexed by observation position.
    ///
    /// # Errors
    ///
    /// `LengthMismatch` when the category column does not have one label per group label.
    pub fn new(groups: &'a [String], categories: &'a [String]) -> anyhow::Result<Self> {
        if groups.len() != categories.len() {
            return Err(ProportionError::LengthMismatch {
                column: "categories".to_string(),
                expected: groups.len(),
                actual: categories.len(),
            }
            .into());
        }
        Ok(LabeledObservations { groups, categories })
    }

    /// Distinct group labels in order of first appearance.
    pub fn group_labels(&self) -> Vec<&'a str> {
        let mut seen = Vec::new();
        for group in self.groups {
            if !seen.contains(&group.as_str()) {
                seen.push(group.as_str());
            }
        }
        seen
    }
}

impl ObservationSource for LabeledObservations<'_> {
    fn n_observations(&self) -> usize {
        self.groups.len()
    }

    fn observations_in_group(&self, group: &str) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter_map(|(i, g)| if g == group { Some(i) } else { None })
            .collect()
    }

    fn category_of(&self, observation: usize) -> &str {
        &self.categories[observation]
    }

    fn contains_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
