use crate::observations::ObservationSource;
use std::collections::HashMap;

/// Category labels of a two-group partition, encoded as dense integer codes.
///
/// Codes index into `labels`, which lists every category present in either group in
/// order of first appearance (group1 observations first, then group2).
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCodes {
    pub labels: Vec<String>,
    pub group1: Vec<usize>,
    pub group2: Vec<usize>,
}

impl CategoryCodes {
    pub fn encode<S>(source: &S, group1_ids: &[usize], group2_ids: &[usize]) -> Self
    where
        S: ObservationSource + ?Sized,
    {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut labels = Vec::new();

        let mut encode_group = |ids: &[usize]| -> Vec<usize> {
            ids.iter()
                .map(|&id| {
                    let label = source.category_of(id);
                    *index.entry(label).or_insert_with(|| {
                        labels.push(label.to_string());
                        labels.len() - 1
                    })
                })
                .collect()
        };

        let group1 = encode_group(group1_ids);
        let group2 = encode_group(group2_ids);

        CategoryCodes {
            labels,
            group1,
            group2,
        }
    }

    pub fn n_categories(&self) -> usize {
        self.labels.len()
    }

    /// Permutation pool: group2 codes followed by group1 codes.
    pub fn pool(&self) -> Vec<usize> {
        let mut pool = Vec::with_capacity(self.group1.len() + self.group2.len());
        pool.extend_from_slice(&self.group2);
        pool.extend_from_slice(&self.group1);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observations::ObservationTable;

    #[test]
    fn test_encode_first_appearance_order() {
        let table = ObservationTable::new((0..7).map(|i| i.to_string()).collect())
            .with_column("group", ["a", "b", "a", "c", "b", "a", "b"])
            .unwrap()
            .with_column("cell_type", ["NK", "T", "B", "Mono", "NK", "NK", "DC"])
            .unwrap();
        let labels = table.labels("group", "cell_type").unwrap();

        let a = labels.observations_in_group("a");
        let b = labels.observations_in_group("b");
        let codes = CategoryCodes::encode(&labels, &a, &b);

        // "Mono" belongs to group c and is not part of the partition
        assert_eq!(codes.labels, vec!["NK", "B", "T", "DC"]);
        assert_eq!(codes.group1, vec![0, 1, 0]);
        assert_eq!(codes.group2, vec![2, 0, 3]);
        assert_eq!(codes.n_categories(), 4);
        assert_eq!(codes.pool(), vec![2, 0, 3, 0, 1, 0]);
    }
}
