use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

use super::feature_list::{
    FeatureList,
    IntensityMeasure,
};
use crate::error::Result;

/// Column-oriented copy of a feature list with annotation columns.
///
/// One instance is created per task and owned by it until committed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFeatureTable {
    pub name: String,
    raw_files: Vec<String>,
    row_ids: Vec<u32>,
    mz: Vec<f64>,
    rt: Vec<f32>,
    /// `intensities[file][row]`
    intensities: Vec<Vec<f64>>,
    cluster_id: Vec<Option<u32>>,
    isotopologue_rank: Vec<Option<u32>>,
    comment: Vec<String>,
    row_lookup: HashMap<u32, usize>,
}

#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    row_id: u32,
    mz: f64,
    rt: f32,
    cluster_id: Option<u32>,
    isotopologue_rank: Option<u32>,
    comment: &'a str,
}

impl ResultFeatureTable {
    pub fn from_feature_list(
        name: impl Into<String>,
        source: &FeatureList,
        measure: IntensityMeasure,
    ) -> Self {
        let rows = source.rows();
        let intensities = (0..source.num_files())
            .map(|f| rows.iter().map(|r| r.intensity(f, measure)).collect())
            .collect();
        ResultFeatureTable {
            name: name.into(),
            raw_files: source.raw_files().to_vec(),
            row_ids: rows.iter().map(|r| r.id).collect(),
            mz: rows.iter().map(|r| r.average_mz()).collect(),
            rt: rows.iter().map(|r| r.average_rt()).collect(),
            intensities,
            cluster_id: vec![None; rows.len()],
            isotopologue_rank: vec![None; rows.len()],
            comment: vec![String::new(); rows.len()],
            row_lookup: rows.iter().enumerate().map(|(i, r)| (r.id, i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    pub fn raw_files(&self) -> &[String] {
        &self.raw_files
    }

    pub fn row_ids(&self) -> &[u32] {
        &self.row_ids
    }

    fn index_of(
        &self,
        row_id: u32,
    ) -> Option<usize> {
        self.row_lookup.get(&row_id).copied()
    }

    pub fn mz(
        &self,
        row_id: u32,
    ) -> Option<f64> {
        self.index_of(row_id).map(|i| self.mz[i])
    }

    pub fn rt(
        &self,
        row_id: u32,
    ) -> Option<f32> {
        self.index_of(row_id).map(|i| self.rt[i])
    }

    pub fn intensity(
        &self,
        row_id: u32,
        file: usize,
    ) -> Option<f64> {
        let i = self.index_of(row_id)?;
        self.intensities.get(file).map(|col| col[i])
    }

    pub fn cluster_id(
        &self,
        row_id: u32,
    ) -> Option<u32> {
        self.index_of(row_id).and_then(|i| self.cluster_id[i])
    }

    pub fn isotopologue_rank(
        &self,
        row_id: u32,
    ) -> Option<u32> {
        self.index_of(row_id).and_then(|i| self.isotopologue_rank[i])
    }

    pub fn comment(
        &self,
        row_id: u32,
    ) -> Option<&str> {
        self.index_of(row_id).map(|i| self.comment[i].as_str())
    }

    /// Writes the annotation of a row.
    ///
    /// A row that already carries a cluster keeps it, the comment is
    /// appended either way. Returns false for unknown rows.
    pub fn annotate(
        &mut self,
        row_id: u32,
        cluster_id: u32,
        rank: u32,
        comment: &str,
    ) -> bool {
        let Some(i) = self.index_of(row_id) else {
            return false;
        };
        if self.cluster_id[i].is_none() {
            self.cluster_id[i] = Some(cluster_id);
            self.isotopologue_rank[i] = Some(rank);
        }
        if !self.comment[i].is_empty() {
            self.comment[i].push_str("; ");
        }
        self.comment[i].push_str(comment);
        true
    }

    pub fn num_annotated(&self) -> usize {
        self.cluster_id.iter().filter(|x| x.is_some()).count()
    }

    pub fn write_csv(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for i in 0..self.len() {
            wtr.serialize(ResultRecord {
                row_id: self.row_ids[i],
                mz: self.mz[i],
                rt: self.rt[i],
                cluster_id: self.cluster_id[i],
                isotopologue_rank: self.isotopologue_rank[i],
                comment: &self.comment[i],
            })?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::features::feature_list::{
        Feature,
        FeatureRow,
    };

    fn list() -> FeatureList {
        let row = |id: u32, mz: f64| {
            FeatureRow::new(
                id,
                BTreeMap::from([(
                    0,
                    Feature {
                        mz,
                        rt: 3.0,
                        height: 100.,
                        area: 1000.,
                    },
                )]),
            )
        };
        FeatureList::new("lab", vec!["f1".into()], vec![row(4, 200.), row(9, 201.)]).unwrap()
    }

    #[test]
    fn test_annotation_columns() {
        let mut table =
            ResultFeatureTable::from_feature_list("out", &list(), IntensityMeasure::Area);
        assert_eq!(table.len(), 2);
        assert_eq!(table.intensity(9, 0), Some(1000.));
        assert_eq!(table.cluster_id(4), None);

        assert!(table.annotate(4, 1, 0, "first"));
        assert!(table.annotate(4, 2, 3, "second"));
        assert!(!table.annotate(42, 1, 0, "missing"));

        assert_eq!(table.cluster_id(4), Some(1));
        assert_eq!(table.isotopologue_rank(4), Some(0));
        assert_eq!(table.comment(4), Some("first; second"));
        assert_eq!(table.num_annotated(), 1);
    }
}
