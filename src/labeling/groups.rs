use std::path::Path;

use serde::Serialize;

use super::candidates::IsotopeCandidate;
use super::statistics::ClusterStatistics;
use crate::error::Result;

/// A validated isotopologue series with its enrichment statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsotopeGroupResult {
    /// Zero until the group is annotated.
    pub cluster_id: u32,
    pub base_row_id: u32,
    pub base_mz: f64,
    pub base_rt: f32,
    pub candidates: Vec<IsotopeCandidate>,
    pub statistics: ClusterStatistics,
}

impl IsotopeGroupResult {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn shift_of(
        &self,
        row: usize,
    ) -> Option<u32> {
        self.candidates
            .iter()
            .find(|c| c.row == row)
            .map(|c| c.shift)
    }

    /// Labeled-list row indices present in both groups, in shift order of `self`.
    pub fn shared_rows(
        &self,
        other: &IsotopeGroupResult,
    ) -> Vec<usize> {
        self.candidates
            .iter()
            .filter(|c| other.shift_of(c.row).is_some())
            .map(|c| c.row)
            .collect()
    }

    pub fn shifts(&self) -> Vec<u32> {
        self.candidates.iter().map(|c| c.shift).collect()
    }
}

#[derive(Debug, Serialize)]
struct GroupCsvRecord {
    cluster_id: u32,
    base_row_id: u32,
    base_mz: f64,
    base_rt: f32,
    row_id: u32,
    shift: u32,
    unlabeled_mean: f64,
    unlabeled_sd: f64,
    labeled_mean: f64,
    labeled_sd: f64,
    enrichment_ratio: f64,
    p_value: f64,
}

/// One line per isotopologue.
pub fn write_groups_csv(
    groups: &[IsotopeGroupResult],
    path: impl AsRef<Path>,
) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for group in groups {
        for (cand, stats) in group
            .candidates
            .iter()
            .zip(group.statistics.isotopologues.iter())
        {
            wtr.serialize(GroupCsvRecord {
                cluster_id: group.cluster_id,
                base_row_id: group.base_row_id,
                base_mz: group.base_mz,
                base_rt: group.base_rt,
                row_id: cand.row_id,
                shift: cand.shift,
                unlabeled_mean: stats.unlabeled_mean,
                unlabeled_sd: stats.unlabeled_sd,
                labeled_mean: stats.labeled_mean,
                labeled_sd: stats.labeled_sd,
                enrichment_ratio: stats.enrichment_ratio,
                p_value: stats.p_value,
            })?;
        }
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_groups_json(
    groups: &[IsotopeGroupResult],
    path: impl AsRef<Path>,
) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, groups)?;
    Ok(())
}
