use super::consolidation::group_order;
use super::groups::IsotopeGroupResult;
use crate::features::ResultFeatureTable;

/// Sorts groups by base m/z and RT and numbers them from 1.
pub fn assign_cluster_ids(groups: &mut [IsotopeGroupResult]) {
    groups.sort_by(group_order);
    for (i, group) in groups.iter_mut().enumerate() {
        group.cluster_id = i as u32 + 1;
    }
}

pub fn row_comment(
    group: &IsotopeGroupResult,
    position: usize,
) -> String {
    let cand = &group.candidates[position];
    let stats = &group.statistics.isotopologues[position];
    let significance = if group.statistics.single_sample {
        format!("deviation {:.3}", group.statistics.total_deviation)
    } else {
        format!("p={:.2e}", stats.p_value)
    };
    format!(
        "Labeled cluster {}: base m/z {:.4} @ {:.2} min, M+{}, enrichment {:.2}, {}",
        group.cluster_id,
        group.base_mz,
        group.base_rt,
        cand.shift,
        stats.enrichment_ratio,
        significance
    )
}

/// Writes cluster id, isotopologue rank and a comment to every member row.
///
/// Returns the number of rows written.
pub fn annotate_table(
    groups: &[IsotopeGroupResult],
    table: &mut ResultFeatureTable,
) -> usize {
    let mut written = 0;
    for group in groups.iter() {
        for (position, cand) in group.candidates.iter().enumerate() {
            let comment = row_comment(group, position);
            if table.annotate(cand.row_id, group.cluster_id, cand.shift, &comment) {
                written += 1;
            }
        }
    }
    written
}
