use log::{
    debug,
    trace,
};

use super::candidates::integer_mass_shift;
use super::clusters::CandidateSlots;
use super::groups::IsotopeGroupResult;
use super::LabelingContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeReason {
    /// Two or more member rows in common
    SharedRows,
    /// Base peaks are isotopologues of each other
    IsotopeRelated,
    /// One shared member and matching enrichment behaviour
    ConsistentEnrichment,
}

fn ordered<'a>(
    a: &'a IsotopeGroupResult,
    b: &'a IsotopeGroupResult,
) -> (&'a IsotopeGroupResult, &'a IsotopeGroupResult) {
    if group_order(a, b).is_le() {
        (a, b)
    } else {
        (b, a)
    }
}

pub(crate) fn group_order(
    a: &IsotopeGroupResult,
    b: &IsotopeGroupResult,
) -> std::cmp::Ordering {
    a.base_mz
        .total_cmp(&b.base_mz)
        .then(a.base_rt.total_cmp(&b.base_rt))
        .then(a.base_row_id.cmp(&b.base_row_id))
}

fn relative_difference(
    a: f64,
    b: f64,
) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom == 0. {
        0.
    } else {
        (a - b).abs() / denom
    }
}

fn consistent_enrichment(
    a: &IsotopeGroupResult,
    b: &IsotopeGroupResult,
    shared: &[usize],
    tolerance: f64,
) -> bool {
    let ratio_of = |g: &IsotopeGroupResult, row: usize| {
        g.candidates
            .iter()
            .position(|c| c.row == row)
            .map(|i| g.statistics.isotopologues[i].enrichment_ratio)
    };
    let profiles_match = shared.iter().all(|row| match (ratio_of(a, *row), ratio_of(b, *row)) {
        (Some(ra), Some(rb)) => relative_difference(ra, rb) <= tolerance,
        _ => false,
    });
    let totals_match = relative_difference(
        a.statistics.total_intensity_ratio,
        b.statistics.total_intensity_ratio,
    ) <= tolerance;
    profiles_match && totals_match
}

pub fn merge_reason(
    a: &IsotopeGroupResult,
    b: &IsotopeGroupResult,
    ctx: &LabelingContext,
) -> Option<MergeReason> {
    let config = ctx.config;
    let shared = a.shared_rows(b);
    if shared.len() >= 2 {
        return Some(MergeReason::SharedRows);
    }

    if (a.base_rt - b.base_rt).abs() > config.rt_tolerance {
        return None;
    }

    let (light, heavy) = ordered(a, b);
    if integer_mass_shift(light.base_mz, heavy.base_mz, ctx.unit, config).is_some() {
        return Some(MergeReason::IsotopeRelated);
    }

    if shared.len() == 1 && consistent_enrichment(a, b, &shared, config.merge_profile_tolerance)
    {
        return Some(MergeReason::ConsistentEnrichment);
    }
    None
}

/// Shift of the heavier group's base within the lighter group's frame.
fn frame_offset(
    light: &IsotopeGroupResult,
    heavy: &IsotopeGroupResult,
    ctx: &LabelingContext,
) -> u32 {
    if let Some(shift) = light.shift_of(heavy.candidates[0].row) {
        return shift;
    }
    for row in heavy.shared_rows(light) {
        if let (Some(sl), Some(sh)) = (light.shift_of(row), heavy.shift_of(row)) {
            if sl >= sh {
                return sl - sh;
            }
        }
    }
    integer_mass_shift(light.base_mz, heavy.base_mz, ctx.unit, ctx.config).unwrap_or_else(|| {
        ((heavy.base_mz - light.base_mz) / ctx.unit).round().max(0.) as u32
    })
}

/// Union of two groups in the frame of the lighter base.
///
/// The lighter base keeps shift 0, every shift keeps a single row and
/// statistics are recomputed for the merged members.
pub fn merge_groups(
    a: &IsotopeGroupResult,
    b: &IsotopeGroupResult,
    ctx: &LabelingContext,
) -> IsotopeGroupResult {
    let (light, heavy) = ordered(a, b);
    let offset = frame_offset(light, heavy, ctx);
    let intensity_of = |row: usize| ctx.labeled_intensity(row);

    let mut slots = CandidateSlots::default();
    for cand in light.candidates.iter() {
        slots.insert(cand.shift, cand.row, &intensity_of);
    }
    for cand in heavy.candidates.iter() {
        let shift = cand.shift + offset;
        if shift == 0 || shift > ctx.config.max_isotopologues {
            continue;
        }
        slots.insert(shift, cand.row, &intensity_of);
    }

    let candidates = slots.into_candidates(ctx.labeled);
    match ctx.compute_statistics(&candidates) {
        Ok(statistics) => IsotopeGroupResult {
            cluster_id: 0,
            base_row_id: light.base_row_id,
            base_mz: light.base_mz,
            base_rt: light.base_rt,
            candidates,
            statistics,
        },
        Err(reason) => {
            debug!(
                "Could not recompute statistics after merging rows {} and {}: {:?}",
                light.base_row_id, heavy.base_row_id, reason
            );
            light.clone()
        },
    }
}

/// Merges overlapping groups until no pair qualifies.
///
/// Returns `None` when `is_canceled` fires between merge passes.
pub fn consolidate(
    mut groups: Vec<IsotopeGroupResult>,
    ctx: &LabelingContext,
    is_canceled: &dyn Fn() -> bool,
) -> Option<Vec<IsotopeGroupResult>> {
    let num_start = groups.len();
    groups.sort_by(group_order);

    loop {
        let mut merged_any = false;
        let mut i = 0;
        while i < groups.len() {
            if is_canceled() {
                return None;
            }
            let mut j = i + 1;
            while j < groups.len() {
                match merge_reason(&groups[i], &groups[j], ctx) {
                    Some(reason) => {
                        trace!(
                            "Merging cluster at row {} into row {} ({:?})",
                            groups[j].base_row_id,
                            groups[i].base_row_id,
                            reason
                        );
                        let other = groups.remove(j);
                        let merged = merge_groups(&groups[i], &other, ctx);
                        groups[i] = merged;
                        merged_any = true;
                        j = i + 1;
                    },
                    None => j += 1,
                }
            }
            i += 1;
        }
        if !merged_any {
            break;
        }
        groups.sort_by(group_order);
    }

    debug!("Consolidated {} clusters into {}", num_start, groups.len());
    Some(groups)
}
