use std::collections::{
    BTreeMap,
    HashSet,
};

use log::trace;

use super::candidates::{
    IsotopeCandidate,
    IsotopePair,
};
use super::config::LabelingConfig;
use super::Rejection;
use crate::features::FeatureList;

/// Isotopologues below this fraction of the base peak count as noise.
pub const MIN_RELATIVE_ISOTOPOLOGUE_INTENSITY: f64 = 0.005;

/// Candidate isotopologue series, sorted by shift, base at shift 0.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeCluster {
    pub candidates: Vec<IsotopeCandidate>,
}

impl IsotopeCluster {
    pub fn base(&self) -> &IsotopeCandidate {
        &self.candidates[0]
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn max_shift(&self) -> u32 {
        self.candidates.last().map(|x| x.shift).unwrap_or(0)
    }
}

/// Shift -> row map that keeps at most one row per shift and one shift
/// per row. On conflicts the more intense row wins.
#[derive(Debug, Default)]
pub(crate) struct CandidateSlots {
    by_shift: BTreeMap<u32, usize>,
    rows: HashSet<usize>,
}

impl CandidateSlots {
    pub(crate) fn insert(
        &mut self,
        shift: u32,
        row: usize,
        intensity_of: &dyn Fn(usize) -> f64,
    ) -> bool {
        if self.rows.contains(&row) {
            return false;
        }
        match self.by_shift.get(&shift).copied() {
            Some(current) if intensity_of(current) >= intensity_of(row) => false,
            Some(current) => {
                self.rows.remove(&current);
                self.rows.insert(row);
                self.by_shift.insert(shift, row);
                true
            },
            None => {
                self.rows.insert(row);
                self.by_shift.insert(shift, row);
                true
            },
        }
    }

    pub(crate) fn into_candidates(
        self,
        list: &FeatureList,
    ) -> Vec<IsotopeCandidate> {
        self.by_shift
            .into_iter()
            .map(|(shift, row)| IsotopeCandidate {
                row,
                row_id: list.rows()[row].id,
                shift,
            })
            .collect()
    }
}

struct Expansion<'a> {
    by_base: &'a BTreeMap<usize, Vec<IsotopePair>>,
    config: &'a LabelingConfig,
    intensity_of: &'a dyn Fn(usize) -> f64,
    visited: HashSet<(usize, u32)>,
}

impl Expansion<'_> {
    fn expand(
        &mut self,
        slots: &mut CandidateSlots,
        row: usize,
        offset: u32,
        depth: usize,
    ) {
        if depth >= self.config.max_recursion_depth || !self.visited.insert((row, offset)) {
            return;
        }
        let Some(pairs) = self.by_base.get(&row) else {
            return;
        };
        for pair in pairs.iter() {
            let shift = offset + pair.shift;
            if shift > self.config.max_isotopologues {
                continue;
            }
            // Rows that lose their slot do not pull in heavier partners
            if slots.insert(shift, pair.labeled, self.intensity_of) {
                self.expand(slots, pair.labeled, shift, depth + 1);
            }
        }
    }
}

/// One cluster per base row, expanded through chains of pairs.
pub fn seed_clusters(
    pairs: &[IsotopePair],
    list: &FeatureList,
    config: &LabelingConfig,
) -> Vec<IsotopeCluster> {
    let mut by_base: BTreeMap<usize, Vec<IsotopePair>> = BTreeMap::new();
    for pair in pairs.iter() {
        by_base.entry(pair.base).or_default().push(*pair);
    }

    let rows = list.rows();
    let intensity_of = |i: usize| list.mean_intensity(&rows[i], config.intensity_measure);

    by_base
        .keys()
        .map(|&base| {
            let mut slots = CandidateSlots::default();
            slots.insert(0, base, &intensity_of);
            let mut expansion = Expansion {
                by_base: &by_base,
                config,
                intensity_of: &intensity_of,
                visited: HashSet::new(),
            };
            expansion.expand(&mut slots, base, 0, 0);
            IsotopeCluster {
                candidates: slots.into_candidates(list),
            }
        })
        .collect()
}

/// Size, completeness and intensity checks that need no statistics.
pub fn filter_cluster(
    cluster: &IsotopeCluster,
    list: &FeatureList,
    config: &LabelingConfig,
) -> Result<(), Rejection> {
    if cluster.len() < config.min_pattern_size {
        return Err(Rejection::TooSmall);
    }

    if !config.allow_incomplete_patterns {
        let completeness = cluster.len() as f64 / (cluster.max_shift() as f64 + 1.);
        if completeness < config.min_pattern_completeness {
            trace!(
                "Cluster at row {} is only {:.0}% complete",
                cluster.base().row_id,
                completeness * 100.
            );
            return Err(Rejection::Incomplete);
        }
    }

    let rows = list.rows();
    let measure = config.intensity_measure;
    let base_intensity = list.mean_intensity(&rows[cluster.base().row], measure);
    let num_weak = cluster.candidates[1..]
        .iter()
        .filter(|c| {
            list.mean_intensity(&rows[c.row], measure)
                < base_intensity * MIN_RELATIVE_ISOTOPOLOGUE_INTENSITY
        })
        .count();
    if num_weak * 2 > cluster.len() - 1 {
        return Err(Rejection::LowIntensity);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::features::{
        Feature,
        FeatureRow,
    };

    fn list(rows: &[(u32, f64, f64)]) -> FeatureList {
        let rows = rows
            .iter()
            .map(|(id, mz, height)| {
                FeatureRow::new(
                    *id,
                    BTreeMap::from([(
                        0,
                        Feature {
                            mz: *mz,
                            rt: 1.0,
                            height: *height,
                            area: *height,
                        },
                    )]),
                )
            })
            .collect();
        FeatureList::new("test", vec!["f".into()], rows).unwrap()
    }

    fn pair(
        base: usize,
        labeled: usize,
        shift: u32,
    ) -> IsotopePair {
        IsotopePair {
            base,
            shift,
            labeled,
        }
    }

    fn shifts(cluster: &IsotopeCluster) -> Vec<(u32, u32)> {
        cluster.candidates.iter().map(|c| (c.row_id, c.shift)).collect()
    }

    #[test]
    fn test_expansion_chains_shifts() {
        let features = list(&[(10, 100., 1000.), (11, 102., 500.), (12, 105., 300.)]);
        // 10 -> 11 (+2), 11 -> 12 (+3): no direct pair 10 -> 12
        let pairs = vec![pair(0, 1, 2), pair(1, 2, 3)];
        let clusters = seed_clusters(&pairs, &features, &LabelingConfig::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(shifts(&clusters[0]), vec![(10, 0), (11, 2), (12, 5)]);
        assert_eq!(shifts(&clusters[1]), vec![(11, 0), (12, 3)]);
    }

    #[test]
    fn test_expansion_respects_limits() {
        let features = list(&[(1, 100., 1000.), (2, 104., 500.), (3, 108., 300.), (4, 112., 100.)]);
        let pairs = vec![pair(0, 1, 4), pair(1, 2, 4), pair(2, 3, 4)];
        let config = LabelingConfig {
            max_isotopologues: 10,
            max_recursion_depth: 3,
            ..Default::default()
        };
        let clusters = seed_clusters(&pairs, &features, &config);
        // 4 + 4 + 4 = 12 > 10
        assert_eq!(shifts(&clusters[0]), vec![(1, 0), (2, 4), (3, 8)]);

        let shallow = LabelingConfig {
            max_recursion_depth: 1,
            ..config
        };
        let clusters = seed_clusters(&pairs, &features, &shallow);
        assert_eq!(shifts(&clusters[0]), vec![(1, 0), (2, 4)]);
    }

    #[test]
    fn test_shift_conflicts_keep_intense_row() {
        let features = list(&[(1, 100., 1000.), (2, 101., 50.), (3, 101.001, 400.)]);
        let pairs = vec![pair(0, 1, 1), pair(0, 2, 1)];
        let clusters = seed_clusters(&pairs, &features, &LabelingConfig::default());
        assert_eq!(shifts(&clusters[0]), vec![(1, 0), (3, 1)]);
    }

    #[test]
    fn test_losing_row_is_not_expanded() {
        let features = list(&[
            (1, 100., 1000.),
            (2, 101., 500.),
            (3, 101.001, 100.),
            (4, 102.001, 50.),
        ]);
        // Row 3 loses M+1 to row 2, so its partner row 4 stays out
        let pairs = vec![pair(0, 1, 1), pair(0, 2, 1), pair(2, 3, 1)];
        let clusters = seed_clusters(&pairs, &features, &LabelingConfig::default());
        assert_eq!(shifts(&clusters[0]), vec![(1, 0), (2, 1)]);
        assert_eq!(shifts(&clusters[1]), vec![(3, 0), (4, 1)]);
    }

    #[test]
    fn test_filters() {
        let features = list(&[
            (1, 100., 1000.),
            (2, 101., 100.),
            (3, 106., 100.),
            (4, 102., 1.),
            (5, 103., 2.),
        ]);
        let cand = |row: usize, shift: u32| IsotopeCandidate {
            row,
            row_id: features.rows()[row].id,
            shift,
        };
        let config = LabelingConfig {
            min_pattern_size: 3,
            ..Default::default()
        };

        let small = IsotopeCluster {
            candidates: vec![cand(0, 0), cand(1, 1)],
        };
        assert_eq!(filter_cluster(&small, &features, &config), Err(Rejection::TooSmall));

        let gappy = IsotopeCluster {
            candidates: vec![cand(0, 0), cand(1, 1), cand(2, 6)],
        };
        assert_eq!(filter_cluster(&gappy, &features, &config), Err(Rejection::Incomplete));
        let lenient = LabelingConfig {
            allow_incomplete_patterns: true,
            ..config.clone()
        };
        assert_eq!(filter_cluster(&gappy, &features, &lenient), Ok(()));

        let weak = IsotopeCluster {
            candidates: vec![cand(0, 0), cand(1, 1), cand(3, 2), cand(4, 3)],
        };
        assert_eq!(filter_cluster(&weak, &features, &config), Err(Rejection::LowIntensity));
    }
}
