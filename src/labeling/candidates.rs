use log::{
    debug,
    info,
};
use serde::Serialize;

use super::config::LabelingConfig;
use crate::features::FeatureList;
use crate::utils;

/// A row at a hypothesized position of an isotopologue series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IsotopeCandidate {
    /// Index of the row in the labeled feature list.
    #[serde(skip)]
    pub row: usize,
    pub row_id: u32,
    pub shift: u32,
}

/// `labeled` is `shift` tracer units heavier than `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IsotopePair {
    pub base: usize,
    pub shift: u32,
    pub labeled: usize,
}

/// Integer number of tracer units between two m/z values, if the
/// difference lands on one within tolerance and inside `[1, max_shift]`.
pub fn integer_mass_shift(
    base_mz: f64,
    other_mz: f64,
    unit: f64,
    config: &LabelingConfig,
) -> Option<u32> {
    let delta = other_mz - base_mz;
    if delta <= 0. {
        return None;
    }
    let shift = (delta / unit).round();
    if shift < 1. || shift > config.max_isotopologues as f64 {
        return None;
    }
    let residual = (delta - shift * unit).abs();
    if residual > config.mz_tolerance.tolerance_at(base_mz) {
        return None;
    }
    Some(shift as u32)
}

/// All co-eluting row pairs of `list` whose m/z difference is a whole
/// number of tracer units.
///
/// Output is sorted by base row, then shift.
pub fn find_isotope_pairs(
    list: &FeatureList,
    config: &LabelingConfig,
    unit: f64,
) -> Vec<IsotopePair> {
    let mut timer = utils::ContextTimer::new("Isotope pair search", true, log::Level::Debug);
    let rows = list.rows();
    let rt_sorted = list.rt_sorted_indices();
    let measure = config.intensity_measure;
    let is_searchable =
        |i: usize| list.mean_intensity(&rows[i], measure) >= config.min_base_intensity;

    let mut pairs = Vec::new();
    for (pos, &a) in rt_sorted.iter().enumerate() {
        let rt_a = rows[a].average_rt() as f64;
        let (_, right) = utils::range_by_key(
            &rt_sorted,
            |i| rows[*i].average_rt() as f64,
            rt_a - config.rt_tolerance as f64,
            rt_a + config.rt_tolerance as f64,
        );

        for &b in rt_sorted[(pos + 1)..right].iter() {
            let (base, heavy) = if rows[a].average_mz() <= rows[b].average_mz() {
                (a, b)
            } else {
                (b, a)
            };
            if !is_searchable(base) {
                continue;
            }
            if let Some(shift) = integer_mass_shift(
                rows[base].average_mz(),
                rows[heavy].average_mz(),
                unit,
                config,
            ) {
                pairs.push(IsotopePair {
                    base,
                    shift,
                    labeled: heavy,
                });
            }
        }
    }

    pairs.sort();
    info!("Found {} isotope pairs among {} rows", pairs.len(), rows.len());
    debug!("Pairs from {} distinct base rows", {
        let mut bases: Vec<usize> = pairs.iter().map(|x| x.base).collect();
        bases.dedup();
        bases.len()
    });
    timer.stop(true);
    pairs
}

/// Rows of a feature list sorted by m/z for tolerance lookups.
pub struct MzIndex<'a> {
    list: &'a FeatureList,
    sorted: Vec<usize>,
}

impl<'a> MzIndex<'a> {
    pub fn new(list: &'a FeatureList) -> Self {
        let rows = list.rows();
        let mut sorted: Vec<usize> = (0..rows.len()).collect();
        sorted.sort_by(|a, b| {
            rows[*a]
                .average_mz()
                .total_cmp(&rows[*b].average_mz())
                .then(rows[*a].id.cmp(&rows[*b].id))
        });
        MzIndex { list, sorted }
    }

    /// Closest row in m/z that matches both tolerances.
    pub fn find(
        &self,
        mz: f64,
        rt: f32,
        config: &LabelingConfig,
    ) -> Option<usize> {
        let rows = self.list.rows();
        let tol = config.mz_tolerance.tolerance_at(mz);
        let (left, right) =
            utils::range_by_key(&self.sorted, |i| rows[*i].average_mz(), mz - tol, mz + tol);
        self.sorted[left..right]
            .iter()
            .copied()
            .filter(|i| (rows[*i].average_rt() - rt).abs() <= config.rt_tolerance)
            .min_by(|a, b| {
                let da = (rows[*a].average_mz() - mz).abs();
                let db = (rows[*b].average_mz() - mz).abs();
                da.total_cmp(&db)
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::features::{
        Feature,
        FeatureRow,
    };

    const UNIT: f64 = 1.0033548378;

    fn list(rows: &[(u32, f64, f32)]) -> FeatureList {
        let rows = rows
            .iter()
            .map(|(id, mz, rt)| {
                FeatureRow::new(
                    *id,
                    BTreeMap::from([(
                        0,
                        Feature {
                            mz: *mz,
                            rt: *rt,
                            height: 1000.,
                            area: 1000.,
                        },
                    )]),
                )
            })
            .collect();
        FeatureList::new("test", vec!["f".into()], rows).unwrap()
    }

    #[test]
    fn test_integer_mass_shift() {
        let config = LabelingConfig::default();
        assert_eq!(integer_mass_shift(200., 200. + 3. * UNIT, UNIT, &config), Some(3));
        assert_eq!(integer_mass_shift(200. + UNIT, 200., UNIT, &config), None);
        // 0.5 units off
        assert_eq!(integer_mass_shift(200., 200. + 1.5 * UNIT, UNIT, &config), None);
        // beyond max_isotopologues
        assert_eq!(integer_mass_shift(200., 200. + 11. * UNIT, UNIT, &config), None);
        // within the 0.002 Da floor
        assert_eq!(
            integer_mass_shift(200., 200. + 2. * UNIT + 0.0015, UNIT, &config),
            Some(2)
        );
    }

    #[test]
    fn test_pairs_respect_rt_tolerance() {
        let config = LabelingConfig::default();
        let features = list(&[
            (1, 150.0, 2.00),
            (2, 150.0 + UNIT, 2.02),
            (3, 150.0 + 2. * UNIT, 2.30),
            (4, 150.0 + 2. * UNIT, 1.99),
            (5, 150.7, 2.00),
        ]);
        let pairs = find_isotope_pairs(&features, &config, UNIT);
        let as_ids: Vec<(u32, u32, u32)> = pairs
            .iter()
            .map(|p| {
                (
                    features.rows()[p.base].id,
                    features.rows()[p.labeled].id,
                    p.shift,
                )
            })
            .collect();
        assert_eq!(as_ids, vec![(1, 2, 1), (1, 4, 2), (2, 4, 1)]);
    }

    #[test]
    fn test_mz_index_prefers_closest() {
        let config = LabelingConfig::default();
        let features = list(&[(1, 300.0, 5.0), (2, 300.0015, 5.0), (3, 300.0005, 9.0)]);
        let index = MzIndex::new(&features);
        assert_eq!(index.find(300.0012, 5.01, &config), Some(1));
        assert_eq!(index.find(300.0005, 9.0, &config), Some(2));
        assert_eq!(index.find(310.0, 5.0, &config), None);
    }
}
