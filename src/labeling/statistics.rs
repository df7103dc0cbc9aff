use log::trace;
use serde::Serialize;
use statrs::distribution::{
    ContinuousCDF,
    StudentsT,
};

use super::candidates::{
    IsotopeCandidate,
    MzIndex,
};
use super::config::LabelingConfig;
use super::Rejection;
use crate::features::{
    FeatureList,
    FeatureRow,
};
use crate::utils::RollingSDCalculator;

/// Shift jumps of at least this many units skip the monotonicity check.
/// Fully labeled precursors (e.g. glucose M+6) show up as a lone heavy peak.
pub const LARGE_SHIFT_STEP: u32 = 3;

/// Enrichment ratio reported when the unlabeled mean is zero.
pub const MAX_ENRICHMENT_RATIO: f64 = 1000.;

/// Sum of absolute relative-intensity differences a cluster needs in
/// single-sample mode.
pub const SINGLE_SAMPLE_MIN_DEVIATION: f64 = 0.1;

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IsotopologueStats {
    pub unlabeled_mean: f64,
    pub unlabeled_sd: f64,
    pub labeled_mean: f64,
    pub labeled_sd: f64,
    pub enrichment_ratio: f64,
    pub p_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterStatistics {
    /// Parallel to the cluster candidates.
    pub isotopologues: Vec<IsotopologueStats>,
    /// Mean total cluster intensity, labeled over unlabeled.
    pub total_intensity_ratio: f64,
    pub single_sample: bool,
    pub total_deviation: f64,
}

impl ClusterStatistics {
    /// Smallest p-value among isotopologues above M+0 whose enrichment
    /// ratio exceeds `min_ratio`; 1 when there are none.
    pub fn min_enriched_p_value(
        &self,
        min_ratio: f64,
    ) -> f64 {
        self.isotopologues
            .iter()
            .skip(1)
            .filter(|x| x.enrichment_ratio > min_ratio)
            .map(|x| x.p_value)
            .fold(1., f64::min)
    }

    pub fn max_enrichment_ratio(&self) -> f64 {
        self.isotopologues
            .iter()
            .skip(1)
            .map(|x| x.enrichment_ratio)
            .fold(0., f64::max)
    }
}

/// Two-sided Welch t-test, p = 1 when it cannot be computed.
pub fn welch_t_test(
    a: &RollingSDCalculator<f64>,
    b: &RollingSDCalculator<f64>,
) -> f64 {
    if a.len() < 2 || b.len() < 2 {
        return 1.;
    }
    let n_a = a.len() as f64;
    let n_b = b.len() as f64;
    let se_a = a.get_variance_bessel() / n_a;
    let se_b = b.get_variance_bessel() / n_b;
    let se = se_a + se_b;
    let diff = a.get_mean() - b.get_mean();

    if se <= EPSILON * EPSILON {
        // No spread at all: either identical or perfectly separated.
        return if diff.abs() > EPSILON { 0. } else { 1. };
    }

    let t = diff / se.sqrt();
    let df = se * se / (se_a * se_a / (n_a - 1.) + se_b * se_b / (n_b - 1.));
    match StudentsT::new(0., 1., df) {
        Ok(dist) => {
            let p = 2. * dist.sf(t.abs());
            if p.is_finite() {
                p.clamp(0., 1.)
            } else {
                1.
            }
        },
        Err(_) => 1.,
    }
}

fn enrichment_ratio(
    labeled_mean: f64,
    unlabeled_mean: f64,
) -> f64 {
    if unlabeled_mean > EPSILON {
        (labeled_mean / unlabeled_mean).min(MAX_ENRICHMENT_RATIO)
    } else if labeled_mean > EPSILON {
        MAX_ENRICHMENT_RATIO
    } else {
        1.
    }
}

/// Relative intensities of one cluster in one sample set.
struct SampleIntensities {
    /// Per isotopologue, over every sample with signal.
    relative: Vec<RollingSDCalculator<f64>>,
    mean_total: f64,
    /// Samples whose total cluster intensity is above the noise level.
    num_above_noise: usize,
}

fn relative_intensities(
    rows: &[Option<&FeatureRow>],
    list: &FeatureList,
    config: &LabelingConfig,
) -> SampleIntensities {
    let mut relative = vec![RollingSDCalculator::<f64>::default(); rows.len()];
    let mut total_sum = 0.;
    let mut num_above_noise = 0;
    for file in 0..list.num_files() {
        let intensities: Vec<f64> = rows
            .iter()
            .map(|r| r.map_or(0., |r| r.intensity(file, config.intensity_measure)))
            .collect();
        let total: f64 = intensities.iter().sum();
        total_sum += total;
        if total > config.min_base_intensity {
            num_above_noise += 1;
        }
        if total <= 0. {
            continue;
        }
        for (calc, intensity) in relative.iter_mut().zip(intensities.iter()) {
            calc.add(intensity / total);
        }
    }
    let mean_total = if list.num_files() > 0 {
        total_sum / list.num_files() as f64
    } else {
        0.
    };
    SampleIntensities {
        relative,
        mean_total,
        num_above_noise,
    }
}

/// Relative-intensity statistics of a cluster in both sample sets.
///
/// Cluster rows come from the labeled list and are looked up in the
/// unlabeled list; rows without a match contribute zero intensity.
pub fn compute_statistics(
    candidates: &[IsotopeCandidate],
    unlabeled_index: &MzIndex,
    unlabeled: &FeatureList,
    labeled: &FeatureList,
    config: &LabelingConfig,
) -> Result<ClusterStatistics, Rejection> {
    let labeled_rows: Vec<Option<&FeatureRow>> = candidates
        .iter()
        .map(|c| Some(&labeled.rows()[c.row]))
        .collect();
    let unlabeled_rows: Vec<Option<&FeatureRow>> = labeled_rows
        .iter()
        .flatten()
        .map(|row| {
            unlabeled_index
                .find(row.average_mz(), row.average_rt(), config)
                .map(|i| &unlabeled.rows()[i])
        })
        .collect();

    if unlabeled_rows[0].is_none() {
        return Err(Rejection::MissingUnlabeledBase);
    }

    let unl_samples = relative_intensities(&unlabeled_rows, unlabeled, config);
    let lab_samples = relative_intensities(&labeled_rows, labeled, config);
    let (unl, lab) = (&unl_samples.relative, &lab_samples.relative);
    if unl[0].is_empty() || lab[0].is_empty() {
        return Err(Rejection::NoIntensity);
    }
    // At least half of the samples of each set need the cluster above noise
    if unl_samples.num_above_noise * 2 < unlabeled.num_files()
        || lab_samples.num_above_noise * 2 < labeled.num_files()
    {
        return Err(Rejection::InsufficientSignal);
    }

    let single_sample = config.single_sample_mode || unl[0].len() < 2 || lab[0].len() < 2;

    let mut total_deviation = 0.;
    let isotopologues: Vec<IsotopologueStats> = unl
        .iter()
        .zip(lab.iter())
        .map(|(u, l)| {
            total_deviation += (l.get_mean() - u.get_mean()).abs();
            IsotopologueStats {
                unlabeled_mean: u.get_mean(),
                unlabeled_sd: u.get_sd(),
                labeled_mean: l.get_mean(),
                labeled_sd: l.get_sd(),
                enrichment_ratio: enrichment_ratio(l.get_mean(), u.get_mean()),
                p_value: if single_sample { 1. } else { welch_t_test(l, u) },
            }
        })
        .collect();

    Ok(ClusterStatistics {
        isotopologues,
        total_intensity_ratio: enrichment_ratio(lab_samples.mean_total, unl_samples.mean_total),
        single_sample,
        total_deviation,
    })
}

/// Pattern and significance checks on computed statistics.
pub fn validate_statistics(
    candidates: &[IsotopeCandidate],
    stats: &ClusterStatistics,
    config: &LabelingConfig,
) -> Result<(), Rejection> {
    let iso = &stats.isotopologues;
    let max_rise = 1. + config.monotonicity_tolerance;

    for k in 1..iso.len() {
        if candidates[k].shift - candidates[k - 1].shift >= LARGE_SHIFT_STEP {
            continue;
        }
        if iso[k].unlabeled_mean > max_rise * iso[k - 1].unlabeled_mean {
            trace!(
                "Row {} M+{} rises in unlabeled samples ({:.3} > {:.3})",
                candidates[0].row_id,
                candidates[k].shift,
                iso[k].unlabeled_mean,
                iso[k - 1].unlabeled_mean
            );
            return Err(Rejection::NotMonotonic);
        }
    }

    let min_ratio = 1. + config.enrichment_tolerance;
    if iso[0].enrichment_ratio > min_ratio {
        return Err(Rejection::BaseEnriched);
    }
    if stats.max_enrichment_ratio() <= min_ratio {
        return Err(Rejection::NotEnriched);
    }

    let significant = if stats.single_sample {
        stats.total_deviation > SINGLE_SAMPLE_MIN_DEVIATION
    } else {
        stats.min_enriched_p_value(min_ratio) < config.p_value_cutoff
    };
    if !significant {
        return Err(Rejection::NotSignificant);
    }
    Ok(())
}
