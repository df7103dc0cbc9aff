//! Untargeted isotope-labeling detection.
//!
//! The pipeline runs in this order:
//!
//! 1. [`candidates::find_isotope_pairs`] finds co-eluting rows of the
//!    labeled list that are a whole number of tracer units apart.
//! 2. [`clusters::seed_clusters`] groups the pairs per base row and chains
//!    them into isotopologue series.
//! 3. [`clusters::filter_cluster`] drops small, gappy and noisy series.
//! 4. [`statistics`] compares relative isotopologue intensities between
//!    the unlabeled and labeled samples.
//! 5. [`consolidation::consolidate`] merges series that describe the
//!    same compound.
//! 6. [`annotation`] numbers the clusters and writes them to the result table.

pub mod annotation;
pub mod candidates;
pub mod clusters;
pub mod config;
pub mod consolidation;
pub mod groups;
pub mod statistics;
pub mod task;

use std::collections::BTreeMap;
use std::fmt;

use log::{
    debug,
    info,
};

use crate::error::{
    LabelingError,
    Result,
};
use crate::features::FeatureList;
use crate::isotopes::IsotopeTable;
use crate::utils;
use candidates::{
    IsotopeCandidate,
    MzIndex,
};
use clusters::IsotopeCluster;
pub use config::{
    LabelingConfig,
    MzTolerance,
};
pub use groups::IsotopeGroupResult;
use statistics::ClusterStatistics;
pub use task::{
    LabelingOutput,
    LabelingTask,
    TaskProgress,
    TaskStatus,
};

/// Why a candidate cluster was not reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rejection {
    TooSmall,
    Incomplete,
    LowIntensity,
    MissingUnlabeledBase,
    NoIntensity,
    InsufficientSignal,
    NotMonotonic,
    BaseEnriched,
    NotEnriched,
    NotSignificant,
}

impl fmt::Display for Rejection {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let msg = match self {
            Rejection::TooSmall => "below minimum pattern size",
            Rejection::Incomplete => "incomplete pattern",
            Rejection::LowIntensity => "isotopologues below noise",
            Rejection::MissingUnlabeledBase => "base peak missing in unlabeled samples",
            Rejection::NoIntensity => "no intensity in one sample set",
            Rejection::InsufficientSignal => "cluster below noise in most samples",
            Rejection::NotMonotonic => "unlabeled pattern not decreasing",
            Rejection::BaseEnriched => "base peak enriched in labeled samples",
            Rejection::NotEnriched => "no isotopologue enriched in labeled samples",
            Rejection::NotSignificant => "enrichment not significant",
        };
        f.write_str(msg)
    }
}

/// Everything the per-cluster steps need, built once per run.
pub struct LabelingContext<'a> {
    pub unlabeled: &'a FeatureList,
    pub labeled: &'a FeatureList,
    pub config: &'a LabelingConfig,
    /// Mass of one tracer unit (e.g. 13C - 12C)
    pub unit: f64,
    unlabeled_index: MzIndex<'a>,
}

impl<'a> LabelingContext<'a> {
    pub fn new(
        unlabeled: &'a FeatureList,
        labeled: &'a FeatureList,
        config: &'a LabelingConfig,
        unit: f64,
    ) -> Self {
        LabelingContext {
            unlabeled,
            labeled,
            config,
            unit,
            unlabeled_index: MzIndex::new(unlabeled),
        }
    }

    pub fn labeled_intensity(
        &self,
        row: usize,
    ) -> f64 {
        self.labeled
            .mean_intensity(&self.labeled.rows()[row], self.config.intensity_measure)
    }

    pub fn compute_statistics(
        &self,
        candidates: &[IsotopeCandidate],
    ) -> std::result::Result<ClusterStatistics, Rejection> {
        statistics::compute_statistics(
            candidates,
            &self.unlabeled_index,
            self.unlabeled,
            self.labeled,
            self.config,
        )
    }

    /// Filters, scores and validates one seeded cluster.
    pub fn evaluate(
        &self,
        cluster: IsotopeCluster,
    ) -> std::result::Result<IsotopeGroupResult, Rejection> {
        clusters::filter_cluster(&cluster, self.labeled, self.config)?;
        let stats = self.compute_statistics(&cluster.candidates)?;
        statistics::validate_statistics(&cluster.candidates, &stats, self.config)?;

        let base = &self.labeled.rows()[cluster.base().row];
        Ok(IsotopeGroupResult {
            cluster_id: 0,
            base_row_id: base.id,
            base_mz: base.average_mz(),
            base_rt: base.average_rt(),
            candidates: cluster.candidates,
            statistics: stats,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionOutcome {
    pub groups: Vec<IsotopeGroupResult>,
    pub num_pairs: usize,
    pub num_seeds: usize,
    pub num_accepted: usize,
    pub rejections: BTreeMap<Rejection, usize>,
}

pub fn check_inputs(
    unlabeled: &FeatureList,
    labeled: &FeatureList,
) -> Result<()> {
    for list in [unlabeled, labeled] {
        if list.is_empty() {
            return Err(LabelingError::EmptyFeatureList(list.name.clone()));
        }
    }
    Ok(())
}

/// Runs pair discovery, expansion, validation and consolidation.
///
/// `is_canceled` is polled between cluster evaluations and consolidation
/// passes; `Ok(None)` means the run stopped early.
pub fn detect_isotope_groups(
    unlabeled: &FeatureList,
    labeled: &FeatureList,
    config: &LabelingConfig,
    isotope_table: &IsotopeTable,
    progress: &TaskProgress,
    is_canceled: &dyn Fn() -> bool,
) -> Result<Option<DetectionOutcome>> {
    config.validate()?;
    let unit = isotope_table.mass_shift_unit(&config.tracer)?;
    check_inputs(unlabeled, labeled)?;
    info!(
        "Tracer {} ({:.6} Da per unit), {} unlabeled and {} labeled rows",
        config.tracer,
        unit,
        unlabeled.rows().len(),
        labeled.rows().len()
    );

    let mut timer = utils::ContextTimer::new("labeling", true, log::Level::Info);
    let ctx = LabelingContext::new(unlabeled, labeled, config, unit);

    let pairs = candidates::find_isotope_pairs(labeled, config, unit);
    if is_canceled() {
        return Ok(None);
    }

    let seeds = clusters::seed_clusters(&pairs, labeled, config);
    let mut outcome = DetectionOutcome {
        num_pairs: pairs.len(),
        num_seeds: seeds.len(),
        ..Default::default()
    };
    progress.set_total(seeds.len());

    let mut eval_timer = timer.start_sub_timer("evaluation");
    for seed in seeds {
        if is_canceled() {
            return Ok(None);
        }
        match ctx.evaluate(seed) {
            Ok(group) => outcome.groups.push(group),
            Err(reason) => *outcome.rejections.entry(reason).or_default() += 1,
        }
        progress.increment();
    }
    eval_timer.stop(true);
    outcome.num_accepted = outcome.groups.len();

    for (reason, count) in outcome.rejections.iter() {
        debug!("Rejected {} clusters: {}", count, reason);
    }
    info!(
        "{} of {} seeded clusters passed validation",
        outcome.num_accepted, outcome.num_seeds
    );

    let mut merge_timer = timer.start_sub_timer("consolidation");
    let groups = std::mem::take(&mut outcome.groups);
    outcome.groups = match consolidation::consolidate(groups, &ctx, is_canceled) {
        Some(groups) => groups,
        None => return Ok(None),
    };
    merge_timer.stop(true);

    timer.stop(true);
    Ok(Some(outcome))
}
