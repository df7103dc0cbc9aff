use std::collections::BTreeMap;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use std::sync::Arc;

use indicatif::{
    ParallelProgressIterator,
    ProgressIterator,
};
use log::{
    error,
    info,
    warn,
};
use rayon::prelude::*;

use super::annotation;
use super::config::LabelingConfig;
use super::groups::IsotopeGroupResult;
use super::Rejection;
use crate::error::Result;
use crate::features::{
    FeatureList,
    ResultFeatureTable,
};
use crate::isotopes::IsotopeTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Waiting,
    Processing,
    Finished,
    Canceled,
    Error,
}

/// Processed / total cluster evaluations, readable from other threads.
#[derive(Debug, Default)]
pub struct TaskProgress {
    done: AtomicUsize,
    total: AtomicUsize,
}

impl TaskProgress {
    pub fn set_total(
        &self,
        total: usize,
    ) {
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.;
        }
        self.done.load(Ordering::Relaxed) as f64 / total as f64
    }
}

#[derive(Debug, Clone)]
pub struct LabelingOutput {
    pub status: TaskStatus,
    pub groups: Vec<IsotopeGroupResult>,
    /// Only present once the task finished.
    pub result_table: Option<ResultFeatureTable>,
    pub rejections: BTreeMap<Rejection, usize>,
}

impl LabelingOutput {
    fn canceled() -> Self {
        LabelingOutput {
            status: TaskStatus::Canceled,
            groups: Vec::new(),
            result_table: None,
            rejections: BTreeMap::new(),
        }
    }
}

/// Detection over one (unlabeled, labeled) pair of feature lists.
///
/// Runs sequentially; several tasks can run side by side since all state
/// is owned by the task.
pub struct LabelingTask {
    unlabeled: FeatureList,
    labeled: FeatureList,
    config: LabelingConfig,
    isotope_table: IsotopeTable,
    status: TaskStatus,
    cancel: Arc<AtomicBool>,
    progress: Arc<TaskProgress>,
}

impl LabelingTask {
    pub fn new(
        unlabeled: FeatureList,
        labeled: FeatureList,
        config: LabelingConfig,
        isotope_table: IsotopeTable,
    ) -> Self {
        LabelingTask {
            unlabeled,
            labeled,
            config,
            isotope_table,
            status: TaskStatus::Waiting,
            cancel: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(TaskProgress::default()),
        }
    }

    pub fn name(&self) -> String {
        format!("{} vs {}", self.labeled.name, self.unlabeled.name)
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Flag that stops the task at its next checkpoint when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn progress_handle(&self) -> Arc<TaskProgress> {
        Arc::clone(&self.progress)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn run(&mut self) -> Result<LabelingOutput> {
        self.status = TaskStatus::Processing;
        let out = self.run_inner();
        self.status = match &out {
            Ok(output) => output.status,
            Err(e) => {
                error!("Labeling task '{}' failed: {}", self.name(), e);
                TaskStatus::Error
            },
        };
        out
    }

    fn run_inner(&self) -> Result<LabelingOutput> {
        let cancel = Arc::clone(&self.cancel);
        let is_canceled = move || cancel.load(Ordering::Relaxed);

        let detected = super::detect_isotope_groups(
            &self.unlabeled,
            &self.labeled,
            &self.config,
            &self.isotope_table,
            &self.progress,
            &is_canceled,
        )?;
        let Some(outcome) = detected else {
            warn!("Labeling task '{}' canceled", self.name());
            return Ok(LabelingOutput::canceled());
        };

        // Built aside and only handed out once complete.
        let mut table = ResultFeatureTable::from_feature_list(
            format!("{} labeled", self.labeled.name),
            &self.labeled,
            self.config.intensity_measure,
        );
        let mut groups = outcome.groups;
        annotation::assign_cluster_ids(&mut groups);
        if is_canceled() {
            warn!("Labeling task '{}' canceled", self.name());
            return Ok(LabelingOutput::canceled());
        }
        let written = annotation::annotate_table(&groups, &mut table);
        info!(
            "Task '{}': {} clusters, {} annotated rows",
            self.name(),
            groups.len(),
            written
        );

        Ok(LabelingOutput {
            status: TaskStatus::Finished,
            groups,
            result_table: Some(table),
            rejections: outcome.rejections,
        })
    }
}

/// Runs independent tasks concurrently on the rayon pool.
pub fn run_batch(tasks: Vec<LabelingTask>) -> Vec<(String, Result<LabelingOutput>)> {
    let num_tasks = tasks.len() as u64;
    let run_one = |mut task: LabelingTask| {
        let out = task.run();
        (task.name(), out)
    };

    if cfg!(feature = "less_parallel") {
        warn!("Running in single-threaded mode");
        tasks.into_iter().progress_count(num_tasks).map(run_one).collect()
    } else {
        tasks
            .into_par_iter()
            .progress_count(num_tasks)
            .map(run_one)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_fraction() {
        let progress = TaskProgress::default();
        assert_eq!(progress.fraction(), 0.);
        progress.set_total(4);
        progress.increment();
        progress.increment();
        assert!((progress.fraction() - 0.5).abs() < 1e-12);
    }
}
