use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::{
    LabelingError,
    Result,
};

/// Index of a raw file within its feature list.
pub type FileIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityMeasure {
    #[default]
    Height,
    Area,
}

/// A chromatographic peak detected in a single raw file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub mz: f64,
    pub rt: f32,
    pub height: f64,
    pub area: f64,
}

impl Feature {
    pub fn intensity(
        &self,
        measure: IntensityMeasure,
    ) -> f64 {
        match measure {
            IntensityMeasure::Height => self.height,
            IntensityMeasure::Area => self.area,
        }
    }
}

/// The same compound detected across the files of a list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: u32,
    features: BTreeMap<FileIndex, Feature>,
    mz: f64,
    rt: f32,
}

impl FeatureRow {
    pub fn new(
        id: u32,
        features: BTreeMap<FileIndex, Feature>,
    ) -> Self {
        let n = features.len().max(1) as f64;
        let mz = features.values().map(|x| x.mz).sum::<f64>() / n;
        let rt = (features.values().map(|x| x.rt as f64).sum::<f64>() / n) as f32;
        FeatureRow {
            id,
            features,
            mz,
            rt,
        }
    }

    pub fn average_mz(&self) -> f64 {
        self.mz
    }

    pub fn average_rt(&self) -> f32 {
        self.rt
    }

    pub fn feature(
        &self,
        file: FileIndex,
    ) -> Option<&Feature> {
        self.features.get(&file)
    }

    pub fn features(&self) -> impl Iterator<Item = (FileIndex, &Feature)> {
        self.features.iter().map(|(k, v)| (*k, v))
    }

    /// Intensity in a file, zero when the row was not detected there.
    pub fn intensity(
        &self,
        file: FileIndex,
        measure: IntensityMeasure,
    ) -> f64 {
        self.features
            .get(&file)
            .map(|x| x.intensity(measure))
            .unwrap_or(0.)
    }
}

/// Aligned feature table over a set of raw files.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureList {
    pub name: String,
    raw_files: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureList {
    pub fn new(
        name: impl Into<String>,
        raw_files: Vec<String>,
        rows: Vec<FeatureRow>,
    ) -> Result<Self> {
        let name = name.into();
        for row in rows.iter() {
            if let Some((file, _)) = row.features().find(|(f, _)| *f >= raw_files.len()) {
                return Err(LabelingError::InvalidFeatureTable(format!(
                    "row {} of '{}' references file #{} but only {} files exist",
                    row.id,
                    name,
                    file,
                    raw_files.len()
                )));
            }
        }
        Ok(FeatureList {
            name,
            raw_files,
            rows,
        })
    }

    pub fn raw_files(&self) -> &[String] {
        &self.raw_files
    }

    pub fn num_files(&self) -> usize {
        self.raw_files.len()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.raw_files.is_empty()
    }

    /// Mean intensity of a row over all files of the list, missing
    /// detections count as zero.
    pub fn mean_intensity(
        &self,
        row: &FeatureRow,
        measure: IntensityMeasure,
    ) -> f64 {
        if self.raw_files.is_empty() {
            return 0.;
        }
        let total: f64 = (0..self.raw_files.len())
            .map(|f| row.intensity(f, measure))
            .sum();
        total / self.raw_files.len() as f64
    }

    /// Indices of the rows, sorted by average retention time.
    pub fn rt_sorted_indices(&self) -> Vec<usize> {
        let mut out: Vec<usize> = (0..self.rows.len()).collect();
        out.sort_by(|a, b| {
            self.rows[*a]
                .average_rt()
                .total_cmp(&self.rows[*b].average_rt())
                .then(self.rows[*a].id.cmp(&self.rows[*b].id))
        });
        out
    }
}
