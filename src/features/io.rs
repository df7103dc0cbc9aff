use std::collections::BTreeMap;
use std::path::Path;

use log::info;
use serde::{
    Deserialize,
    Serialize,
};

use super::feature_list::{
    Feature,
    FeatureList,
    FeatureRow,
    FileIndex,
};
use crate::error::{
    LabelingError,
    Result,
};

/// One line of a long-format feature table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub row_id: u32,
    pub file: String,
    pub mz: f64,
    pub rt: f32,
    pub height: f64,
    #[serde(default)]
    pub area: Option<f64>,
}

/// Builds a feature list from long-format records.
///
/// Raw files are numbered in order of first appearance, rows are sorted by id.
pub fn feature_list_from_records(
    name: &str,
    records: impl IntoIterator<Item = FeatureRecord>,
) -> Result<FeatureList> {
    let mut files: Vec<String> = Vec::new();
    let mut rows: BTreeMap<u32, BTreeMap<FileIndex, Feature>> = BTreeMap::new();

    for rec in records {
        let file_idx = match files.iter().position(|f| *f == rec.file) {
            Some(i) => i,
            None => {
                files.push(rec.file.clone());
                files.len() - 1
            },
        };
        let is_valid = |x: f64| x.is_finite() && x >= 0.;
        if !(is_valid(rec.mz) && rec.mz > 0.)
            || !is_valid(rec.rt as f64)
            || !is_valid(rec.height)
            || !rec.area.map_or(true, is_valid)
        {
            return Err(LabelingError::InvalidFeatureTable(format!(
                "row {} in file '{}' has m/z {}, rt {}, height {} and area {:?}",
                rec.row_id, rec.file, rec.mz, rec.rt, rec.height, rec.area
            )));
        }
        let feature = Feature {
            mz: rec.mz,
            rt: rec.rt,
            height: rec.height,
            area: rec.area.unwrap_or(rec.height),
        };
        let row = rows.entry(rec.row_id).or_default();
        if row.insert(file_idx, feature).is_some() {
            return Err(LabelingError::InvalidFeatureTable(format!(
                "row {} appears twice for file '{}'",
                rec.row_id, rec.file
            )));
        }
    }

    let rows = rows
        .into_iter()
        .map(|(id, features)| FeatureRow::new(id, features))
        .collect();
    FeatureList::new(name, files, rows)
}

pub fn read_feature_csv(path: impl AsRef<Path>) -> Result<FeatureList> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path)?;
    let records = rdr
        .deserialize::<FeatureRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let name = path
        .file_stem()
        .map(|x| x.to_string_lossy().to_string())
        .unwrap_or_else(|| "features".into());

    let list = feature_list_from_records(&name, records)?;
    info!(
        "Read {} rows over {} files from {:?}",
        list.rows().len(),
        list.num_files(),
        path
    );
    Ok(list)
}
