use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::error::Result;
use crate::isotopes::IsotopeTable;
use crate::labeling::LabelingConfig;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub groups_json: Option<String>,
    pub groups_csv: Option<String>,
    pub annotated_features_csv: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            groups_json: Some("isotope_groups.json".into()),
            groups_csv: Some("isotope_groups.csv".into()),
            annotated_features_csv: Some("annotated_features.csv".into()),
        }
    }
}

impl OutputConfig {
    /// Output paths inside `dir`, prefixed so several runs can share it.
    pub fn resolve(
        &self,
        dir: &Path,
        prefix: &str,
    ) -> (Option<PathBuf>, Option<PathBuf>, Option<PathBuf>) {
        let join = |name: &Option<String>| {
            name.as_ref()
                .map(|n| dir.join(format!("{}_{}", prefix, n)))
        };
        (
            join(&self.groups_json),
            join(&self.groups_csv),
            join(&self.annotated_features_csv),
        )
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// CSV with `element,mass_number,exact_mass,abundance`; elements not
    /// listed use the built-in values.
    pub isotope_table_csv: Option<String>,
    pub labeling_config: LabelingConfig,
    pub output_config: OutputConfig,
}

impl Config {
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        config.labeling_config.validate()?;
        Ok(config)
    }

    pub fn isotope_table(&self) -> Result<IsotopeTable> {
        match &self.isotope_table_csv {
            Some(path) => IsotopeTable::from_csv(path),
            None => Ok(IsotopeTable::default()),
        }
    }
}
