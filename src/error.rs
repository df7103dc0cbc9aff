/// Errors that can stop a labeling run.
///
/// Anything raised here is fatal for the task it occurs in. Per-cluster
/// problems (e.g. a t-test without enough samples) never surface as errors,
/// they degrade to non-significant results instead.
#[derive(Debug, thiserror::Error)]
pub enum LabelingError {
    /// Tracer string that is not `<mass number><element>`
    #[error("Invalid tracer isotope '{0}', expected something like '13C'")]
    InvalidTracer(String),

    /// Element or isotope missing from both the loaded and built-in tables
    #[error("No isotope data for {0}")]
    UnknownElement(String),

    /// Parameter outside of its valid range
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Feature list without rows or raw files
    #[error("Feature list '{0}' is empty")]
    EmptyFeatureList(String),

    /// Malformed feature table content
    #[error("Invalid feature table: {0}")]
    InvalidFeatureTable(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config error
    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, LabelingError>;
