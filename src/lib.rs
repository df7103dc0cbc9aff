pub mod config;
pub mod error;
pub mod features;
pub mod isotopes;
pub mod labeling;
pub mod utils;

pub use error::{
    LabelingError,
    Result,
};
