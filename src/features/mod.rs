pub mod feature_list;
pub mod io;
pub mod result_table;

pub use feature_list::{
    Feature,
    FeatureList,
    FeatureRow,
    FileIndex,
    IntensityMeasure,
};
pub use result_table::ResultFeatureTable;
