pub mod elements;
pub mod tracer;

pub use elements::{
    IsotopeRecord,
    IsotopeTable,
};
pub use tracer::Tracer;
