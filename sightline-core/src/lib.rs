pub mod metrics;
pub mod model;

pub use model::*;
