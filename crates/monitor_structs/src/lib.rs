//! Common types for the model monitor workflow shared across crates.

mod dataset;
mod names;
mod reports;
mod resources;
mod status;

pub use dataset::*;
pub use names::*;
pub use reports::*;
pub use resources::*;
pub use status::*;
