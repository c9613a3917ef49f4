//! SageMaker implementations of the service traits.

pub mod client;
pub mod images;
pub mod runtime;
