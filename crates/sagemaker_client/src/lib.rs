//! Clients for the SageMaker control plane and runtime.
//!
//! The workflow only depends on the [`ControlPlane`] and [`InferenceRuntime`]
//! traits; the SageMaker-backed implementations share one SDK configuration.

pub mod api;
mod control_plane;

use aws_config::{BehaviorVersion, Region, SdkConfig};

pub use api::client::SageMakerClient;
pub use api::images::analyzer_image_uri;
pub use api::runtime::SageMakerRuntimeClient;
pub use control_plane::{ControlPlane, InferenceRuntime};

/// Loads the shared SDK configuration for `region`.
///
/// Credentials come from the default provider chain.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_owned()))
        .load()
        .await
}
