//! # AWS Collaborators
//!
//! Thin wrappers over the AWS SDK clients the jobs depend on: the
//! parameter store for endpoints and credentials, and the object store
//! for context overlays and file metadata.

pub mod s3;
pub mod ssm;

pub use s3::{ObjectStore, S3Location};
pub use ssm::ParameterStore;

use aws_config::meta::region::RegionProviderChain;
use aws_config::{BehaviorVersion, Region, SdkConfig};

/// Load shared AWS configuration, honoring an explicit region override
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let region_provider = RegionProviderChain::first_try(region.map(|r| Region::new(r.to_string())))
        .or_default_provider()
        .or_else("us-east-1");

    aws_config::defaults(BehaviorVersion::latest())
        .region(region_provider)
        .load()
        .await
}
