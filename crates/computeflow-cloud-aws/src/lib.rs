//! AWS EC2 implementation of [`computeflow_cloud::ComputeApi`]
//!
//! Credentials and region come from the standard AWS configuration chain
//! (environment, shared config files, instance metadata).

pub mod error;
mod convert;
pub mod provider;

pub use error::{AwsError, Result};
pub use provider::Ec2ComputeApi;
