//! computeflow Cloud Abstraction
//!
//! This crate defines the contract between the reconciliation core and a
//! compute provider: the observed-state model reported by the provider, the
//! desired-state model supplied by the user, and the [`ComputeApi`] trait that
//! performs instance and volume CRUD.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 computeflow CLI                  │
//! │              (diff / apply / destroy)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │             computeflow-reconcile                │
//! │   comparators · volume analyzer · orchestrator   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │              computeflow-cloud                   │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │        trait ComputeApi { ... }          │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ DesiredConfig│  │   Instance   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//!           ┌───────▼───────┐
//!           │  aws (ec2)    │
//!           │   provider    │
//!           └───────────────┘
//! ```

pub mod desired;
pub mod error;
pub mod model;
pub mod provider;

// Re-exports
pub use desired::{DesiredConfig, NetworkingSpec, StorageSpec};
pub use error::{CloudError, Result};
pub use model::{
    Instance, InstanceState, NAME_TAG_KEY, SecurityGroup, Subnet, Volume, VolumeAttachment,
    VolumeStatus,
};
pub use provider::ComputeApi;
