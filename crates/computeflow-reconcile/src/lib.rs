//! Diff-and-update engine for a single compute instance
//!
//! ```text
//! current Instance ──┐
//!                    ├─▶ Differ (comparators + volume analyzer) ─▶ UpdatePlan
//! DesiredConfig ─────┘                                               │
//!                                                                    ▼
//!                         UpdateOrchestrator (Name → Tags → SecurityGroups
//!                                             → InstanceType → Volumes)
//!                                    │ refresh after each operation
//!                                    ▼
//!                         PowerCycle (stop → wait stopped → mutate → start)
//! ```

pub mod attribute;
pub mod comparator;
pub mod error;
pub mod power;
pub mod reconciler;
pub mod settings;
pub mod update;
pub mod volume;
pub mod waiter;

#[cfg(test)]
mod fake;

pub use attribute::{Attribute, UpdatePlan};
pub use comparator::{AttributeComparator, DiffContext, Differ};
pub use error::{ReconcileError, Result};
pub use power::PowerCycle;
pub use reconciler::{Observation, ReconcileOutcome, Reconciler};
pub use settings::{ReconcileSettings, VolumeProbeFailure, WaitConfig};
pub use update::{
    EXECUTION_ORDER, UpdateContext, UpdateOperation, UpdateOrchestrator, UpdateRegistry,
    UpdateReport,
};
pub use volume::{VolumeCommand, VolumeInformation, VolumeSnapshot};
