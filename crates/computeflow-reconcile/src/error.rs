//! Reconciliation error types

use crate::attribute::Attribute;
use computeflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// Any failure reported by the compute provider
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("Subnet not found: {0}")]
    SubnetNotFound(String),

    #[error("Security groups not found: {}", .0.join(", "))]
    SecurityGroupNotFound(Vec<String>),

    #[error("Invalid volume command: {0}")]
    InvalidCommand(String),

    #[error("Timed out after {elapsed_ms}ms waiting for {resource} to become {target}")]
    WaitTimeout {
        resource: String,
        target: String,
        elapsed_ms: u64,
    },

    #[error("Reconciliation cancelled")]
    Cancelled,

    /// An update plan aborted mid-sequence. Attributes in `applied` stay
    /// applied; nothing is rolled back.
    #[error(
        "Update of {attribute} failed after applying [{}]: {source}",
        .applied.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ")
    )]
    UpdateFailed {
        attribute: Attribute,
        applied: Vec<Attribute>,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    /// The innermost error, unwrapping `UpdateFailed`
    pub fn root_cause(&self) -> &ReconcileError {
        match self {
            ReconcileError::UpdateFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self.root_cause() {
            ReconcileError::InstanceNotFound(_) => true,
            ReconcileError::Cloud(err) => err.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_failed_message_lists_applied() {
        let err = ReconcileError::UpdateFailed {
            attribute: Attribute::SecurityGroups,
            applied: vec![Attribute::Name, Attribute::Tags],
            source: Box::new(ReconcileError::Cloud(CloudError::ApiError(
                "UnauthorizedOperation".to_string(),
            ))),
        };
        let message = err.to_string();
        assert!(message.contains("SecurityGroups"));
        assert!(message.contains("Name, Tags"));
        assert!(message.contains("UnauthorizedOperation"));
    }

    #[test]
    fn test_root_cause_and_not_found() {
        let err = ReconcileError::UpdateFailed {
            attribute: Attribute::Volumes,
            applied: Vec::new(),
            source: Box::new(ReconcileError::InstanceNotFound("i-1".to_string())),
        };
        assert!(matches!(
            err.root_cause(),
            ReconcileError::InstanceNotFound(_)
        ));
        assert!(err.is_not_found());
        assert!(!ReconcileError::Cancelled.is_not_found());
    }
}
