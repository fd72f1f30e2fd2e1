//! EC2 provider error types

use computeflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("EC2 {operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },

    #[error("EC2 resource not found: {0}")]
    NotFound(String),

    #[error("EC2 response is missing {0}")]
    MissingField(&'static str),
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::NotFound(id) => CloudError::ResourceNotFound(id),
            other => CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
