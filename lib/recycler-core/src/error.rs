use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Request-level failures raised before any pod is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Namespace '{namespace}' is not allowed. Allowed namespaces: {allowed}")]
    AuthorizationDenied { namespace: String, allowed: String },

    #[error("Kubernetes API error: {0}")]
    Api(String),
}

/// Failure reported by a pod client for a single call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PodApiError {
    #[error("pod not found")]
    NotFound,

    #[error("{0}")]
    Api(String),
}
