use thiserror::Error;

pub type Result<T> = std::result::Result<T, EksError>;

/// Fatal failures while setting up cluster access.
///
/// Any of these aborts the operation before a pod is touched.
#[derive(Error, Debug)]
pub enum EksError {
    #[error("Failed to describe the EKS cluster: {0}")]
    ClusterLookup(String),

    #[error("Failed to derive cluster credentials: {0}")]
    CredentialDerivation(String),

    #[error("Invalid client configuration: {0}")]
    Configuration(String),
}

impl EksError {
    pub fn kind(&self) -> &'static str {
        match self {
            EksError::ClusterLookup(_) => "ClusterLookupError",
            EksError::CredentialDerivation(_) => "CredentialDerivationError",
            EksError::Configuration(_) => "ConfigurationError",
        }
    }
}

impl From<kube::Error> for EksError {
    fn from(err: kube::Error) -> Self {
        EksError::Configuration(err.to_string())
    }
}

impl From<kube::config::KubeconfigError> for EksError {
    fn from(err: kube::config::KubeconfigError) -> Self {
        EksError::Configuration(err.to_string())
    }
}
