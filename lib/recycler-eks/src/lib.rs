//! EKS cluster access for the pod recycler
//!
//! Resolves the cluster, mints an IAM bearer token and builds an
//! operation-scoped Kubernetes client around them.
pub mod cluster;
pub mod config;
pub mod error;
pub mod pods;
pub mod token;
pub mod trust;

pub use cluster::{ClusterDescriptor, ClusterResolver, EksClusterResolver};
pub use config::{ClientConfig, ClientOptions};
pub use error::{EksError, Result};
pub use pods::{KubeConnector, KubePodClient, PodClientConnector};
pub use token::{Credential, CredentialMinter, IamTokenMinter};
pub use trust::{install_crypto_provider, TrustMaterial};
