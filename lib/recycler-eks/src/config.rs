//! Operation-scoped Kubernetes client configuration

use crate::{ClusterDescriptor, Credential, EksError, Result, TrustMaterial};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Config;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default timeout for Kubernetes API requests
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

const CONTEXT_NAME: &str = "pod-recycler";
const USER_NAME: &str = "pod-recycler";

/// Transport tuning for the client built from a `ClientConfig`
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub read_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_API_TIMEOUT,
        }
    }
}

/// Client configuration owned by exactly one operation.
///
/// Holds one cluster descriptor, one credential and the CA file handle. The
/// handle is shared with every client built from this configuration, so the
/// file outlives all in-flight calls.
pub struct ClientConfig {
    descriptor: ClusterDescriptor,
    credential: Credential,
    kube_config: Config,
    trust: Arc<TrustMaterial>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("cluster", &self.descriptor.identifier)
            .field("cluster_url", &self.kube_config.cluster_url)
            .field("credential", &self.credential)
            .field("trust", &self.trust.path())
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    /// Combine endpoint, CA material and bearer token
    pub async fn build(
        descriptor: ClusterDescriptor,
        credential: Credential,
        options: &ClientOptions,
    ) -> Result<Self> {
        let endpoint = normalize_endpoint(&descriptor.api_endpoint)?;
        let trust = Arc::new(TrustMaterial::from_cluster_ca(&descriptor.ca_certificate)?);

        let kubeconfig = transient_kubeconfig(
            &descriptor.identifier,
            &endpoint,
            trust.path(),
            credential.bearer_token(),
        )?;
        let mut kube_config = Config::from_custom_kubeconfig(
            kubeconfig,
            &KubeConfigOptions {
                context: Some(CONTEXT_NAME.to_string()),
                ..Default::default()
            },
        )
        .await?;
        kube_config.read_timeout = Some(options.read_timeout);

        debug!(
            cluster = %descriptor.identifier,
            endpoint = %endpoint,
            ca_certificates = trust.certificate_count(),
            "Built client configuration"
        );
        Ok(Self {
            descriptor,
            credential,
            kube_config,
            trust,
        })
    }

    pub fn descriptor(&self) -> &ClusterDescriptor {
        &self.descriptor
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn kube_config(&self) -> &Config {
        &self.kube_config
    }

    /// Shared handle on the CA file
    pub fn trust(&self) -> Arc<TrustMaterial> {
        self.trust.clone()
    }
}

/// Accept `https://host[:port]` or a bare host; reject any other scheme
pub fn normalize_endpoint(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EksError::Configuration("cluster endpoint is empty".to_string()));
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    let url = Url::parse(&candidate).map_err(|e| {
        EksError::Configuration(format!("Invalid cluster endpoint '{}': {}", raw, e))
    })?;

    if url.scheme() != "https" {
        return Err(EksError::Configuration(format!(
            "Cluster endpoint '{}' is not an https URL",
            raw
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(EksError::Configuration(format!(
            "Cluster endpoint '{}' has no host",
            raw
        )));
    }
    Ok(url)
}

fn transient_kubeconfig(
    cluster: &str,
    endpoint: &Url,
    ca_path: &Path,
    token: &str,
) -> Result<Kubeconfig> {
    let ca_path = ca_path.to_str().ok_or_else(|| {
        EksError::Configuration("CA file path is not valid UTF-8".to_string())
    })?;

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": cluster,
            "cluster": {
                "server": endpoint.as_str(),
                "certificate-authority": ca_path,
            }
        }],
        "users": [{
            "name": USER_NAME,
            "user": { "token": token }
        }],
        "contexts": [{
            "name": CONTEXT_NAME,
            "context": { "cluster": cluster, "user": USER_NAME }
        }],
        "current-context": CONTEXT_NAME,
    });

    serde_json::from_value(document)
        .map_err(|e| EksError::Configuration(format!("Failed to assemble kubeconfig: {}", e)))
}
