//! Pod operations against the cluster API

use crate::{install_crypto_provider, ClientConfig, EksError, Result, TrustMaterial};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams};
use kube::{Api, Client, ResourceExt};
use recycler_core::{PodApiError, PodClient};
use std::sync::Arc;
use tracing::debug;

/// PodClient backed by a kube `Client`
pub struct KubePodClient {
    client: Client,
    // Keeps the CA file alive for as long as requests may be in flight
    _trust: Arc<TrustMaterial>,
}

impl KubePodClient {
    pub fn new(client: Client, trust: Arc<TrustMaterial>) -> Self {
        Self {
            client,
            _trust: trust,
        }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl PodClient for KubePodClient {
    async fn delete_pod(&self, namespace: &str, name: &str) -> std::result::Result<(), PodApiError> {
        debug!("Deleting pod {}/{}", namespace, name);
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(map_api_error)
    }

    async fn list_pods(&self, namespace: &str) -> std::result::Result<Vec<String>, PodApiError> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default())
            .await
            .map_err(map_api_error)?;
        Ok(pods.items.iter().map(|pod| pod.name_any()).collect())
    }
}

fn map_api_error(err: kube::Error) -> PodApiError {
    match err {
        kube::Error::Api(response) if response.code == 404 => PodApiError::NotFound,
        other => PodApiError::Api(other.to_string()),
    }
}

/// Turns an operation's client configuration into a pod client
#[async_trait]
pub trait PodClientConnector: Send + Sync {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn PodClient>>;
}

/// Connector producing `KubePodClient`s
#[derive(Clone, Debug, Default)]
pub struct KubeConnector;

#[async_trait]
impl PodClientConnector for KubeConnector {
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn PodClient>> {
        install_crypto_provider();
        let client = Client::try_from(config.kube_config().clone()).map_err(|e| {
            EksError::Configuration(format!("Failed to create Kubernetes client: {}", e))
        })?;
        Ok(Arc::new(KubePodClient::new(client, config.trust())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("pods \"web-1\" {}", reason),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_404_maps_to_not_found() {
        assert_eq!(map_api_error(api_error(404, "NotFound")), PodApiError::NotFound);
    }

    #[test]
    fn test_other_errors_keep_detail() {
        assert_matches!(
            map_api_error(api_error(403, "Forbidden")),
            PodApiError::Api(detail) if detail.contains("Forbidden")
        );
        assert_matches!(
            map_api_error(api_error(409, "Conflict")),
            PodApiError::Api(_)
        );
    }
}
