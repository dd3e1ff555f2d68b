//! Cluster descriptor resolution through the EKS control plane

use crate::{EksError, Result};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_eks::config::Region;
use aws_sdk_eks::error::DisplayErrorContext;
use aws_sdk_eks::types::Cluster;
use tracing::{debug, info};

/// Endpoint and trust material of one cluster, resolved once per operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterDescriptor {
    pub identifier: String,
    pub region: String,
    /// API server URL as reported by the control plane
    pub api_endpoint: String,
    /// PEM, or base64-encoded PEM as EKS returns it
    pub ca_certificate: Vec<u8>,
}

/// Looks up a cluster's endpoint and CA material
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    async fn resolve(&self, cluster_id: &str, region: &str) -> Result<ClusterDescriptor>;
}

/// ClusterResolver backed by EKS `DescribeCluster`
pub struct EksClusterResolver {
    sdk: SdkConfig,
}

impl EksClusterResolver {
    /// Create a resolver from the ambient AWS configuration
    pub fn new(sdk: SdkConfig) -> Self {
        Self { sdk }
    }

    fn client(&self, region: &str) -> aws_sdk_eks::Client {
        let config = aws_sdk_eks::config::Builder::from(&self.sdk)
            .region(Region::new(region.to_string()))
            .build();
        aws_sdk_eks::Client::from_conf(config)
    }
}

#[async_trait]
impl ClusterResolver for EksClusterResolver {
    async fn resolve(&self, cluster_id: &str, region: &str) -> Result<ClusterDescriptor> {
        check_lookup_input(cluster_id, region)?;
        debug!("Describing EKS cluster {} in {}", cluster_id, region);

        let output = self
            .client(region)
            .describe_cluster()
            .name(cluster_id)
            .send()
            .await
            .map_err(|e| {
                EksError::ClusterLookup(format!("{}: {}", cluster_id, DisplayErrorContext(&e)))
            })?;

        let cluster = output.cluster().ok_or_else(|| {
            EksError::ClusterLookup(format!(
                "{}: no cluster details returned. Verify the cluster name and region.",
                cluster_id
            ))
        })?;

        let descriptor = descriptor_from_cluster(cluster_id, region, cluster)?;
        info!(
            cluster = %descriptor.identifier,
            endpoint = %descriptor.api_endpoint,
            "Resolved EKS cluster"
        );
        Ok(descriptor)
    }
}

fn check_lookup_input(cluster_id: &str, region: &str) -> Result<()> {
    if cluster_id.trim().is_empty() {
        return Err(EksError::ClusterLookup(
            "cluster identifier must not be empty".to_string(),
        ));
    }
    if region.trim().is_empty() {
        return Err(EksError::ClusterLookup("region must not be empty".to_string()));
    }
    Ok(())
}

fn descriptor_from_cluster(
    cluster_id: &str,
    region: &str,
    cluster: &Cluster,
) -> Result<ClusterDescriptor> {
    let endpoint = cluster
        .endpoint()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| EksError::ClusterLookup(format!("{}: cluster has no endpoint", cluster_id)))?;

    let ca_data = cluster
        .certificate_authority()
        .and_then(|ca| ca.data())
        .filter(|data| !data.is_empty())
        .ok_or_else(|| {
            EksError::ClusterLookup(format!(
                "{}: cluster has no certificate authority data",
                cluster_id
            ))
        })?;

    Ok(ClusterDescriptor {
        identifier: cluster_id.to_string(),
        region: region.to_string(),
        api_endpoint: endpoint.to_string(),
        ca_certificate: ca_data.as_bytes().to_vec(),
    })
}
