//! One recycle operation, from request to response

use crate::RecyclerSettings;
use aws_config::SdkConfig;
use recycler_api::{InvocationResponse, RecyclePlan, RecycleRequest};
use recycler_core::{
    ensure_targets, screen_namespace, screen_target, BatchRecycler, BatchResult, CoreError,
    NamespaceAllowList, PodTarget, RecycleOutcome,
};
use recycler_eks::{
    ClientConfig, ClientOptions, ClusterResolver, CredentialMinter, EksClusterResolver, EksError,
    IamTokenMinter, KubeConnector, PodClientConnector,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

/// Failure that ends an operation with a single top-level error
#[derive(Error, Debug)]
pub enum RecycleError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Eks(#[from] EksError),

    #[error("No cluster to operate on. Set EKS_CLUSTER_NAME or pass clusterId")]
    MissingCluster,
}

impl RecycleError {
    /// HTTP-equivalent status reported to the caller
    pub fn status_code(&self) -> u16 {
        match self {
            RecycleError::Core(CoreError::Validation(_))
            | RecycleError::Core(CoreError::AuthorizationDenied { .. }) => 400,
            _ => 500,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecycleError::Core(CoreError::Validation(_)) => "ValidationError",
            RecycleError::Core(CoreError::AuthorizationDenied { .. }) => "AuthorizationDenied",
            RecycleError::Core(CoreError::Api(_)) => "ApiError",
            RecycleError::Eks(err) => err.kind(),
            RecycleError::MissingCluster => "ConfigurationError",
        }
    }
}

/// Runs recycle operations against freshly resolved cluster access
pub struct RecycleService {
    settings: RecyclerSettings,
    resolver: Arc<dyn ClusterResolver>,
    minter: Arc<dyn CredentialMinter>,
    connector: Arc<dyn PodClientConnector>,
}

impl RecycleService {
    pub fn new(
        settings: RecyclerSettings,
        resolver: Arc<dyn ClusterResolver>,
        minter: Arc<dyn CredentialMinter>,
        connector: Arc<dyn PodClientConnector>,
    ) -> Self {
        Self {
            settings,
            resolver,
            minter,
            connector,
        }
    }

    /// Service wired to EKS, STS and the Kubernetes API
    pub fn for_eks(settings: RecyclerSettings, sdk: &SdkConfig) -> Self {
        Self::new(
            settings,
            Arc::new(EksClusterResolver::new(sdk.clone())),
            Arc::new(IamTokenMinter::new(sdk.clone())),
            Arc::new(KubeConnector),
        )
    }

    /// Handle one request; every failure is folded into the response
    pub async fn invoke(
        &self,
        request: RecycleRequest,
        deadline: Option<Instant>,
        invocation_id: &str,
    ) -> InvocationResponse {
        let span = info_span!("recycle", invocation_id = %invocation_id);
        let shape = request.shape();

        async move {
            match self.execute(&request, deadline).await {
                Ok(result) => {
                    let response = InvocationResponse::from_result(shape, &result);
                    info!(
                        status_code = response.status_code(),
                        aggregate = ?result.aggregate,
                        "Recycle operation finished"
                    );
                    response
                }
                Err(err) => {
                    error!(kind = err.kind(), "Recycle operation failed: {}", err);
                    InvocationResponse::failure(shape, err.status_code(), err.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &RecycleRequest,
        deadline: Option<Instant>,
    ) -> Result<BatchResult, RecycleError> {
        let plan = request.plan();
        let allow_list = &self.settings.allowed_namespaces;

        // Requests the gate rejects outright never contact AWS or the cluster
        match &plan {
            RecyclePlan::Targets(targets) => {
                ensure_targets(targets)?;
                if let Some(result) = screen_all(allow_list, targets) {
                    info!("No target passed validation and the allow-list");
                    return Ok(result);
                }
            }
            RecyclePlan::Namespace(namespace) => screen_namespace(allow_list, namespace)?,
        }

        let cluster_id = self
            .settings
            .cluster_for(request.cluster_id.as_deref())
            .ok_or(RecycleError::MissingCluster)?;
        let descriptor = self
            .resolver
            .resolve(&cluster_id, &self.settings.region)
            .await?;
        let credential = self.minter.mint(&descriptor).await?;
        let options = ClientOptions {
            read_timeout: self.settings.api_timeout,
        };
        let config = ClientConfig::build(descriptor, credential, &options).await?;
        debug!("Client configuration ready: {:?}", config);
        let client = self.connector.connect(&config).await?;

        let recycler = BatchRecycler::new(client, allow_list.clone())
            .with_concurrency(self.settings.concurrency)
            .with_deadline(deadline);
        let result = match plan {
            RecyclePlan::Targets(targets) => recycler.recycle(targets).await?,
            RecyclePlan::Namespace(namespace) => recycler.recycle_namespace(&namespace).await?,
        };
        Ok(result)
    }
}

/// Outcomes for a batch in which no target may reach the cluster
fn screen_all(allow_list: &NamespaceAllowList, targets: &[PodTarget]) -> Option<BatchResult> {
    let outcomes = targets
        .iter()
        .map(|target| {
            screen_target(allow_list, target)
                .map(|status| RecycleOutcome::new(target.clone(), status))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(BatchResult::from_outcomes(outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use recycler_api::{BatchResponse, LegacyResponse};
    use recycler_core::{PodApiError, PodClient};
    use recycler_eks::{ClusterDescriptor, Credential};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const CA_PEM: &[u8] = include_bytes!("../../recycler-eks/testdata/cluster-ca.pem");

    #[derive(Default)]
    struct FakeResolver {
        calls: AtomicUsize,
        resolved: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl ClusterResolver for FakeResolver {
        async fn resolve(
            &self,
            cluster_id: &str,
            region: &str,
        ) -> recycler_eks::Result<ClusterDescriptor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.resolved.lock().unwrap().push(cluster_id.to_string());
            if self.fail {
                return Err(EksError::ClusterLookup(format!("{}: not found", cluster_id)));
            }
            Ok(ClusterDescriptor {
                identifier: cluster_id.to_string(),
                region: region.to_string(),
                api_endpoint: "https://abc.gr7.us-east-1.eks.amazonaws.com".to_string(),
                ca_certificate: CA_PEM.to_vec(),
            })
        }
    }

    #[derive(Default)]
    struct FakeMinter {
        fail: bool,
    }

    #[async_trait]
    impl CredentialMinter for FakeMinter {
        async fn mint(&self, cluster: &ClusterDescriptor) -> recycler_eks::Result<Credential> {
            if self.fail {
                return Err(EksError::CredentialDerivation("no credentials".to_string()));
            }
            Ok(Credential::new(
                format!("k8s-aws-v1.{}", cluster.identifier),
                Utc::now(),
                "arn:aws:iam::123456789012:role/recycler",
            ))
        }
    }

    #[derive(Default)]
    struct FakePods {
        deleted: Mutex<Vec<String>>,
        missing: Vec<String>,
        listed: Vec<String>,
    }

    #[async_trait]
    impl PodClient for FakePods {
        async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), PodApiError> {
            if self.missing.iter().any(|m| m == name) {
                return Err(PodApiError::NotFound);
            }
            self.deleted
                .lock()
                .unwrap()
                .push(format!("{}/{}", namespace, name));
            Ok(())
        }

        async fn list_pods(&self, _namespace: &str) -> Result<Vec<String>, PodApiError> {
            Ok(self.listed.clone())
        }
    }

    struct FakeConnector {
        pods: Arc<FakePods>,
        trust_paths: Mutex<Vec<std::path::PathBuf>>,
    }

    #[async_trait]
    impl PodClientConnector for FakeConnector {
        async fn connect(&self, config: &ClientConfig) -> recycler_eks::Result<Arc<dyn PodClient>> {
            self.trust_paths
                .lock()
                .unwrap()
                .push(config.trust().path().to_path_buf());
            let client: Arc<dyn PodClient> = self.pods.clone();
            Ok(client)
        }
    }

    struct Harness {
        resolver: Arc<FakeResolver>,
        connector: Arc<FakeConnector>,
        service: RecycleService,
    }

    impl Harness {
        fn deleted(&self) -> Vec<String> {
            self.connector.pods.deleted.lock().unwrap().clone()
        }

        fn resolver_calls(&self) -> usize {
            self.resolver.calls.load(Ordering::SeqCst)
        }
    }

    fn settings(allowed: &[&str]) -> RecyclerSettings {
        RecyclerSettings {
            region: "us-east-1".to_string(),
            cluster_id: Some("gbs-dev-facets-eks-blue".to_string()),
            cluster_aliases: BTreeMap::from([(
                "green".to_string(),
                "sky-eks-dev-cluster-green".to_string(),
            )]),
            allowed_namespaces: NamespaceAllowList::new(allowed.iter().copied()),
            concurrency: 2,
            api_timeout: Duration::from_secs(5),
            debug: false,
        }
    }

    fn harness_with(
        settings: RecyclerSettings,
        resolver: FakeResolver,
        minter: FakeMinter,
        pods: FakePods,
    ) -> Harness {
        let resolver = Arc::new(resolver);
        let connector = Arc::new(FakeConnector {
            pods: Arc::new(pods),
            trust_paths: Mutex::new(Vec::new()),
        });
        let service = RecycleService::new(
            settings,
            resolver.clone(),
            Arc::new(minter),
            connector.clone(),
        );
        Harness {
            resolver,
            connector,
            service,
        }
    }

    fn harness(allowed: &[&str], pods: FakePods) -> Harness {
        harness_with(settings(allowed), FakeResolver::default(), FakeMinter::default(), pods)
    }

    fn batch(response: InvocationResponse) -> BatchResponse {
        match response {
            InvocationResponse::Batch(batch) => batch,
            other => panic!("expected batch response, got {:?}", other),
        }
    }

    fn legacy(response: InvocationResponse) -> LegacyResponse {
        match response {
            InvocationResponse::Legacy(legacy) => legacy,
            other => panic!("expected legacy response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_single_pod_recycled() {
        let h = harness(&["dev"], FakePods::default());
        let response = legacy(
            h.service
                .invoke(RecycleRequest::single("dev", "web-1"), None, "inv-1")
                .await,
        );

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "Pod web-1 recycled (deleted) in namespace dev.");
        assert_eq!(h.deleted(), vec!["dev/web-1".to_string()]);
        assert_eq!(
            *h.resolver.resolved.lock().unwrap(),
            vec!["gbs-dev-facets-eks-blue".to_string()]
        );
    }

    #[tokio::test]
    async fn test_mixed_batch_is_partial() {
        let h = harness(&["dev"], FakePods::default());
        let request = RecycleRequest::batch([
            PodTarget::new("dev", "a"),
            PodTarget::new("prod", "b"),
        ]);
        let response = batch(h.service.invoke(request, None, "inv-2").await);

        assert_eq!(response.status, "partial");
        assert_eq!(response.status_code, 500);
        let statuses: Vec<_> = response.outcomes.iter().map(|o| o.status.as_str()).collect();
        assert_eq!(statuses, vec!["success", "authorizationDenied"]);
        assert_eq!(h.deleted(), vec!["dev/a".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_allow_list_never_contacts_cluster() {
        let h = harness(&[], FakePods::default());
        let response = legacy(
            h.service
                .invoke(RecycleRequest::single("dev", "web-1"), None, "inv-3")
                .await,
        );

        assert_eq!(response.status_code, 400);
        assert_eq!(h.resolver_calls(), 0);
        assert!(h.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_empty_request_rejected_before_lookup() {
        let h = harness(&["dev"], FakePods::default());
        let response = batch(
            h.service
                .invoke(RecycleRequest::batch(Vec::new()), None, "inv-4")
                .await,
        );

        assert_eq!(response.status, "error");
        assert_eq!(response.status_code, 400);
        assert_eq!(h.resolver_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_pod_is_404() {
        let h = harness(
            &["dev"],
            FakePods {
                missing: vec!["gone".to_string()],
                ..Default::default()
            },
        );
        let response = legacy(
            h.service
                .invoke(RecycleRequest::single("dev", "gone"), None, "inv-5")
                .await,
        );
        assert_eq!(response.status_code, 404);
        assert_eq!(response.body, "Error: Pod gone not found in namespace dev.");
    }

    #[tokio::test]
    async fn test_delete_all_in_namespace() {
        let h = harness(
            &["dev"],
            FakePods {
                listed: vec!["a".to_string(), "b".to_string()],
                ..Default::default()
            },
        );
        let request = RecycleRequest {
            namespace: Some("dev".to_string()),
            delete_all: true,
            ..Default::default()
        };
        let response = legacy(h.service.invoke(request, None, "inv-6").await);

        assert_eq!(response.status_code, 200);
        assert_eq!(h.deleted(), vec!["dev/a".to_string(), "dev/b".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_all_denied_before_lookup() {
        let h = harness(&["dev"], FakePods::default());
        let request = RecycleRequest {
            namespace: Some("prod".to_string()),
            delete_all: true,
            ..Default::default()
        };
        let response = legacy(h.service.invoke(request, None, "inv-7").await);

        assert_eq!(response.status_code, 400);
        assert!(response.body.starts_with("Error: Namespace 'prod' is not allowed."));
        assert_eq!(h.resolver_calls(), 0);
    }

    #[tokio::test]
    async fn test_fatal_errors_abort_before_any_deletion() {
        let lookup_failure = harness_with(
            settings(&["dev"]),
            FakeResolver {
                fail: true,
                ..Default::default()
            },
            FakeMinter::default(),
            FakePods::default(),
        );
        let response = legacy(
            lookup_failure
                .service
                .invoke(RecycleRequest::single("dev", "web-1"), None, "inv-8")
                .await,
        );
        assert_eq!(response.status_code, 500);
        assert!(response.body.starts_with("Error: Failed to describe the EKS cluster"));
        assert!(lookup_failure.deleted().is_empty());

        let mint_failure = harness_with(
            settings(&["dev"]),
            FakeResolver::default(),
            FakeMinter { fail: true },
            FakePods::default(),
        );
        let response = batch(
            mint_failure
                .service
                .invoke(RecycleRequest::batch([PodTarget::new("dev", "a")]), None, "inv-9")
                .await,
        );
        assert_eq!(response.status_code, 500);
        assert_eq!(response.status, "error");
        assert!(mint_failure.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_missing_cluster_is_configuration_error() {
        let mut no_cluster = settings(&["dev"]);
        no_cluster.cluster_id = None;
        let h = harness_with(
            no_cluster,
            FakeResolver::default(),
            FakeMinter::default(),
            FakePods::default(),
        );

        let response = legacy(
            h.service
                .invoke(RecycleRequest::single("dev", "web-1"), None, "inv-10")
                .await,
        );
        assert_eq!(response.status_code, 500);
        assert_eq!(h.resolver_calls(), 0);
    }

    #[tokio::test]
    async fn test_cluster_override_uses_alias() {
        let h = harness(&["dev"], FakePods::default());
        let mut request = RecycleRequest::single("dev", "web-1");
        request.cluster_id = Some("green".to_string());
        h.service.invoke(request, None, "inv-11").await;

        assert_eq!(
            *h.resolver.resolved.lock().unwrap(),
            vec!["sky-eks-dev-cluster-green".to_string()]
        );
    }

    #[tokio::test]
    async fn test_trust_file_removed_after_operation() {
        let h = harness(&["dev"], FakePods::default());
        h.service
            .invoke(RecycleRequest::single("dev", "web-1"), None, "inv-12")
            .await;

        let paths = h.connector.trust_paths.lock().unwrap().clone();
        assert_eq!(paths.len(), 1);
        assert!(!paths[0].exists());
    }

    #[tokio::test]
    async fn test_each_operation_builds_fresh_config() {
        let h = harness(&["dev"], FakePods::default());
        for id in ["inv-13", "inv-14"] {
            h.service
                .invoke(RecycleRequest::single("dev", "web-1"), None, id)
                .await;
        }
        let paths = h.connector.trust_paths.lock().unwrap().clone();
        assert_eq!(h.resolver_calls(), 2);
        assert_ne!(paths[0], paths[1]);
    }

    #[tokio::test]
    async fn test_expired_deadline_reports_unattempted_targets() {
        let h = harness(&["dev"], FakePods::default());
        let response = batch(
            h.service
                .invoke(
                    RecycleRequest::batch([PodTarget::new("dev", "a")]),
                    Some(Instant::now()),
                    "inv-15",
                )
                .await,
        );

        assert_eq!(response.outcomes[0].status, "apiError");
        assert_eq!(response.outcomes[0].detail.as_deref(), Some("deadline exceeded"));
        assert!(h.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_kube_connector_builds_real_client() {
        recycler_eks::install_crypto_provider();
        let descriptor = ClusterDescriptor {
            identifier: "blue".to_string(),
            region: "us-east-1".to_string(),
            api_endpoint: "abc.gr7.us-east-1.eks.amazonaws.com".to_string(),
            ca_certificate: CA_PEM.to_vec(),
        };
        let credential = Credential::new(
            "k8s-aws-v1.dGVzdA",
            Utc::now(),
            "arn:aws:iam::123456789012:role/recycler",
        );
        let config = ClientConfig::build(descriptor, credential, &ClientOptions::default())
            .await
            .unwrap();
        let path = config.trust().path().to_path_buf();

        let client = KubeConnector.connect(&config).await;
        assert!(client.is_ok());

        drop(config);
        assert!(path.exists(), "client keeps the CA file alive");
        drop(client);
        assert!(!path.exists());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            RecycleError::from(CoreError::Validation("x".to_string())).status_code(),
            400
        );
        assert_eq!(RecycleError::from(CoreError::Api("x".to_string())).status_code(), 500);
        let err = RecycleError::from(EksError::Configuration("bad".to_string()));
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.kind(), "ConfigurationError");
        assert_eq!(RecycleError::MissingCluster.kind(), "ConfigurationError");
    }
}
