//! Batch pod recycler

use crate::{
    BatchResult, CoreError, NamespaceAllowList, PodApiError, PodTarget, RecycleOutcome,
    RecycleStatus, Result,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Default number of deletions in flight at once
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Detail recorded for targets that were not attempted before the deadline
pub const DEADLINE_EXCEEDED: &str = "deadline exceeded";

/// Cluster operations the recycler needs
#[async_trait]
pub trait PodClient: Send + Sync {
    /// Delete a pod, reporting `PodApiError::NotFound` when it is already gone
    async fn delete_pod(&self, namespace: &str, name: &str) -> std::result::Result<(), PodApiError>;

    /// Names of the pods currently in a namespace
    async fn list_pods(&self, namespace: &str) -> std::result::Result<Vec<String>, PodApiError>;
}

/// Reject a request that names no targets at all
pub fn ensure_targets(targets: &[PodTarget]) -> Result<()> {
    if targets.is_empty() {
        return Err(CoreError::Validation(
            "no pods specified for recycling".to_string(),
        ));
    }
    Ok(())
}

/// Status for a target that must not reach the cluster, or `None` if it may
pub fn screen_target(allow_list: &NamespaceAllowList, target: &PodTarget) -> Option<RecycleStatus> {
    if let Err(detail) = target.validate() {
        warn!("Invalid pod target {:?}: {}", target, detail);
        return Some(RecycleStatus::ValidationError(detail));
    }

    if !allow_list.permits(&target.namespace) {
        warn!(
            namespace = %target.namespace,
            pod = %target.pod_name,
            "Namespace is not in the allow-list"
        );
        return Some(RecycleStatus::AuthorizationDenied);
    }
    None
}

/// Gate for the delete-all variant, applied before the namespace is listed
pub fn screen_namespace(allow_list: &NamespaceAllowList, namespace: &str) -> Result<()> {
    if namespace.trim().is_empty() {
        return Err(CoreError::Validation(
            "'namespace' parameter is required".to_string(),
        ));
    }
    if !allow_list.permits(namespace) {
        warn!(namespace, "Refusing to recycle namespace outside the allow-list");
        return Err(CoreError::AuthorizationDenied {
            namespace: namespace.to_string(),
            allowed: allow_list.describe(),
        });
    }
    Ok(())
}

/// BatchRecycler deletes a batch of pods, one independent attempt per target
pub struct BatchRecycler {
    client: Arc<dyn PodClient>,
    allow_list: NamespaceAllowList,
    concurrency: usize,
    deadline: Option<Instant>,
}

impl BatchRecycler {
    pub fn new(client: Arc<dyn PodClient>, allow_list: NamespaceAllowList) -> Self {
        Self {
            client,
            allow_list,
            concurrency: DEFAULT_CONCURRENCY,
            deadline: None,
        }
    }

    /// Limit in-flight deletions; 1 processes targets sequentially
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Stop attempting deletions once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Recycle every target; outcomes come back in input order
    pub async fn recycle(&self, targets: Vec<PodTarget>) -> Result<BatchResult> {
        ensure_targets(&targets)?;
        info!(
            "Recycling {} pod(s) with concurrency {}",
            targets.len(),
            self.concurrency
        );

        let outcomes: Vec<RecycleOutcome> = stream::iter(targets)
            .map(|target| self.recycle_one(target))
            .buffered(self.concurrency)
            .collect()
            .await;

        let result = BatchResult::from_outcomes(outcomes);
        info!(
            aggregate = ?result.aggregate,
            succeeded = result.succeeded(),
            failed = result.failed(),
            "Batch finished"
        );
        Ok(result)
    }

    /// Recycle every pod currently running in `namespace`
    pub async fn recycle_namespace(&self, namespace: &str) -> Result<BatchResult> {
        screen_namespace(&self.allow_list, namespace)?;

        let pods = self
            .client
            .list_pods(namespace)
            .await
            .map_err(|e| CoreError::Api(e.to_string()))?;
        debug!("Found {} pod(s) in namespace {}", pods.len(), namespace);

        if pods.is_empty() {
            info!(namespace, "No pods to recycle");
            return Ok(BatchResult::from_outcomes(Vec::new()));
        }

        let targets = pods
            .into_iter()
            .map(|pod| PodTarget::new(namespace, pod))
            .collect();
        self.recycle(targets).await
    }

    async fn recycle_one(&self, target: PodTarget) -> RecycleOutcome {
        if let Some(status) = screen_target(&self.allow_list, &target) {
            return RecycleOutcome::new(target, status);
        }

        if self.deadline_passed() {
            warn!(pod = %target, "Deadline passed before deletion was attempted");
            return RecycleOutcome::new(
                target,
                RecycleStatus::ApiError(DEADLINE_EXCEEDED.to_string()),
            );
        }

        debug!("Attempting to delete pod {}", target);
        let status = match self
            .client
            .delete_pod(&target.namespace, &target.pod_name)
            .await
        {
            Ok(()) => {
                info!("Recycled pod {}", target);
                RecycleStatus::Success
            }
            Err(PodApiError::NotFound) => {
                warn!("Pod {} not found", target);
                RecycleStatus::NotFound
            }
            Err(PodApiError::Api(detail)) => {
                error!("Failed to delete pod {}: {}", target, detail);
                RecycleStatus::ApiError(detail)
            }
        };
        RecycleOutcome::new(target, status)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}
