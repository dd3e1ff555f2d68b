use recycler_core::PodTarget;
use serde::{Deserialize, Serialize};

/// Invocation request as delivered by the trigger.
///
/// Both request shapes seen in the wild are accepted:
/// a legacy single pod (`namespace` + `podName`, optionally `deleteAll`)
/// and a batch (`targets` and/or `pods` lists).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecycleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    /// Recycle every pod in `namespace`
    #[serde(default)]
    pub delete_all: bool,

    /// Batch entries in the `{namespace, name}` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<Vec<PodRef>>,

    /// Batch entries in the `{namespace, podName}` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<PodRef>>,

    /// Overrides the configured cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

/// One batch entry; missing fields are reported per target, not as a parse error
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRef {
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default, alias = "name")]
    pub pod_name: Option<String>,
}

impl From<PodRef> for PodTarget {
    fn from(pod: PodRef) -> Self {
        PodTarget::new(
            pod.namespace.unwrap_or_default(),
            pod.pod_name.unwrap_or_default(),
        )
    }
}

/// Which response shape the caller expects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestShape {
    Single,
    Batch,
}

/// What the request asks the recycler to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecyclePlan {
    Targets(Vec<PodTarget>),
    Namespace(String),
}

impl RecycleRequest {
    /// Single-target request
    pub fn single(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            pod_name: Some(pod_name.into()),
            ..Default::default()
        }
    }

    /// Batch request from targets
    pub fn batch(targets: impl IntoIterator<Item = PodTarget>) -> Self {
        let targets = targets
            .into_iter()
            .map(|t| PodRef {
                namespace: Some(t.namespace),
                pod_name: Some(t.pod_name),
            })
            .collect();
        Self {
            targets: Some(targets),
            ..Default::default()
        }
    }

    pub fn shape(&self) -> RequestShape {
        if self.targets.is_some() || self.pods.is_some() {
            RequestShape::Batch
        } else {
            RequestShape::Single
        }
    }

    /// Normalize the request; a single pod becomes a batch of one
    pub fn plan(&self) -> RecyclePlan {
        match self.shape() {
            RequestShape::Batch => {
                let targets = self
                    .targets
                    .iter()
                    .chain(self.pods.iter())
                    .flatten()
                    .cloned()
                    .map(PodTarget::from)
                    .collect();
                RecyclePlan::Targets(targets)
            }
            RequestShape::Single if self.delete_all => {
                let namespace = self.namespace.as_deref().unwrap_or_default();
                RecyclePlan::Namespace(namespace.trim().to_string())
            }
            RequestShape::Single => {
                if self.namespace.is_none() && self.pod_name.is_none() {
                    return RecyclePlan::Targets(Vec::new());
                }
                RecyclePlan::Targets(vec![PodTarget::new(
                    self.namespace.clone().unwrap_or_default(),
                    self.pod_name.clone().unwrap_or_default(),
                )])
            }
        }
    }
}
