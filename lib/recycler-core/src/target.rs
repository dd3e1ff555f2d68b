//! Pod targets
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single pod to recycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTarget {
    pub namespace: String,
    pub pod_name: String,
}

impl PodTarget {
    /// Surrounding whitespace is dropped from both fields
    pub fn new(namespace: impl Into<String>, pod_name: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        let pod_name: String = pod_name.into();
        Self {
            namespace: namespace.trim().to_string(),
            pod_name: pod_name.trim().to_string(),
        }
    }

    /// Check that both fields carry a usable value
    pub fn validate(&self) -> Result<(), String> {
        if self.namespace.trim().is_empty() {
            return Err("'namespace' parameter is required".to_string());
        }
        if self.pod_name.trim().is_empty() {
            return Err("'podName' parameter is required".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for PodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)
    }
}
