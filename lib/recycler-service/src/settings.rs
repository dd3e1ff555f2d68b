//! Process configuration read once at startup

use recycler_core::{NamespaceAllowList, DEFAULT_CONCURRENCY};
use recycler_eks::config::DEFAULT_API_TIMEOUT;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

pub const REGION_VAR: &str = "AWS_REGION";
pub const FALLBACK_REGION_VAR: &str = "AWS_DEFAULT_REGION";
pub const CLUSTER_VAR: &str = "EKS_CLUSTER_NAME";
pub const CLUSTER_ALIASES_VAR: &str = "EKS_CLUSTER_ALIASES";
pub const ALLOWED_NAMESPACES_VAR: &str = "ALLOWED_NAMESPACES";
pub const CONCURRENCY_VAR: &str = "RECYCLE_CONCURRENCY";
pub const API_TIMEOUT_VAR: &str = "KUBE_API_TIMEOUT_SECS";
pub const DEBUG_VAR: &str = "DEBUG";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings shared by every invocation of the process
#[derive(Clone, Debug)]
pub struct RecyclerSettings {
    pub region: String,
    /// Cluster used when a request does not name one
    pub cluster_id: Option<String>,
    /// Short names accepted in `clusterId`, e.g. `blue=sky-eks-dev-cluster-blue`
    pub cluster_aliases: BTreeMap<String, String>,
    pub allowed_namespaces: NamespaceAllowList,
    pub concurrency: usize,
    pub api_timeout: Duration,
    pub debug: bool,
}

impl RecyclerSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let region = get(REGION_VAR)
            .or_else(|| get(FALLBACK_REGION_VAR))
            .ok_or(SettingsError::Missing(REGION_VAR))?;

        let allowed_namespaces = match get(ALLOWED_NAMESPACES_VAR) {
            Some(raw) => parse_allow_list(&raw)?,
            None => NamespaceAllowList::empty(),
        };
        if allowed_namespaces.is_empty() {
            warn!(
                "{} is empty; every recycle request will be denied",
                ALLOWED_NAMESPACES_VAR
            );
        }

        let concurrency = match get(CONCURRENCY_VAR) {
            Some(raw) => parse_positive(CONCURRENCY_VAR, &raw)?,
            None => DEFAULT_CONCURRENCY,
        };
        let api_timeout = match get(API_TIMEOUT_VAR) {
            Some(raw) => Duration::from_secs(parse_positive(API_TIMEOUT_VAR, &raw)? as u64),
            None => DEFAULT_API_TIMEOUT,
        };
        let cluster_aliases = match get(CLUSTER_ALIASES_VAR) {
            Some(raw) => parse_aliases(&raw)?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            region,
            cluster_id: get(CLUSTER_VAR),
            cluster_aliases,
            allowed_namespaces,
            concurrency,
            api_timeout,
            debug: flag_enabled(lookup(DEBUG_VAR).as_deref()),
        })
    }

    /// Cluster to operate on: the request's choice, else the default, with aliases expanded
    pub fn cluster_for(&self, requested: Option<&str>) -> Option<String> {
        let chosen = requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.cluster_id.clone())?;
        Some(self.cluster_aliases.get(&chosen).cloned().unwrap_or(chosen))
    }
}

/// Accepts a JSON array (`["dev","ui"]`) or a comma separated list (`dev,ui`)
pub fn parse_allow_list(raw: &str) -> Result<NamespaceAllowList, SettingsError> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        let names: Vec<String> =
            serde_json::from_str(raw).map_err(|e| SettingsError::Invalid {
                name: ALLOWED_NAMESPACES_VAR,
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
        return Ok(names.into_iter().collect());
    }
    Ok(raw.split(',').collect())
}

fn parse_aliases(raw: &str) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut aliases = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (alias, cluster) = entry
            .split_once('=')
            .map(|(a, c)| (a.trim(), c.trim()))
            .filter(|(a, c)| !a.is_empty() && !c.is_empty())
            .ok_or_else(|| SettingsError::Invalid {
                name: CLUSTER_ALIASES_VAR,
                value: entry.to_string(),
                reason: "expected alias=cluster-name".to_string(),
            })?;
        aliases.insert(alias.to_string(), cluster.to_string());
    }
    Ok(aliases)
}

fn parse_positive(name: &'static str, raw: &str) -> Result<usize, SettingsError> {
    match raw.parse::<usize>() {
        Ok(0) => Err(SettingsError::Invalid {
            name,
            value: raw.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        Ok(value) => Ok(value),
        Err(e) => Err(SettingsError::Invalid {
            name,
            value: raw.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// `true`, `1` and `yes` (any case) turn a flag on
pub fn flag_enabled(raw: Option<&str>) -> bool {
    raw.map(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes"
        )
    })
    .unwrap_or(false)
}
