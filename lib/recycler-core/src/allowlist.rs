//! Namespace authorization gate

use std::collections::BTreeSet;
use tracing::debug;

/// Set of namespaces pods may be recycled in.
///
/// An empty list denies every namespace.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamespaceAllowList {
    namespaces: BTreeSet<String>,
}

impl NamespaceAllowList {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let namespaces = namespaces
            .into_iter()
            .map(Into::into)
            .map(|ns: String| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .collect();
        Self { namespaces }
    }

    /// Deny-all list
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decide whether `namespace` may be targeted
    pub fn permits(&self, namespace: &str) -> bool {
        let allowed = !namespace.is_empty() && self.namespaces.contains(namespace);
        if !allowed {
            debug!("Namespace '{}' rejected by allow-list", namespace);
        }
        allowed
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// Comma separated rendering used in denial messages
    pub fn describe(&self) -> String {
        self.iter().collect::<Vec<_>>().join(", ")
    }
}

impl<S: Into<String>> FromIterator<S> for NamespaceAllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
