//! Snapshot: immutable collection of encoded xDS resources.
//!
//! A snapshot is a consistent view of all resources for one node at one
//! version. Snapshots are:
//!
//! - **Immutable**: once created, a snapshot cannot be modified
//! - **Versioned**: each snapshot carries a version string
//! - **Type-organized**: resources are grouped by type URL
//!
//! Resources are stored pre-encoded as `prost_types::Any` so discovery
//! responses assemble without re-serialization.

use std::collections::HashMap;
use std::sync::Arc;

use prost_types::Any;

/// Resources of one type within a snapshot, keyed by resource name.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResources {
    version: String,
    resources: HashMap<String, Any>,
}

impl SnapshotResources {
    /// Create a new empty resource collection.
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            resources: HashMap::new(),
        }
    }

    /// Version string for this resource type.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Number of resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True when there are no resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Get a resource by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&Any> {
        self.resources.get(name)
    }

    /// All resource names.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.resources.keys()
    }

    /// All resources, cloned into a vec.
    pub fn to_vec(&self) -> Vec<Any> {
        self.resources.values().cloned().collect()
    }

    /// The resources matching `names`, or all of them when `names` is
    /// empty (wildcard subscription).
    pub fn filtered(&self, names: &[String]) -> Vec<Any> {
        if names.is_empty() {
            return self.to_vec();
        }
        names
            .iter()
            .filter_map(|name| self.resources.get(name).cloned())
            .collect()
    }
}

/// An immutable snapshot of encoded resources for one node.
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: String,
    resources: HashMap<String, SnapshotResources>,
    created_at: std::time::Instant,
}

impl Snapshot {
    /// Create a new snapshot builder.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Global version of this snapshot.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Creation timestamp.
    #[inline]
    pub fn created_at(&self) -> std::time::Instant {
        self.created_at
    }

    /// Resources of a specific type.
    #[inline]
    pub fn resources(&self, type_url: &str) -> Option<&SnapshotResources> {
        self.resources.get(type_url)
    }

    /// Version of a specific resource type.
    #[inline]
    pub fn version_of(&self, type_url: &str) -> Option<&str> {
        self.resources.get(type_url).map(|r| r.version.as_str())
    }

    /// True when the snapshot carries the given resource type.
    #[inline]
    pub fn contains_type(&self, type_url: &str) -> bool {
        self.resources.contains_key(type_url)
    }

    /// All type URLs present in this snapshot.
    pub fn type_urls(&self) -> impl Iterator<Item = &String> {
        self.resources.keys()
    }

    /// Total number of resources across all types.
    pub fn total_resources(&self) -> usize {
        self.resources.values().map(SnapshotResources::len).sum()
    }

    /// True when no type carries any resource.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() || self.resources.values().all(SnapshotResources::is_empty)
    }
}

/// Builder for creating snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version: String,
    resources: HashMap<String, SnapshotResources>,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global version for this snapshot.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add named resources of one type, versioned with the global
    /// version.
    pub fn resources(
        mut self,
        type_url: &str,
        resources: impl IntoIterator<Item = (String, Any)>,
    ) -> Self {
        let mut entry = SnapshotResources::new(self.version.clone());
        for (name, resource) in resources {
            entry.resources.insert(name, resource);
        }
        self.resources.insert(type_url.to_string(), entry);
        self
    }

    /// Add a single named resource.
    pub fn resource(mut self, type_url: &str, name: impl Into<String>, resource: Any) -> Self {
        let entry = self
            .resources
            .entry(type_url.to_string())
            .or_insert_with(|| SnapshotResources::new(self.version.clone()));
        entry.resources.insert(name.into(), resource);
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot {
            version: self.version,
            resources: self.resources,
            created_at: std::time::Instant::now(),
        }
    }
}

/// Wrapper around `Arc<Snapshot>` for convenient sharing.
pub type SharedSnapshot = Arc<Snapshot>;

#[cfg(test)]
mod tests {
    use super::*;

    const CLUSTER_TYPE: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    fn any(name: &str) -> Any {
        Any {
            type_url: CLUSTER_TYPE.to_string(),
            value: name.as_bytes().to_vec(),
        }
    }

    #[test]
    fn snapshot_builder_basic() {
        let snapshot = Snapshot::builder().version("v1").build();

        assert_eq!(snapshot.version(), "v1");
        assert!(snapshot.is_empty());
    }

    #[test]
    fn snapshot_builder_with_resources() {
        let snapshot = Snapshot::builder()
            .version("v2")
            .resources(CLUSTER_TYPE, vec![("c1".to_string(), any("c1"))])
            .build();

        assert!(snapshot.contains_type(CLUSTER_TYPE));
        assert_eq!(snapshot.version_of(CLUSTER_TYPE), Some("v2"));
        assert_eq!(snapshot.total_resources(), 1);
    }

    #[test]
    fn snapshot_filtered_resources() {
        let snapshot = Snapshot::builder()
            .version("v1")
            .resources(
                CLUSTER_TYPE,
                vec![
                    ("c1".to_string(), any("c1")),
                    ("c2".to_string(), any("c2")),
                ],
            )
            .build();

        let all = snapshot.resources(CLUSTER_TYPE).unwrap().filtered(&[]);
        assert_eq!(all.len(), 2);

        let named = snapshot
            .resources(CLUSTER_TYPE)
            .unwrap()
            .filtered(&["c2".to_string()]);
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].value, b"c2");

        let unknown = snapshot
            .resources(CLUSTER_TYPE)
            .unwrap()
            .filtered(&["missing".to_string()]);
        assert!(unknown.is_empty());
    }
}
