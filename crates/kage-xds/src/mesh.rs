//! The per-canary mesh descriptor.

use kage_core::annotations::CanaryAnnotation;
use kage_core::{names, Error, Result};

/// One side of the traffic split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshSide {
    /// Name of the pod controller backing this side.
    pub deploy_name: String,
    /// Envoy cluster name.
    pub cluster_name: String,
    /// Share of traffic out of [`MeshConfig::total`].
    pub weight: u32,
}

/// Binds a canary to its target: node identity, both cluster names, and
/// the routing weights. Derived deterministically from the canary
/// annotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeshConfig {
    /// xDS node identity of the proxy fleet.
    pub node_id: String,
    /// The pre-existing controller whose Services are interposed.
    pub target: MeshSide,
    /// The alternative controller under evaluation.
    pub canary: MeshSide,
    /// Total weight; always 100.
    pub total: u32,
}

impl MeshConfig {
    /// Derive the mesh descriptor from a canary annotation.
    ///
    /// Fails with `Invalid` when the routing percentage exceeds 100 or
    /// the annotation is missing its target reference.
    pub fn from_annotation(annotation: &CanaryAnnotation) -> Result<Self> {
        let pct = annotation.routing_percentage;
        if pct > 100 {
            return Err(Error::invalid(format!(
                "routing percentage {pct} exceeds 100"
            )));
        }
        let target = &annotation.source_obj;
        if target.name.is_empty() || target.namespace.is_empty() {
            return Err(Error::invalid(
                "canary annotation is missing its target reference",
            ));
        }

        Ok(Self {
            node_id: names::node_id(&target.namespace, &target.name),
            target: MeshSide {
                deploy_name: target.name.clone(),
                cluster_name: names::service_cluster_name(&target.name),
                weight: 100 - pct,
            },
            canary: MeshSide {
                deploy_name: annotation.canary_obj.name.clone(),
                cluster_name: names::canary_cluster_name(&target.name),
                weight: pct,
            },
            total: 100,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kage_core::annotations::ObjRef;

    fn annotation(pct: u32) -> CanaryAnnotation {
        CanaryAnnotation {
            source_obj: ObjRef {
                name: "nginx".to_string(),
                kind: "Deployment".to_string(),
                namespace: "ns1".to_string(),
            },
            canary_obj: ObjRef {
                name: "nginx-kage".to_string(),
                kind: "Deployment".to_string(),
                namespace: "ns1".to_string(),
            },
            routing_percentage: pct,
        }
    }

    #[test]
    fn test_mesh_from_annotation() {
        let mesh = MeshConfig::from_annotation(&annotation(30)).unwrap();

        assert_eq!(mesh.node_id, "kage-ns1-nginx");
        assert_eq!(mesh.target.cluster_name, "nginx-kage-service");
        assert_eq!(mesh.canary.cluster_name, "nginx-kage-canary");
        assert_eq!(mesh.target.weight, 70);
        assert_eq!(mesh.canary.weight, 30);
        assert_eq!(mesh.target.weight + mesh.canary.weight, mesh.total);
    }

    #[test]
    fn test_percentage_over_100_rejected() {
        let err = MeshConfig::from_annotation(&annotation(130)).unwrap_err();
        assert_eq!(err.kind(), kage_core::ErrorKind::Invalid);
    }

    #[test]
    fn test_missing_target_rejected() {
        let mut ann = annotation(10);
        ann.source_obj.name.clear();
        assert!(MeshConfig::from_annotation(&ann).is_err());
    }
}
