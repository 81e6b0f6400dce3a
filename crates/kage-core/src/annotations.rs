//! Annotation records.
//!
//! Three structured records travel with Kubernetes objects as flattened
//! annotations: the canary annotation on a canary controller, the xDS
//! annotation linking a controller to its node identity, and the proxy
//! annotation remembering an interposed Service's original selector.
//! All reconcilable intent lives here so the reconciler can rebuild its
//! world from API state after a restart.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::codec::{self, Annotated, Encoder};
use crate::error::Result;
use crate::names;

/// Reference to a namespaced Kubernetes object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjRef {
    pub name: String,
    pub kind: String,
    pub namespace: String,
}

impl Annotated for ObjRef {
    fn encode_fields(&self, enc: &mut Encoder) {
        enc.str_field("name", &self.name);
        enc.str_field("kind", &self.kind);
        enc.str_field("namespace", &self.namespace);
    }

    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
        match path {
            ["name"] => self.name = raw.to_string(),
            ["kind"] => self.kind = raw.to_string(),
            ["namespace"] => self.namespace = raw.to_string(),
            _ => {}
        }
        Ok(())
    }
}

/// The canary annotation: placed on the canary controller, it binds the
/// canary to its target and carries the declared routing percentage.
///
/// Domain: `canary.kage.cloud`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanaryAnnotation {
    pub source_obj: ObjRef,
    pub canary_obj: ObjRef,
    pub routing_percentage: u32,
}

impl CanaryAnnotation {
    /// Flatten into annotation form.
    #[must_use]
    pub fn to_annotations(&self) -> BTreeMap<String, String> {
        codec::encode(names::CANARY_DOMAIN, self)
    }

    /// Rebuild from an object's annotations; `None` when the object does
    /// not carry the record.
    pub fn from_annotations(map: &BTreeMap<String, String>) -> Result<Option<Self>> {
        if !map.contains_key("canary.kage.cloud/source_obj/name") {
            return Ok(None);
        }
        let mut record = Self::default();
        codec::decode(names::CANARY_DOMAIN, map, &mut record)?;
        Ok(Some(record))
    }
}

impl Annotated for CanaryAnnotation {
    fn encode_fields(&self, enc: &mut Encoder) {
        enc.nested("source_obj", |e| self.source_obj.encode_fields(e));
        enc.nested("canary_obj", |e| self.canary_obj.encode_fields(e));
        enc.u32_field("routing_percentage", self.routing_percentage);
    }

    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
        match path {
            ["source_obj", rest @ ..] => self.source_obj.decode_field(rest, raw),
            ["canary_obj", rest @ ..] => self.canary_obj.decode_field(rest, raw),
            ["routing_percentage"] => {
                self.routing_percentage = codec::parse_u32(raw)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Reference to an Envoy cluster by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRef {
    pub cluster_name: String,
}

impl Annotated for ClusterRef {
    fn encode_fields(&self, enc: &mut Encoder) {
        enc.str_field("cluster_name", &self.cluster_name);
    }

    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
        if path == ["cluster_name"] {
            self.cluster_name = raw.to_string();
        }
        Ok(())
    }
}

/// Envoy-facing configuration nested inside the xDS annotation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XdsConfig {
    pub canary: ClusterRef,
    pub source: ClusterRef,
    pub node_id: String,
}

impl Annotated for XdsConfig {
    fn encode_fields(&self, enc: &mut Encoder) {
        enc.nested("canary", |e| self.canary.encode_fields(e));
        enc.nested("source", |e| self.source.encode_fields(e));
        enc.str_field("node_id", &self.node_id);
    }

    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
        match path {
            ["canary", rest @ ..] => self.canary.decode_field(rest, raw),
            ["source", rest @ ..] => self.source.decode_field(rest, raw),
            ["node_id"] => {
                self.node_id = raw.to_string();
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// The xDS annotation: links a controller to its xDS node identity and
/// the clusters that split its traffic. The node id recorded here is the
/// source of truth for the life of the canary.
///
/// Domain: `xds.kage.cloud`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XdsAnnotation {
    pub node_id: String,
    pub label_selector: BTreeMap<String, String>,
    pub config: XdsConfig,
}

impl XdsAnnotation {
    /// Flatten into annotation form.
    #[must_use]
    pub fn to_annotations(&self) -> BTreeMap<String, String> {
        codec::encode(names::XDS_DOMAIN, self)
    }

    /// Rebuild from an object's annotations; `None` when the object does
    /// not carry the record.
    pub fn from_annotations(map: &BTreeMap<String, String>) -> Result<Option<Self>> {
        if !map.contains_key("xds.kage.cloud/node_id") {
            return Ok(None);
        }
        let mut record = Self::default();
        codec::decode(names::XDS_DOMAIN, map, &mut record)?;
        Ok(Some(record))
    }
}

impl Annotated for XdsAnnotation {
    fn encode_fields(&self, enc: &mut Encoder) {
        enc.str_field("node_id", &self.node_id);
        enc.map_field("label_selector", &self.label_selector);
        enc.nested("config", |e| self.config.encode_fields(e));
    }

    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
        match path {
            ["node_id"] => {
                self.node_id = raw.to_string();
                Ok(())
            }
            ["label_selector"] => {
                self.label_selector = codec::parse_map(raw)?;
                Ok(())
            }
            ["config", rest @ ..] => self.config.decode_field(rest, raw),
            _ => Ok(()),
        }
    }
}

/// The proxy annotation: present exactly while a Service is interposed,
/// it remembers the selector to restore on release.
///
/// Domain: `xds.kage.cloud`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyAnnotation {
    pub proxied: bool,
    pub deleted_selector: BTreeMap<String, String>,
}

impl ProxyAnnotation {
    /// The full annotation keys this record occupies, for callers that
    /// need to strip the record off an object.
    #[must_use]
    pub fn annotation_keys() -> [String; 2] {
        [
            format!("{}/proxied", names::XDS_DOMAIN),
            format!("{}/deleted_selector", names::XDS_DOMAIN),
        ]
    }

    /// Flatten into annotation form.
    #[must_use]
    pub fn to_annotations(&self) -> BTreeMap<String, String> {
        codec::encode(names::XDS_DOMAIN, self)
    }

    /// Rebuild from an object's annotations; `None` when the object does
    /// not carry the record.
    pub fn from_annotations(map: &BTreeMap<String, String>) -> Result<Option<Self>> {
        let [proxied_key, _] = Self::annotation_keys();
        if !map.contains_key(&proxied_key) {
            return Ok(None);
        }
        let mut record = Self::default();
        codec::decode(names::XDS_DOMAIN, map, &mut record)?;
        Ok(Some(record))
    }
}

impl Annotated for ProxyAnnotation {
    fn encode_fields(&self, enc: &mut Encoder) {
        enc.bool_field("proxied", self.proxied);
        enc.map_field("deleted_selector", &self.deleted_selector);
    }

    fn decode_field(&mut self, path: &[&str], raw: &str) -> Result<()> {
        match path {
            ["proxied"] => {
                self.proxied = codec::parse_bool(raw)?;
                Ok(())
            }
            ["deleted_selector"] => {
                self.deleted_selector = codec::parse_map(raw)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canary_annotation_roundtrip() {
        let record = CanaryAnnotation {
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
            routing_percentage: 25,
        };

        let map = record.to_annotations();
        assert_eq!(map["canary.kage.cloud/source_obj/name"], "nginx");
        assert_eq!(map["canary.kage.cloud/canary_obj/name"], "nginx-kage");
        assert_eq!(map["canary.kage.cloud/routing_percentage"], "25");

        let decoded = CanaryAnnotation::from_annotations(&map).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_canary_annotation_absent() {
        let map = BTreeMap::from([("app".to_string(), "nginx".to_string())]);
        assert!(CanaryAnnotation::from_annotations(&map).unwrap().is_none());
    }

    #[test]
    fn test_xds_annotation_roundtrip() {
        let record = XdsAnnotation {
            node_id: "kage-ns1-nginx".to_string(),
            label_selector: BTreeMap::from([("app".to_string(), "nginx".to_string())]),
            config: XdsConfig {
                canary: ClusterRef {
                    cluster_name: "nginx-kage-canary".to_string(),
                },
                source: ClusterRef {
                    cluster_name: "nginx-kage-service".to_string(),
                },
                node_id: "kage-ns1-nginx".to_string(),
            },
        };

        let map = record.to_annotations();
        assert_eq!(map["xds.kage.cloud/node_id"], "kage-ns1-nginx");
        assert_eq!(map["xds.kage.cloud/label_selector"], "app=nginx");
        assert_eq!(
            map["xds.kage.cloud/config/canary/cluster_name"],
            "nginx-kage-canary"
        );

        let decoded = XdsAnnotation::from_annotations(&map).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_proxy_annotation_roundtrip() {
        let record = ProxyAnnotation {
            proxied: true,
            deleted_selector: BTreeMap::from([
                ("app".to_string(), "nginx".to_string()),
                ("tier".to_string(), "web".to_string()),
            ]),
        };

        let map = record.to_annotations();
        assert_eq!(map["xds.kage.cloud/proxied"], "true");
        assert_eq!(
            map["xds.kage.cloud/deleted_selector"],
            "app=nginx,tier=web"
        );

        let decoded = ProxyAnnotation::from_annotations(&map).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_proxy_annotation_keys_cover_the_encoding() {
        let record = ProxyAnnotation {
            proxied: true,
            deleted_selector: BTreeMap::from([("app".to_string(), "nginx".to_string())]),
        };

        let map = record.to_annotations();
        for key in ProxyAnnotation::annotation_keys() {
            assert!(map.contains_key(&key), "missing {key}");
        }
        assert_eq!(map.len(), ProxyAnnotation::annotation_keys().len());
    }

    #[test]
    fn test_records_share_a_domain_without_colliding() {
        let proxy = ProxyAnnotation {
            proxied: true,
            deleted_selector: BTreeMap::new(),
        };
        let xds = XdsAnnotation {
            node_id: "n1".to_string(),
            ..XdsAnnotation::default()
        };

        let mut merged = proxy.to_annotations();
        merged.extend(xds.to_annotations());

        let proxy_back = ProxyAnnotation::from_annotations(&merged).unwrap().unwrap();
        let xds_back = XdsAnnotation::from_annotations(&merged).unwrap().unwrap();
        assert!(proxy_back.proxied);
        assert_eq!(xds_back.node_id, "n1");
    }
}
