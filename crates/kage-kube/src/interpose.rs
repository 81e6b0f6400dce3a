//! Proxy interposition: reversible Service selector hijacking.
//!
//! Interposing a Service stashes its selector in the proxy annotation
//! and points the selector at the Envoy proxy pods instead. Releasing
//! restores the stashed selector and removes every trace. Both
//! directions are idempotent, so a crashed reconciler can simply run
//! them again.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Service;
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::info;

use kage_core::annotations::ProxyAnnotation;
use kage_core::{names, Error, Result};

/// Applies and reverts interposition through the API server.
#[derive(Clone)]
pub struct Interposer {
    client: Client,
}

impl Interposer {
    /// Create an interposer over the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Interpose one Service, replacing its selector with
    /// `replacement`. No-op when already interposed.
    pub async fn interpose(
        &self,
        namespace: &str,
        name: &str,
        replacement: &BTreeMap<String, String>,
    ) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let svc = api
            .get_opt(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("service {namespace}/{name}")))?;

        let Some(updated) = interposed(&svc, replacement) else {
            return Ok(());
        };
        api.replace(name, &PostParams::default(), &updated).await?;
        info!(namespace, service = name, "interposed service");
        Ok(())
    }

    /// Restore one Service's original selector. No-op when the Service
    /// is not interposed.
    pub async fn release(&self, namespace: &str, name: &str) -> Result<()> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let Some(svc) = api.get_opt(name).await? else {
            return Ok(());
        };

        let Some(updated) = released(&svc)? else {
            return Ok(());
        };
        api.replace(name, &PostParams::default(), &updated).await?;
        info!(namespace, service = name, "released service");
        Ok(())
    }
}

/// True when the Service carries the proxied marker label.
#[must_use]
pub fn is_interposed(svc: &Service) -> bool {
    svc.labels().get(names::PROXIED_LABEL).map(String::as_str) == Some("true")
}

/// The interposed form of a Service, or `None` when it already is.
#[must_use]
pub fn interposed(svc: &Service, replacement: &BTreeMap<String, String>) -> Option<Service> {
    if is_interposed(svc) {
        return None;
    }

    let mut svc = svc.clone();
    let spec = svc.spec.get_or_insert_with(Default::default);
    let deleted_selector = spec.selector.take().unwrap_or_default();
    spec.selector = Some(replacement.clone());

    let record = ProxyAnnotation {
        proxied: true,
        deleted_selector,
    };
    svc.annotations_mut().extend(record.to_annotations());
    svc.labels_mut()
        .insert(names::PROXIED_LABEL.to_string(), "true".to_string());
    Some(svc)
}

/// The released form of a Service, or `None` when it is not interposed.
pub fn released(svc: &Service) -> Result<Option<Service>> {
    let annotations: BTreeMap<String, String> = svc.annotations().clone();
    let Some(record) = ProxyAnnotation::from_annotations(&annotations)? else {
        return Ok(None);
    };

    let mut svc = svc.clone();
    let spec = svc.spec.get_or_insert_with(Default::default);
    spec.selector = if record.deleted_selector.is_empty() {
        None
    } else {
        Some(record.deleted_selector)
    };

    let annotations = svc.annotations_mut();
    for key in ProxyAnnotation::annotation_keys() {
        annotations.remove(&key);
    }
    svc.labels_mut().remove(names::PROXIED_LABEL);
    Ok(Some(svc))
}
