//! Kubernetes client seam for the hub controller
//!
//! Everything the reconciler reads or writes goes through [`HubClient`], so the
//! pipeline can be driven by a mock in unit tests. Foreign kinds are addressed
//! through [`Gvk`] constants and handled as dynamic objects.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

#[cfg(test)]
use mockall::automock;

use crate::crd::MultiClusterHub;
use crate::kinds::{Gvk, ObjectKey};
use crate::{Error, Result, FIELD_MANAGER};

/// Cluster operations used by the reconciler
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Every MultiClusterHub in the cluster
    async fn list_hubs(&self) -> Result<Vec<MultiClusterHub>>;

    /// Replace a hub's metadata and spec; fails with a conflict on a stale
    /// resourceVersion
    async fn update_hub(&self, hub: &MultiClusterHub) -> Result<MultiClusterHub>;

    /// Replace a hub's status subresource
    async fn update_hub_status(&self, hub: &MultiClusterHub) -> Result<()>;

    /// Deployments in a namespace
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>>;

    /// A single object; `None` when it (or its API) does not exist
    async fn get(&self, gvk: Gvk, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    /// Objects of a kind, optionally scoped to a namespace and label selector;
    /// `None` when the API is not served
    async fn list(
        &self,
        gvk: Gvk,
        namespace: Option<String>,
        selector: Option<String>,
    ) -> Result<Option<Vec<DynamicObject>>>;

    /// Server-side apply an operator-owned object
    async fn apply(&self, gvk: Gvk, obj: &DynamicObject) -> Result<()>;

    /// JSON merge patch
    async fn patch(&self, gvk: Gvk, key: &ObjectKey, patch: &Value) -> Result<()>;

    /// Delete an object; absence counts as success
    async fn delete(&self, gvk: Gvk, key: &ObjectKey) -> Result<()>;
}

/// Convert a dynamic object into a typed resource
pub fn typed<T: DeserializeOwned>(obj: DynamicObject) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(obj)?)?)
}

fn not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(r) if r.code == 404)
}

/// Production client backed by a kube `Client`
pub struct KubeHubClient {
    client: Client,
}

impl KubeHubClient {
    /// Wrap a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, gvk: Gvk, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = gvk.api_resource();
        match (gvk.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        }
    }
}

#[async_trait]
impl HubClient for KubeHubClient {
    async fn list_hubs(&self) -> Result<Vec<MultiClusterHub>> {
        let api: Api<MultiClusterHub> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_hub(&self, hub: &MultiClusterHub) -> Result<MultiClusterHub> {
        let namespace = hub.namespace().unwrap_or_default();
        let api: Api<MultiClusterHub> = Api::namespaced(self.client.clone(), &namespace);
        Ok(api
            .replace(&hub.name_any(), &PostParams::default(), hub)
            .await?)
    }

    async fn update_hub_status(&self, hub: &MultiClusterHub) -> Result<()> {
        let namespace = hub.namespace().unwrap_or_default();
        let api: Api<MultiClusterHub> = Api::namespaced(self.client.clone(), &namespace);
        let body = serde_json::to_vec(hub)?;
        api.replace_status(&hub.name_any(), &PostParams::default(), body)
            .await?;
        Ok(())
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get(&self, gvk: Gvk, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        let api = self.api(gvk, key.namespace.as_deref());
        match api.get(&key.name).await {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        gvk: Gvk,
        namespace: Option<String>,
        selector: Option<String>,
    ) -> Result<Option<Vec<DynamicObject>>> {
        let api = self.api(gvk, namespace.as_deref());
        let mut params = ListParams::default();
        if let Some(selector) = selector.as_deref() {
            params = params.labels(selector);
        }
        match api.list(&params).await {
            Ok(list) => Ok(Some(list.items)),
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn apply(&self, gvk: Gvk, obj: &DynamicObject) -> Result<()> {
        let api = self.api(gvk, obj.metadata.namespace.as_deref());
        let name = obj.name_any();
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(obj))
            .await
            .map_err(|e| match e {
                kube::Error::Api(r) if r.code == 404 || r.code == 409 => {
                    Error::Kube(kube::Error::Api(r))
                }
                other => Error::apply(gvk.kind, &name, other.to_string()),
            })?;
        Ok(())
    }

    async fn patch(&self, gvk: Gvk, key: &ObjectKey, patch: &Value) -> Result<()> {
        let api = self.api(gvk, key.namespace.as_deref());
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await?;
        Ok(())
    }

    async fn delete(&self, gvk: Gvk, key: &ObjectKey) -> Result<()> {
        let api = self.api(gvk, key.namespace.as_deref());
        match api.delete(&key.name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) if not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use serde_json::json;

    #[test]
    fn typed_converts_dynamic_secret() {
        let mut obj = crate::kinds::SECRET.object("pull", Some("open-cluster-management"));
        obj.data = json!({"type": "kubernetes.io/dockerconfigjson", "data": {".dockerconfigjson": "e30="}});
        let secret: Secret = typed(obj).expect("typed");
        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/dockerconfigjson"));
        assert!(secret.data.expect("data").contains_key(".dockerconfigjson"));
    }
}
