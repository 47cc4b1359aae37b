//! Chart rendering and the resource applier
//!
//! Components ship as chart directories under the templates path. Every
//! `templates/*.yaml` file is rendered with minijinja against a values document
//! built from the hub and the resolved overrides, then split into objects.
//! Errors are collected per template so one broken manifest does not hide the
//! rest of the chart.
//!
//! The [`Applier`] is the only place that writes rendered objects. It uses
//! server-side apply and refuses storage-class changes on volume-bearing kinds,
//! which the API server would reject anyway.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams};
use kube::core::ApiResource;
use kube::{Client, ResourceExt};
use minijinja::Environment;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use crate::config::{OperatorConfig, PackageMode};
use crate::crd::MultiClusterHub;
use crate::kinds::Gvk;
use crate::{Error, Result, ANNOTATION_EDITABLE, ANNOTATION_RELEASE_VERSION, FIELD_MANAGER};

/// What to render
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    /// Chart directory
    pub chart: PathBuf,
    /// Values document passed to every template
    pub values: Value,
}

/// Rendered objects plus per-template errors
#[derive(Clone, Debug, Default)]
pub struct RenderOutput {
    /// Objects in template order
    pub objects: Vec<DynamicObject>,
    /// One message per template that failed
    pub errors: Vec<String>,
}

impl RenderOutput {
    /// True if no template failed
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Inputs for the values document
pub struct ChartInputs<'a> {
    /// The hub being reconciled
    pub hub: &'a MultiClusterHub,
    /// Operator configuration
    pub config: &'a OperatorConfig,
    /// Resolved image overrides
    pub images: &'a BTreeMap<String, String>,
    /// Resolved template overrides
    pub templates: &'a BTreeMap<String, String>,
    /// Short-lived token credential posture
    pub sts: bool,
    /// Host platform version, if known
    pub platform_version: Option<&'a str>,
    /// Cluster ingress domain, if discovered
    pub ingress_domain: Option<&'a str>,
    /// API server URL, if discovered
    pub api_url: Option<&'a str>,
}

/// Values document shared by every chart
pub fn chart_values(inputs: &ChartInputs<'_>) -> Value {
    let hub = inputs.hub;
    let spec = &hub.spec;
    let availability = hub.effective_availability();
    let proxy: BTreeMap<&str, String> = inputs.config.proxy.env_pairs().into_iter().collect();
    let hub_type = match inputs.config.package_mode() {
        Ok(PackageMode::Community) => "community",
        _ => "commercial",
    };
    json!({
        "global": {
            "namespace": hub.namespace().unwrap_or_default(),
            "pullSecret": spec.image_pull_secret.clone().unwrap_or_default(),
            "pullPolicy": spec
                .overrides
                .as_ref()
                .and_then(|o| o.image_pull_policy.clone())
                .unwrap_or_else(|| "IfNotPresent".to_string()),
            "imageOverrides": inputs.images,
            "templateOverrides": inputs.templates,
            "hubVersion": inputs.config.version,
            "stsEnabled": inputs.sts,
        },
        "hubconfig": {
            "replicaCount": availability.replicas(),
            "availability": availability.to_string(),
            "nodeSelector": spec.node_selector.clone().unwrap_or_default(),
            "tolerations": spec.tolerations.clone().unwrap_or_default(),
            "proxyConfigs": proxy,
            "ocpVersion": inputs.platform_version.unwrap_or_default(),
            "clusterIngressDomain": inputs.ingress_domain.unwrap_or_default(),
            "clusterApiUrl": inputs.api_url.unwrap_or_default(),
            "hubType": hub_type,
        },
        "org": "open-cluster-management",
    })
}

/// Turns charts and CRD directories into objects
#[cfg_attr(test, automock)]
pub trait Renderer: Send + Sync {
    /// Render every template of a chart
    fn render_chart(&self, request: &RenderRequest) -> RenderOutput;

    /// Read every CRD manifest in a directory
    fn render_crds(&self, dir: &Path) -> RenderOutput;
}

/// minijinja-backed renderer over chart directories on disk
pub struct ChartRenderer {
    env: Environment<'static>,
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRenderer {
    /// Create a renderer with lenient undefined handling
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        Self { env }
    }

    fn render_file(&self, path: &Path, values: &Value) -> Result<Vec<DynamicObject>> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::render(format!("{}: {e}", path.display())))?;
        let rendered = self
            .env
            .render_str(&source, values)
            .map_err(|e| Error::render(format!("{}: {e}", path.display())))?;
        parse_documents(&rendered)
            .map_err(|e| Error::render(format!("{}: {e}", path.display())))
    }
}

impl Renderer for ChartRenderer {
    fn render_chart(&self, request: &RenderRequest) -> RenderOutput {
        let dir = request.chart.join("templates");
        let mut out = RenderOutput::default();
        let files = match yaml_files(&dir) {
            Ok(files) => files,
            Err(e) => {
                out.errors.push(e.to_string());
                return out;
            }
        };
        for file in files {
            match self.render_file(&file, &request.values) {
                Ok(objects) => out.objects.extend(objects),
                Err(e) => out.errors.push(e.to_string()),
            }
        }
        out
    }

    fn render_crds(&self, dir: &Path) -> RenderOutput {
        let mut out = RenderOutput::default();
        let files = match yaml_files(dir) {
            Ok(files) => files,
            Err(e) => {
                out.errors.push(e.to_string());
                return out;
            }
        };
        for file in files {
            let parsed = std::fs::read_to_string(&file)
                .map_err(|e| e.to_string())
                .and_then(|s| parse_documents(&s).map_err(|e| e.to_string()));
            match parsed {
                Ok(objects) => out.objects.extend(objects),
                Err(e) => out.errors.push(format!("{}: {e}", file.display())),
            }
        }
        out
    }
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::render(format!("{}: {e}", dir.display())))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Split a multi-document YAML string into objects, skipping empty documents
pub fn parse_documents(source: &str) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(source) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| Error::serialization(e.to_string()))?;
        if value.is_null() {
            continue;
        }
        let json = serde_json::to_value(&value)?;
        if json.get("kind").is_none() {
            return Err(Error::serialization("manifest is missing kind"));
        }
        objects.push(serde_json::from_value(json)?);
    }
    Ok(objects)
}

/// Stamp the release-version annotation on an object
pub fn stamp_release(obj: &mut DynamicObject, version: &str) {
    obj.annotations_mut()
        .insert(ANNOTATION_RELEASE_VERSION.to_string(), version.to_string());
}

/// Kind of a dynamic object, or empty
pub fn kind_of(obj: &DynamicObject) -> &str {
    obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("")
}

/// Outcome of a single apply
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// The object did not exist before
    pub created: bool,
    /// The existing object carried a different release version
    pub drifted: bool,
}

/// Writes rendered objects to the cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Applier: Send + Sync {
    /// Create or update an object
    async fn apply(&self, obj: &DynamicObject) -> Result<ApplyOutcome>;

    /// Delete an object; absence counts as success
    async fn delete(&self, obj: &DynamicObject) -> Result<()>;
}

/// Server-side apply against the API server
pub struct KubeApplier {
    client: Client,
}

impl KubeApplier {
    /// Create an applier over `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, obj: &DynamicObject) -> Result<Api<DynamicObject>> {
        let types = obj.types.as_ref().ok_or_else(|| {
            Error::serialization(format!("object {} has no apiVersion/kind", obj.name_any()))
        })?;
        let (resource, namespaced) = match Gvk::lookup(&types.api_version, &types.kind) {
            Some(gvk) => (gvk.api_resource(), gvk.namespaced),
            None => {
                let (group, version) = match types.api_version.split_once('/') {
                    Some((g, v)) => (g.to_string(), v.to_string()),
                    None => (String::new(), types.api_version.clone()),
                };
                let gvk = GroupVersionKind::gvk(&group, &version, &types.kind);
                (ApiResource::from_gvk(&gvk), obj.metadata.namespace.is_some())
            }
        };
        Ok(match (namespaced, obj.metadata.namespace.as_deref()) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        })
    }
}

/// Storage class requested by a volume-bearing object, if any
pub fn storage_class(obj: &DynamicObject) -> Option<Vec<String>> {
    match kind_of(obj) {
        "PersistentVolumeClaim" => Some(
            obj.data
                .pointer("/spec/storageClassName")
                .and_then(Value::as_str)
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
        ),
        "StatefulSet" => Some(
            obj.data
                .pointer("/spec/volumeClaimTemplates")
                .and_then(Value::as_array)
                .map(|templates| {
                    templates
                        .iter()
                        .filter_map(|t| t.pointer("/spec/storageClassName"))
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

/// True if applying `desired` over `existing` would change a storage class
pub fn storage_class_changed(existing: &DynamicObject, desired: &DynamicObject) -> bool {
    match (storage_class(existing), storage_class(desired)) {
        (Some(current), Some(wanted)) => !wanted.is_empty() && current != wanted,
        _ => false,
    }
}

#[async_trait]
impl Applier for KubeApplier {
    async fn apply(&self, obj: &DynamicObject) -> Result<ApplyOutcome> {
        let api = self.api_for(obj)?;
        let name = obj.name_any();
        let kind = kind_of(obj).to_string();
        let mut outcome = ApplyOutcome::default();

        match api.get_opt(&name).await? {
            None => outcome.created = true,
            Some(existing) => {
                if existing
                    .annotations()
                    .get(ANNOTATION_EDITABLE)
                    .is_some_and(|v| v == "true")
                {
                    debug!(kind = %kind, name = %name, "object is marked editable, leaving it alone");
                    return Ok(outcome);
                }
                if storage_class_changed(&existing, obj) {
                    warn!(
                        kind = %kind,
                        name = %name,
                        "storage class cannot change in place; delete and recreate the object to apply it"
                    );
                    return Ok(outcome);
                }
                outcome.drifted = existing.annotations().get(ANNOTATION_RELEASE_VERSION)
                    != obj.annotations().get(ANNOTATION_RELEASE_VERSION);
            }
        }

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(obj))
            .await
            .map_err(|e| Error::apply(&kind, &name, e.to_string()))?;
        debug!(kind = %kind, name = %name, created = outcome.created, "applied object");
        Ok(outcome)
    }

    async fn delete(&self, obj: &DynamicObject) -> Result<()> {
        let api = self.api_for(obj)?;
        match api.delete(&obj.name_any(), &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
