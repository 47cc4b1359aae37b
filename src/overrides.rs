//! Image and template override resolution
//!
//! Images come from the operator environment first, then the hub's
//! image-repository annotation rewrites every repository, and finally a
//! configmap named by annotation replaces individual entries. Template overrides
//! come from the environment, with the configmap filling in keys the
//! environment left unset.
//!
//! The functions here are pure; the reconciler fetches configmaps and passes
//! them in.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::config::OperatorConfig;
use crate::crd::MultiClusterHub;
use crate::{
    Error, Result, ANNOTATION_IMAGE_OVERRIDES_CM, ANNOTATION_IMAGE_REPOSITORY,
    ANNOTATION_TEMPLATE_OVERRIDES_CM,
};

/// Deprecated spelling of the image repository annotation
const LEGACY_IMAGE_REPOSITORY: &str = "mch-imageRepository";
/// Deprecated spelling of the image overrides configmap annotation
const LEGACY_IMAGE_OVERRIDES_CM: &str = "mch-imageOverridesCM";

/// One entry of an image manifest configmap
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ManifestImage {
    /// Key the charts reference
    #[serde(rename = "image-key", default)]
    pub key: String,
    /// Image name without repository
    #[serde(rename = "image-name", default)]
    pub name: String,
    /// Repository
    #[serde(rename = "image-remote", default)]
    pub remote: String,
    /// Digest; preferred over the tag
    #[serde(rename = "image-digest", default)]
    pub digest: String,
    /// Tag
    #[serde(rename = "image-tag", default)]
    pub tag: String,
}

impl ManifestImage {
    /// Full image reference
    pub fn reference(&self) -> Result<String> {
        if self.key.is_empty() {
            return Err(Error::config(format!(
                "image manifest entry {} is missing image-key",
                self.name
            )));
        }
        if !self.digest.is_empty() {
            Ok(format!("{}/{}@{}", self.remote, self.name, self.digest))
        } else if !self.tag.is_empty() {
            Ok(format!("{}/{}:{}", self.remote, self.name, self.tag))
        } else {
            Err(Error::config(format!(
                "image manifest entry {} has neither digest nor tag",
                self.key
            )))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestTemplate {
    #[serde(default)]
    template_overrides: BTreeMap<String, Value>,
}

/// Image repository requested by the hub, honouring the deprecated annotation
pub fn image_repository(hub: &MultiClusterHub) -> Option<String> {
    annotation(hub, ANNOTATION_IMAGE_REPOSITORY, LEGACY_IMAGE_REPOSITORY)
}

/// Name of the image overrides configmap, if the hub names one
pub fn image_overrides_configmap(hub: &MultiClusterHub) -> Option<String> {
    annotation(hub, ANNOTATION_IMAGE_OVERRIDES_CM, LEGACY_IMAGE_OVERRIDES_CM)
}

/// Name of the template overrides configmap, if the hub names one
pub fn template_overrides_configmap(hub: &MultiClusterHub) -> Option<String> {
    hub.annotations()
        .get(ANNOTATION_TEMPLATE_OVERRIDES_CM)
        .filter(|v| !v.is_empty())
        .cloned()
}

fn annotation(hub: &MultiClusterHub, key: &str, legacy: &str) -> Option<String> {
    let annotations = hub.annotations();
    annotations
        .get(key)
        .or_else(|| annotations.get(legacy))
        .filter(|v| !v.is_empty())
        .cloned()
}

/// Point every image at `repository`, keeping the final path segment
pub fn rewrite_repository(
    images: &BTreeMap<String, String>,
    repository: &str,
) -> BTreeMap<String, String> {
    let repository = repository.trim_end_matches('/');
    images
        .iter()
        .map(|(k, image)| {
            let tail = image.rsplit('/').next().unwrap_or(image);
            (k.clone(), format!("{repository}/{tail}"))
        })
        .collect()
}

fn single_value<'a>(cm: &'a ConfigMap) -> Result<&'a str> {
    let data = cm.data.as_ref();
    let count = data.map(|d| d.len()).unwrap_or(0);
    match data.and_then(|d| d.values().next()) {
        Some(v) if count == 1 => Ok(v.as_str()),
        _ => Err(Error::config(format!(
            "unexpected number of keys in ConfigMap {}: expected 1 key, found {count} keys",
            cm.name_any()
        ))),
    }
}

/// Overlay image entries from a manifest configmap
pub fn apply_image_configmap(
    mut images: BTreeMap<String, String>,
    cm: &ConfigMap,
) -> Result<BTreeMap<String, String>> {
    let manifest: Vec<ManifestImage> = serde_json::from_str(single_value(cm)?)?;
    for entry in &manifest {
        images.insert(entry.key.clone(), entry.reference()?);
    }
    Ok(images)
}

/// Fill template keys the environment did not set from a configmap
pub fn apply_template_configmap(
    mut templates: BTreeMap<String, String>,
    cm: &ConfigMap,
) -> Result<BTreeMap<String, String>> {
    let manifest: ManifestTemplate = serde_json::from_str(single_value(cm)?)?;
    for (key, value) in manifest.template_overrides {
        if templates.get(&key).is_some_and(|v| !v.is_empty()) {
            continue;
        }
        let value = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => {
                return Err(Error::config(format!(
                    "template override {key} has unsupported value {other}"
                )))
            }
        };
        templates.insert(key, value);
    }
    Ok(templates)
}

/// Resolve image overrides for a pass
///
/// An empty result is an error: nothing can render without images.
pub fn resolve_images(
    config: &OperatorConfig,
    hub: &MultiClusterHub,
    configmap: Option<&ConfigMap>,
) -> Result<BTreeMap<String, String>> {
    let mut images = config.image_manifest.clone();
    if let Some(repository) = image_repository(hub).or_else(|| config.image_repository.clone()) {
        info!(repository = %repository, "overriding image repository");
        images = rewrite_repository(&images, &repository);
    }
    if let Some(cm) = configmap {
        info!(configmap = %cm.name_any(), "overriding images from configmap");
        images = apply_image_configmap(images, cm)?;
    }
    if images.is_empty() {
        return Err(Error::config(
            "no image overrides found in the environment or configmap",
        ));
    }
    Ok(images)
}

/// Resolve template overrides for a pass
pub fn resolve_templates(
    config: &OperatorConfig,
    configmap: Option<&ConfigMap>,
) -> Result<BTreeMap<String, String>> {
    let templates = config.template_overrides.clone();
    match configmap {
        Some(cm) => {
            info!(configmap = %cm.name_any(), "overriding templates from configmap");
            apply_template_configmap(templates, cm)
        }
        None => Ok(templates),
    }
}
