//! Environment-driven operator configuration
//!
//! Everything the operator learns from its own Deployment is read once at
//! startup into [`OperatorConfig`] and passed down through the controller
//! context. Nothing below the binary reads the process environment directly.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::info;

use crate::Error;

/// Env var selecting the packaged distribution
pub const ENV_OPERATOR_PACKAGE: &str = "OPERATOR_PACKAGE";

/// Prefixes of env vars that carry image manifest entries
pub const IMAGE_ENV_PREFIXES: &[&str] = &["OPERAND_IMAGE_", "RELATED_IMAGE_"];

/// Prefix of env vars that carry template override entries
pub const TEMPLATE_ENV_PREFIX: &str = "TEMPLATE_OVERRIDE_";

const COMMERCIAL_PACKAGE: &str = "advanced-cluster-management";
const COMMUNITY_PACKAGE: &str = "stolostron";

/// Which distribution the operator was packaged as
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PackageMode {
    /// Product build
    #[default]
    Commercial,
    /// Upstream community build
    Community,
}

/// Proxy settings inherited from the operator's own environment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxySettings {
    /// HTTP_PROXY
    pub http_proxy: Option<String>,
    /// HTTPS_PROXY
    pub https_proxy: Option<String>,
    /// NO_PROXY
    pub no_proxy: Option<String>,
}

impl ProxySettings {
    /// True if any proxy variable is set
    pub fn is_set(&self) -> bool {
        self.http_proxy.is_some() || self.https_proxy.is_some() || self.no_proxy.is_some()
    }

    /// Proxy settings as container env entries
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        if let Some(v) = &self.http_proxy {
            out.push(("HTTP_PROXY", v.clone()));
        }
        if let Some(v) = &self.https_proxy {
            out.push(("HTTPS_PROXY", v.clone()));
        }
        if let Some(v) = &self.no_proxy {
            out.push(("NO_PROXY", v.clone()));
        }
        out
    }
}

/// Operator configuration captured at startup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Raw package selector; validated on use so a bad value surfaces on every pass
    pub package: String,
    /// Directory holding CRD manifests
    pub crds_path: PathBuf,
    /// Directory holding component charts
    pub templates_path: PathBuf,
    /// Version this operator installs
    pub version: String,
    /// Namespace the operator runs in
    pub operator_namespace: String,
    /// Proxy variables
    pub proxy: ProxySettings,
    /// Cached host platform version, if already known
    pub cluster_version: Option<String>,
    /// Image repository override
    pub image_repository: Option<String>,
    /// Name of the trust bundle configmap
    pub trusted_ca_bundle: String,
    /// Storage class the applier expects on volume-bearing objects
    pub default_storage_class: Option<String>,
    /// Image manifest entries keyed by lowercased image key
    pub image_manifest: BTreeMap<String, String>,
    /// Template override entries keyed by lowercased override key
    pub template_overrides: BTreeMap<String, String>,
    /// OperatorCondition receiving the upgradeable signal
    pub operator_condition: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            package: String::new(),
            crds_path: PathBuf::from("bin/crds"),
            templates_path: PathBuf::from("bin/charts"),
            version: env!("CARGO_PKG_VERSION").to_string(),
            operator_namespace: "open-cluster-management".to_string(),
            proxy: ProxySettings::default(),
            cluster_version: None,
            image_repository: None,
            trusted_ca_bundle: "trusted-ca-bundle".to_string(),
            default_storage_class: None,
            image_manifest: BTreeMap::new(),
            template_overrides: BTreeMap::new(),
            operator_condition: None,
        }
    }
}

impl OperatorConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cfg = Self::default();
        for (key, value) in vars {
            let non_empty = (!value.is_empty()).then(|| value.clone());
            match key.as_str() {
                ENV_OPERATOR_PACKAGE => cfg.package = value,
                "CRDS_PATH" if !value.is_empty() => cfg.crds_path = PathBuf::from(value),
                "TEMPLATES_PATH" if !value.is_empty() => cfg.templates_path = PathBuf::from(value),
                "OPERATOR_VERSION" if !value.is_empty() => cfg.version = value,
                "POD_NAMESPACE" if !value.is_empty() => cfg.operator_namespace = value,
                "HTTP_PROXY" => cfg.proxy.http_proxy = non_empty,
                "HTTPS_PROXY" => cfg.proxy.https_proxy = non_empty,
                "NO_PROXY" => cfg.proxy.no_proxy = non_empty,
                "ACM_HUB_OCP_VERSION" => cfg.cluster_version = non_empty,
                "IMAGE_REPOSITORY" => cfg.image_repository = non_empty,
                "TRUSTED_CA_BUNDLE" if !value.is_empty() => cfg.trusted_ca_bundle = value,
                "DEFAULT_STORAGE_CLASS" => cfg.default_storage_class = non_empty,
                "OPERATOR_CONDITION_NAME" => cfg.operator_condition = non_empty,
                _ => {
                    if let Some(image_key) = IMAGE_ENV_PREFIXES
                        .iter()
                        .find_map(|p| key.strip_prefix(p))
                    {
                        cfg.image_manifest.insert(image_key.to_lowercase(), value);
                    } else if let Some(t) = key.strip_prefix(TEMPLATE_ENV_PREFIX) {
                        cfg.template_overrides.insert(t.to_lowercase(), value);
                    }
                }
            }
        }
        cfg
    }

    /// Resolve the package mode, rejecting unknown values
    pub fn package_mode(&self) -> Result<PackageMode, Error> {
        match self.package.as_str() {
            "" | COMMERCIAL_PACKAGE => Ok(PackageMode::Commercial),
            COMMUNITY_PACKAGE => Ok(PackageMode::Community),
            other => Err(Error::config(format!(
                "{ENV_OPERATOR_PACKAGE} has illegal value \"{other}\""
            ))),
        }
    }

    /// Log proxy settings once at startup
    pub fn log_proxy(&self) {
        if self.proxy.is_set() {
            info!(
                http_proxy = self.proxy.http_proxy.as_deref().unwrap_or(""),
                https_proxy = self.proxy.https_proxy.as_deref().unwrap_or(""),
                no_proxy = self.proxy.no_proxy.as_deref().unwrap_or(""),
                "proxy configuration detected"
            );
        }
    }
}
