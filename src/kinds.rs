//! Group/version/kind table for resources handled as dynamic objects
//!
//! Most of what the operator touches belongs to other controllers (OLM, the
//! platform config operators, the engine). Those kinds are addressed through
//! [`Gvk`] constants rather than generated types.

use kube::api::DynamicObject;
use kube::core::ApiResource;

/// A resource kind the operator reads or writes dynamically
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gvk {
    /// API group; empty for the core group
    pub group: &'static str,
    /// API version
    pub version: &'static str,
    /// Kind
    pub kind: &'static str,
    /// Plural resource name
    pub plural: &'static str,
    /// Whether objects live in a namespace
    pub namespaced: bool,
}

impl Gvk {
    const fn new(
        group: &'static str,
        version: &'static str,
        kind: &'static str,
        plural: &'static str,
        namespaced: bool,
    ) -> Self {
        Self {
            group,
            version,
            kind,
            plural,
            namespaced,
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.to_string()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// ApiResource for building dynamic APIs
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.to_string(),
            version: self.version.to_string(),
            api_version: self.api_version(),
            kind: self.kind.to_string(),
            plural: self.plural.to_string(),
        }
    }

    /// Empty object of this kind with name and (for namespaced kinds) namespace set
    pub fn object(&self, name: &str, namespace: Option<&str>) -> DynamicObject {
        let obj = DynamicObject::new(name, &self.api_resource());
        match (self.namespaced, namespace) {
            (true, Some(ns)) => obj.within(ns),
            _ => obj,
        }
    }

    /// Look up a known kind by apiVersion and kind
    pub fn lookup(api_version: &str, kind: &str) -> Option<Gvk> {
        ALL.iter()
            .find(|g| g.kind == kind && g.api_version() == api_version)
            .copied()
    }
}

/// Address of a single object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Namespace; `None` for cluster-scoped objects
    pub namespace: Option<String>,
    /// Name
    pub name: String,
}

impl ObjectKey {
    /// Key for a cluster-scoped object
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key for a namespaced object
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Key of an existing dynamic object
    pub fn of(obj: &DynamicObject) -> Self {
        Self {
            namespace: obj.metadata.namespace.clone(),
            name: obj.metadata.name.clone().unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

// Core and platform

/// Namespace
pub const NAMESPACE: Gvk = Gvk::new("", "v1", "Namespace", "namespaces", false);
/// ConfigMap
pub const CONFIG_MAP: Gvk = Gvk::new("", "v1", "ConfigMap", "configmaps", true);
/// Secret
pub const SECRET: Gvk = Gvk::new("", "v1", "Secret", "secrets", true);
/// Service
pub const SERVICE: Gvk = Gvk::new("", "v1", "Service", "services", true);
/// Deployment
pub const DEPLOYMENT: Gvk = Gvk::new("apps", "v1", "Deployment", "deployments", true);
/// StatefulSet
pub const STATEFUL_SET: Gvk = Gvk::new("apps", "v1", "StatefulSet", "statefulsets", true);
/// PersistentVolumeClaim
pub const PVC: Gvk = Gvk::new(
    "",
    "v1",
    "PersistentVolumeClaim",
    "persistentvolumeclaims",
    true,
);
/// ClusterRole
pub const CLUSTER_ROLE: Gvk = Gvk::new(
    "rbac.authorization.k8s.io",
    "v1",
    "ClusterRole",
    "clusterroles",
    false,
);
/// ClusterRoleBinding
pub const CLUSTER_ROLE_BINDING: Gvk = Gvk::new(
    "rbac.authorization.k8s.io",
    "v1",
    "ClusterRoleBinding",
    "clusterrolebindings",
    false,
);
/// CustomResourceDefinition
pub const CRD: Gvk = Gvk::new(
    "apiextensions.k8s.io",
    "v1",
    "CustomResourceDefinition",
    "customresourcedefinitions",
    false,
);
/// Prometheus operator ServiceMonitor
pub const SERVICE_MONITOR: Gvk = Gvk::new(
    "monitoring.coreos.com",
    "v1",
    "ServiceMonitor",
    "servicemonitors",
    true,
);

/// Platform console operator config
pub const CONSOLE_OPERATOR: Gvk =
    Gvk::new("operator.openshift.io", "v1", "Console", "consoles", false);
/// Platform authentication config
pub const AUTHENTICATION: Gvk = Gvk::new(
    "config.openshift.io",
    "v1",
    "Authentication",
    "authentications",
    false,
);
/// Platform cloud credential operator config
pub const CLOUD_CREDENTIAL: Gvk = Gvk::new(
    "operator.openshift.io",
    "v1",
    "CloudCredential",
    "cloudcredentials",
    false,
);
/// Platform infrastructure config
pub const INFRASTRUCTURE: Gvk = Gvk::new(
    "config.openshift.io",
    "v1",
    "Infrastructure",
    "infrastructures",
    false,
);
/// Platform ingress config
pub const INGRESS_CONFIG: Gvk = Gvk::new("config.openshift.io", "v1", "Ingress", "ingresses", false);
/// Platform version record
pub const CLUSTER_VERSION: Gvk = Gvk::new(
    "config.openshift.io",
    "v1",
    "ClusterVersion",
    "clusterversions",
    false,
);

// OLM

/// OLM Subscription
pub const OLM_SUBSCRIPTION: Gvk = Gvk::new(
    "operators.coreos.com",
    "v1alpha1",
    "Subscription",
    "subscriptions",
    true,
);
/// OLM ClusterServiceVersion
pub const CSV: Gvk = Gvk::new(
    "operators.coreos.com",
    "v1alpha1",
    "ClusterServiceVersion",
    "clusterserviceversions",
    true,
);
/// OLM OperatorGroup
pub const OPERATOR_GROUP: Gvk = Gvk::new(
    "operators.coreos.com",
    "v1",
    "OperatorGroup",
    "operatorgroups",
    true,
);
/// OLM OperatorCondition
pub const OPERATOR_CONDITION: Gvk = Gvk::new(
    "operators.coreos.com",
    "v2",
    "OperatorCondition",
    "operatorconditions",
    true,
);

// Hub ecosystem

/// Marker resource
pub const INTERNAL_HUB_COMPONENT: Gvk = Gvk::new(
    crate::API_GROUP,
    "v1",
    "InternalHubComponent",
    "internalhubcomponents",
    true,
);
/// Multicluster engine
pub const MULTICLUSTER_ENGINE: Gvk = Gvk::new(
    "multicluster.openshift.io",
    "v1",
    "MultiClusterEngine",
    "multiclusterengines",
    false,
);
/// Managed cluster membership record
pub const MANAGED_CLUSTER: Gvk = Gvk::new(
    "cluster.open-cluster-management.io",
    "v1",
    "ManagedCluster",
    "managedclusters",
    false,
);
/// Cluster-wide observability config
pub const MULTICLUSTER_OBSERVABILITY: Gvk = Gvk::new(
    "observability.open-cluster-management.io",
    "v1beta2",
    "MultiClusterObservability",
    "multiclusterobservabilities",
    false,
);
/// Cluster discovery config
pub const DISCOVERY_CONFIG: Gvk = Gvk::new(
    "discovery.open-cluster-management.io",
    "v1",
    "DiscoveryConfig",
    "discoveryconfigs",
    true,
);
/// Agent-based install config
pub const AGENT_SERVICE_CONFIG: Gvk = Gvk::new(
    "agent-install.openshift.io",
    "v1beta1",
    "AgentServiceConfig",
    "agentserviceconfigs",
    false,
);
/// Application subscription
pub const APP_SUBSCRIPTION: Gvk = Gvk::new(
    "apps.open-cluster-management.io",
    "v1",
    "Subscription",
    "subscriptions",
    true,
);
/// Application channel
pub const APP_CHANNEL: Gvk = Gvk::new(
    "apps.open-cluster-management.io",
    "v1",
    "Channel",
    "channels",
    true,
);
/// Helm release created by an application subscription
pub const HELM_RELEASE: Gvk = Gvk::new(
    "apps.open-cluster-management.io",
    "v1",
    "HelmRelease",
    "helmreleases",
    true,
);
/// Search status resource
pub const SEARCH: Gvk = Gvk::new(
    "search.open-cluster-management.io",
    "v1alpha1",
    "Search",
    "searches",
    true,
);
/// Addon registration
pub const CLUSTER_MANAGEMENT_ADDON: Gvk = Gvk::new(
    "addon.open-cluster-management.io",
    "v1alpha1",
    "ClusterManagementAddOn",
    "clustermanagementaddons",
    false,
);

const ALL: &[Gvk] = &[
    NAMESPACE,
    CONFIG_MAP,
    SECRET,
    SERVICE,
    DEPLOYMENT,
    STATEFUL_SET,
    PVC,
    CLUSTER_ROLE,
    CLUSTER_ROLE_BINDING,
    CRD,
    SERVICE_MONITOR,
    CONSOLE_OPERATOR,
    AUTHENTICATION,
    CLOUD_CREDENTIAL,
    INFRASTRUCTURE,
    INGRESS_CONFIG,
    CLUSTER_VERSION,
    OLM_SUBSCRIPTION,
    CSV,
    OPERATOR_GROUP,
    OPERATOR_CONDITION,
    INTERNAL_HUB_COMPONENT,
    MULTICLUSTER_ENGINE,
    MANAGED_CLUSTER,
    MULTICLUSTER_OBSERVABILITY,
    DISCOVERY_CONFIG,
    AGENT_SERVICE_CONFIG,
    APP_SUBSCRIPTION,
    APP_CHANNEL,
    HELM_RELEASE,
    SEARCH,
    CLUSTER_MANAGEMENT_ADDON,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_group_api_version_has_no_slash() {
        assert_eq!(NAMESPACE.api_version(), "v1");
        assert_eq!(CSV.api_version(), "operators.coreos.com/v1alpha1");
    }

    #[test]
    fn object_only_sets_namespace_for_namespaced_kinds() {
        let ns = CONFIG_MAP.object("trusted-ca-bundle", Some("hub"));
        assert_eq!(ns.metadata.namespace.as_deref(), Some("hub"));
        let cluster = CLUSTER_ROLE.object("x", Some("hub"));
        assert!(cluster.metadata.namespace.is_none());
        assert_eq!(
            cluster.types.as_ref().map(|t| t.kind.as_str()),
            Some("ClusterRole")
        );
    }

    /// Story: two kinds named Subscription are told apart by group
    #[test]
    fn story_lookup_distinguishes_same_kind_in_different_groups() {
        assert_eq!(
            Gvk::lookup("operators.coreos.com/v1alpha1", "Subscription"),
            Some(OLM_SUBSCRIPTION)
        );
        assert_eq!(
            Gvk::lookup("apps.open-cluster-management.io/v1", "Subscription"),
            Some(APP_SUBSCRIPTION)
        );
        assert_eq!(Gvk::lookup("v1", "Pod"), None);
    }

    #[test]
    fn object_key_display() {
        assert_eq!(ObjectKey::namespaced("a", "b").to_string(), "a/b");
        assert_eq!(ObjectKey::cluster("c").to_string(), "c");
    }
}
