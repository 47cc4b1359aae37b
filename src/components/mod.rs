//! Static component registry
//!
//! Every component the hub can install is described once here: where its chart
//! lives, whether it is on by default, which deployments report its health and
//! which side effects run around install and uninstall. The reconciler looks
//! components up in this table instead of branching on names.

use crate::config::PackageMode;
use crate::BACKUP_NAMESPACE;

/// Application lifecycle (subscriptions, channels)
pub const APP_LIFECYCLE: &str = "app-lifecycle";
/// Cluster backup and restore
pub const CLUSTER_BACKUP: &str = "cluster-backup";
/// Cluster lifecycle addons
pub const CLUSTER_LIFECYCLE: &str = "cluster-lifecycle";
/// Cluster permission controller
pub const CLUSTER_PERMISSION: &str = "cluster-permission";
/// Console plugin
pub const CONSOLE: &str = "console";
/// Edge device manager (preview)
pub const EDGE_MANAGER_PREVIEW: &str = "edge-manager-preview";
/// Fine-grained RBAC
pub const FINE_GRAINED_RBAC: &str = "fine-grained-rbac";
/// Fine-grained RBAC preview name, migrated on defaulting
pub const FINE_GRAINED_RBAC_PREVIEW: &str = "fine-grained-rbac-preview";
/// Governance, risk and compliance
pub const GRC: &str = "grc";
/// Insights
pub const INSIGHTS: &str = "insights";
/// Multicluster observability operator
pub const MULTICLUSTER_OBSERVABILITY: &str = "multicluster-observability";
/// Virtualization migration integrations
pub const MTV_INTEGRATIONS: &str = "mtv-integrations";
/// Virtualization migration integrations preview name
pub const MTV_INTEGRATIONS_PREVIEW: &str = "mtv-integrations-preview";
/// Search
pub const SEARCH: &str = "search";
/// Search, community build
pub const SEARCH_COMMUNITY: &str = "search-community";
/// Site configuration
pub const SITECONFIG: &str = "siteconfig";
/// Site configuration preview name
pub const SITECONFIG_PREVIEW: &str = "siteconfig-preview";
/// Submariner addon
pub const SUBMARINER_ADDON: &str = "submariner-addon";
/// Volume replication addon
pub const VOLSYNC: &str = "volsync";
/// The hub itself; bookkeeping only
pub const MULTICLUSTERHUB: &str = "multiclusterhub";
/// The sibling engine; bookkeeping only, managed separately
pub const MULTICLUSTER_ENGINE: &str = "multicluster-engine";

/// Names removed in earlier releases; pruned from existing hubs
pub const RETIRED: &[&str] = &["management-ingress", "multiclusterhub-repo"];

/// Preview names and the GA names they migrate to
pub const PREVIEW_MIGRATIONS: &[(&str, &str)] = &[
    (FINE_GRAINED_RBAC_PREVIEW, FINE_GRAINED_RBAC),
    (MTV_INTEGRATIONS_PREVIEW, MTV_INTEGRATIONS),
    (SITECONFIG_PREVIEW, SITECONFIG),
];

/// Components that install the same workloads under different charts
///
/// At most one of a pair is wanted at a time, and removing the unwanted one
/// must not touch what the other owns.
const VARIANTS: &[(&str, &str)] = &[(SEARCH, SEARCH_COMMUNITY)];

/// The other member of a variant pair, if `name` belongs to one
pub fn variant_of(name: &str) -> Option<&'static str> {
    VARIANTS.iter().find_map(|(a, b)| match name {
        n if n == *a => Some(*b),
        n if n == *b => Some(*a),
        _ => None,
    })
}

/// Status keys fed by the engine's OLM and custom resources
pub const ENGINE_SUBSCRIPTION_KEY: &str = "multicluster-engine-sub";
/// Status key for the engine ClusterServiceVersion
pub const ENGINE_CSV_KEY: &str = "multicluster-engine-csv";
/// Status key for the engine resource
pub const ENGINE_KEY: &str = "multicluster-engine";

/// Side effect attached to a component
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    /// Register a plugin on the platform console config after install,
    /// deregister before uninstall
    ConsolePlugin(&'static str),
    /// Create the search status resource after install, delete before uninstall
    SearchStatus,
    /// Remove a ClusterManagementAddOn before uninstall
    AddonRegistration(&'static str),
    /// Ensure a dedicated namespace (with pull secret) before install, remove
    /// it after uninstall
    DedicatedNamespace(&'static str),
}

impl Hook {
    /// True if the hook must run before rendered objects are applied
    pub fn runs_before_install(&self) -> bool {
        matches!(self, Hook::DedicatedNamespace(_))
    }
}

/// One registry entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentDescriptor {
    /// Component name as used in `spec.overrides.components`
    pub name: &'static str,
    /// Chart directory under the templates path; `None` for bookkeeping entries
    pub chart: Option<&'static str>,
    /// Enabled when a hub does not say otherwise
    pub default_enabled: bool,
    /// Deployments whose health makes up the component's status
    pub deployments: &'static [&'static str],
    /// Namespace the component runs in, if not the hub namespace
    pub namespace: Option<&'static str>,
    /// Side effects around install and uninstall
    pub hooks: &'static [Hook],
    /// Only installable when the platform console is present
    pub requires_console: bool,
}

impl ComponentDescriptor {
    const fn chart(
        name: &'static str,
        chart: &'static str,
        default_enabled: bool,
        deployments: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            chart: Some(chart),
            default_enabled,
            deployments,
            namespace: None,
            hooks: &[],
            requires_console: false,
        }
    }

    const fn bookkeeping(name: &'static str, default_enabled: bool) -> Self {
        Self {
            name,
            chart: None,
            default_enabled,
            deployments: &[],
            namespace: None,
            hooks: &[],
            requires_console: false,
        }
    }

    const fn with_hooks(mut self, hooks: &'static [Hook]) -> Self {
        self.hooks = hooks;
        self
    }

    const fn in_namespace(mut self, namespace: &'static str) -> Self {
        self.namespace = Some(namespace);
        self
    }

    const fn needs_console(mut self) -> Self {
        self.requires_console = true;
        self
    }

    /// True for entries that exist only for validation and cleanup
    pub fn is_bookkeeping(&self) -> bool {
        self.chart.is_none()
    }
}

const SEARCH_DEPLOYMENTS: &[&str] = &["search-v2-operator-controller-manager"];

const STANDARD: &[ComponentDescriptor] = &[
    ComponentDescriptor::chart(
        APP_LIFECYCLE,
        "multicloud-operators-subscription",
        true,
        &[
            "multicluster-operators-application",
            "multicluster-operators-channel",
            "multicluster-operators-hub-subscription",
            "multicluster-operators-standalone-subscription",
            "multicluster-operators-subscription-report",
        ],
    ),
    ComponentDescriptor::chart(
        CLUSTER_BACKUP,
        "cluster-backup",
        false,
        &["cluster-backup-chart-clusterbackup"],
    )
    .in_namespace(BACKUP_NAMESPACE)
    .with_hooks(&[Hook::DedicatedNamespace(BACKUP_NAMESPACE)]),
    ComponentDescriptor::chart(
        CLUSTER_LIFECYCLE,
        "cluster-lifecycle",
        true,
        &["cluster-curator-controller", "klusterlet-addon-controller-v2"],
    ),
    ComponentDescriptor::chart(
        CLUSTER_PERMISSION,
        "cluster-permission",
        true,
        &["cluster-permission"],
    ),
    ComponentDescriptor::chart(CONSOLE, "console", true, &["console-chart-console-v2"])
        .with_hooks(&[Hook::ConsolePlugin("acm")])
        .needs_console(),
    ComponentDescriptor::chart(
        EDGE_MANAGER_PREVIEW,
        "flight-control",
        false,
        &["flightctl-api", "flightctl-worker"],
    ),
    ComponentDescriptor::chart(
        FINE_GRAINED_RBAC,
        "fine-grained-rbac",
        false,
        &["mcra-controller"],
    ),
    ComponentDescriptor::chart(
        GRC,
        "grc",
        true,
        &["grc-policy-addon-controller", "grc-policy-propagator"],
    ),
    ComponentDescriptor::chart(
        INSIGHTS,
        "insights",
        true,
        &["insights-client", "insights-metrics"],
    ),
    ComponentDescriptor::chart(
        MULTICLUSTER_OBSERVABILITY,
        "multicluster-observability-operator",
        false,
        &["multicluster-observability-operator"],
    ),
    ComponentDescriptor::chart(
        MTV_INTEGRATIONS,
        "mtv-integrations",
        false,
        &["mtv-integrations-controller"],
    ),
    ComponentDescriptor::chart(SEARCH, "search-v2-operator", true, SEARCH_DEPLOYMENTS)
        .with_hooks(&[Hook::SearchStatus]),
    ComponentDescriptor::chart(
        SEARCH_COMMUNITY,
        "search-v2-operator-community",
        false,
        SEARCH_DEPLOYMENTS,
    )
    .with_hooks(&[Hook::SearchStatus]),
    ComponentDescriptor::chart(
        SITECONFIG,
        "siteconfig-operator",
        false,
        &["siteconfig-controller-manager"],
    ),
    ComponentDescriptor::chart(
        SUBMARINER_ADDON,
        "submariner-addon",
        false,
        &["submariner-addon"],
    )
    .with_hooks(&[Hook::AddonRegistration("submariner")]),
    ComponentDescriptor::chart(VOLSYNC, "volsync-controller", true, &["volsync-addon-controller"]),
    ComponentDescriptor::bookkeeping(MULTICLUSTERHUB, false),
    ComponentDescriptor::bookkeeping(MULTICLUSTER_ENGINE, true),
];

/// Component table for one package mode
#[derive(Clone, Debug)]
pub struct Registry {
    mode: PackageMode,
    components: Vec<ComponentDescriptor>,
}

impl Registry {
    /// Build the table for `mode`
    ///
    /// Community builds swap which search variant is enabled by default.
    pub fn new(mode: PackageMode) -> Self {
        let components = STANDARD
            .iter()
            .cloned()
            .map(|mut c| {
                if mode == PackageMode::Community {
                    match c.name {
                        SEARCH => c.default_enabled = false,
                        SEARCH_COMMUNITY => c.default_enabled = true,
                        _ => {}
                    }
                }
                c
            })
            .collect();
        Self { mode, components }
    }

    /// Package mode the table was built for
    pub fn mode(&self) -> PackageMode {
        self.mode
    }

    /// Entries in reconcile order
    pub fn iter(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.iter()
    }

    /// Entry for `name`
    pub fn get(&self, name: &str) -> Option<&ComponentDescriptor> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Names enabled on a hub that does not say otherwise
    pub fn default_enabled(&self) -> Vec<&'static str> {
        self.components
            .iter()
            .filter(|c| c.default_enabled)
            .map(|c| c.name)
            .collect()
    }

    /// Names disabled on a hub that does not say otherwise
    ///
    /// Bookkeeping entries are never written into a hub's override list.
    pub fn default_disabled(&self) -> Vec<&'static str> {
        self.components
            .iter()
            .filter(|c| !c.default_enabled && !c.is_bookkeeping())
            .map(|c| c.name)
            .collect()
    }
}

/// True only for names the registry knows
///
/// Preview names are accepted so that defaulting can migrate them.
pub fn valid_component(name: &str) -> bool {
    STANDARD.iter().any(|c| c.name == name)
        || PREVIEW_MIGRATIONS.iter().any(|(preview, _)| *preview == name)
}
