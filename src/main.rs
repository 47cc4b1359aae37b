//! Hub operator - installs and manages a MultiClusterHub

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt, ResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hub_operator::config::OperatorConfig;
use hub_operator::controller::{error_policy, reconcile, Context, KubeHubClient};
use hub_operator::crd::{InternalHubComponent, MultiClusterHub};
use hub_operator::leader::LeaderElector;
use hub_operator::metrics::HubMetrics;
use hub_operator::retry::{retry_with_backoff, Backoff};
use hub_operator::webhook::{self, WebhookState};
use hub_operator::{FIELD_MANAGER, INSTALLER_NAMESPACE_LABEL, INSTALLER_NAME_LABEL};

/// Hub operator - lifecycle management for a multi-component cluster management hub
#[derive(Parser, Debug)]
#[command(name = "hub-operator", version, about, long_about = None)]
struct Cli {
    /// Address the metrics endpoint binds to
    #[arg(long, env = "METRICS_BIND_ADDRESS", default_value = "0.0.0.0:8383")]
    metrics_bind_address: SocketAddr,

    /// Address the health probe endpoint binds to
    #[arg(long, env = "HEALTH_PROBE_BIND_ADDRESS", default_value = "0.0.0.0:8081")]
    health_probe_bind_address: SocketAddr,

    /// Wait for the leader lease before running the controller
    #[arg(long, env = "LEADER_ELECT")]
    leader_elect: bool,

    /// Port the admission webhook listens on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = 9443)]
    webhook_port: u16,

    /// Directory holding the webhook's tls.crt and tls.key
    #[arg(
        long,
        env = "WEBHOOK_CERT_DIR",
        default_value = "/tmp/k8s-webhook-server/serving-certs"
    )]
    cert_dir: PathBuf,

    /// Print CRD manifests and exit
    #[arg(long)]
    crd: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("failed to install the rustls crypto provider: {e:?}");
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.crd {
        for crd in [MultiClusterHub::crd(), InternalHubComponent::crd()] {
            println!("---\n{}", serde_yaml::to_string(&crd)?);
        }
        return Ok(());
    }

    run(cli).await
}

/// Install the operator's own CRDs with server-side apply
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for crd in [MultiClusterHub::crd(), InternalHubComponent::crd()] {
        let name = crd.name_any();
        let patch = Patch::Apply(&crd);
        retry_with_backoff(&Backoff::startup(), "install CRD", || {
            crds.patch(&name, &params, &patch)
        })
        .await
        .map_err(|e| anyhow::anyhow!("failed to install CRD {name}: {e}"))?;
        tracing::info!(crd = %name, "CRD installed");
    }
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<HubMetrics>>) -> (StatusCode, String) {
    match metrics.export_text() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn serve_plain(addr: SocketAddr, router: Router, what: &'static str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind {what} server");
            return;
        }
    };
    tracing::info!(%addr, "{what} server listening");
    if let Err(e) = axum::serve(listener, router).await {
        tracing::error!(error = %e, "{what} server stopped");
    }
}

/// Hub keyed by a deployment's installer labels
fn owning_hub(deployment: Deployment) -> Option<ObjectRef<MultiClusterHub>> {
    let labels = deployment.labels();
    let name = labels.get(INSTALLER_NAME_LABEL)?;
    let namespace = labels.get(INSTALLER_NAMESPACE_LABEL)?;
    Some(ObjectRef::new(name).within(namespace))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "hub operator starting");

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create Kubernetes client: {e}"))?;
    let config = OperatorConfig::from_env();
    config.log_proxy();
    // Surface an illegal package mode before anything else runs
    config.package_mode()?;

    ensure_crds_installed(&client).await?;

    let metrics = Arc::new(HubMetrics::new()?);
    let health = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }));
    tokio::spawn(serve_plain(cli.health_probe_bind_address, health, "health"));
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics.clone());
    tokio::spawn(serve_plain(cli.metrics_bind_address, metrics_router, "metrics"));

    let webhook_state = Arc::new(WebhookState::new(Arc::new(KubeHubClient::new(client.clone()))));
    let webhook_addr = SocketAddr::from(([0, 0, 0, 0], cli.webhook_port));
    let cert_dir = cli.cert_dir.clone();
    tokio::spawn(async move {
        if let Err(e) = webhook::serve(webhook_state, webhook_addr, &cert_dir).await {
            tracing::error!(error = %e, "webhook server failed");
        }
    });
    if let Err(e) = webhook::register(client.clone(), &config.operator_namespace, cli.webhook_port).await {
        tracing::error!(error = %e, "failed to register webhook configurations");
    }

    let mut leadership = if cli.leader_elect {
        let identity = std::env::var("POD_NAME").unwrap_or_else(|_| {
            format!("hub-operator-{}", rand::random::<u32>())
        });
        let elector = LeaderElector::new(client.clone(), &config.operator_namespace, identity);
        Some(elector.acquire().await?)
    } else {
        None
    };

    let ctx = Arc::new(
        Context::builder(client.clone(), config)
            .metrics(metrics)
            .build()?,
    );

    let hubs: Api<MultiClusterHub> = Api::all(client.clone());
    let deployments: Api<Deployment> = Api::all(client);
    let controller = Controller::new(hubs, WatcherConfig::default())
        .watches(
            deployments,
            WatcherConfig::default().labels(INSTALLER_NAME_LABEL),
            owning_hub,
        )
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((hub, action)) => tracing::debug!(hub = %hub.name, ?action, "reconciled"),
                Err(e) => tracing::debug!(error = %e, "reconcile failed"),
            }
        });

    tracing::info!("starting MultiClusterHub controller");
    match leadership.as_mut() {
        Some(guard) => {
            tokio::select! {
                _ = controller => {}
                _ = guard.lost() => {
                    anyhow::bail!("leadership lost");
                }
            }
        }
        None => controller.await,
    }

    tracing::info!("hub operator shutting down");
    Ok(())
}
