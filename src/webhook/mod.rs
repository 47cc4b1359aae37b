//! Admission webhook for MultiClusterHub
//!
//! The validating endpoint enforces the rules in [`validate`]. The mutating
//! endpoint admits everything unchanged; it exists so the registered
//! configuration has a target. Both are served over TLS from the certificate
//! pair in the operator's cert directory.

pub mod validate;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    ValidatingWebhook, ValidatingWebhookConfiguration, WebhookClientConfig,
};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{Api, Patch, PatchParams};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::Client;
use tracing::{error, info};

use crate::controller::HubClient;
use crate::crd::MultiClusterHub;
use crate::{Result, API_GROUP, FIELD_MANAGER};

/// Path of the validating endpoint
pub const VALIDATE_PATH: &str = "/validate-v1-multiclusterhub";

/// Path of the mutating endpoint
pub const MUTATE_PATH: &str = "/mutate-v1-multiclusterhub";

/// Service fronting the webhook server
pub const WEBHOOK_SERVICE: &str = "multiclusterhub-operator-webhook";

const VALIDATING_NAME: &str = "multiclusterhub-operator-validating-webhook";
const MUTATING_NAME: &str = "multiclusterhub-operator-mutating-webhook";
const INJECT_CA_ANNOTATION: &str = "service.beta.openshift.io/inject-cabundle";
const SERVING_CERT_ANNOTATION: &str = "service.beta.openshift.io/serving-cert-secret-name";
const SERVING_CERT_SECRET: &str = "multiclusterhub-operator-webhook";

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct WebhookState {
    /// Cluster access for the list queries the rules need
    pub client: Arc<dyn HubClient>,
}

impl WebhookState {
    /// Create webhook state over `client`
    pub fn new(client: Arc<dyn HubClient>) -> Self {
        Self { client }
    }
}

/// Router with the validating, mutating and health endpoints
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_PATH, post(validate_handler))
        .route(MUTATE_PATH, post(mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<MultiClusterHub>>,
) -> Json<AdmissionReview<kube::api::DynamicObject>> {
    let req: AdmissionRequest<MultiClusterHub> = match body.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "malformed admission review");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };
    Json(validate::review(state.client.as_ref(), &req).await.into_review())
}

async fn mutate_handler(
    Json(body): Json<AdmissionReview<MultiClusterHub>>,
) -> Json<AdmissionReview<kube::api::DynamicObject>> {
    let response = match TryInto::<AdmissionRequest<MultiClusterHub>>::try_into(body) {
        Ok(req) => AdmissionResponse::from(&req),
        Err(e) => AdmissionResponse::invalid(e.to_string()),
    };
    Json(response.into_review())
}

/// Serve the webhook router over TLS until the process exits
pub async fn serve(state: Arc<WebhookState>, addr: SocketAddr, cert_dir: &Path) -> std::io::Result<()> {
    let tls = RustlsConfig::from_pem_file(cert_dir.join("tls.crt"), cert_dir.join("tls.key")).await?;
    info!(%addr, "webhook server listening");
    axum_server::bind_rustls(addr, tls)
        .serve(webhook_router(state).into_make_service())
        .await
}

fn service_ref(namespace: &str, path: &str) -> WebhookClientConfig {
    WebhookClientConfig {
        service: Some(ServiceReference {
            name: WEBHOOK_SERVICE.to_string(),
            namespace: namespace.to_string(),
            path: Some(path.to_string()),
            port: Some(443),
        }),
        ..Default::default()
    }
}

fn hub_rule(operations: &[&str]) -> Vec<RuleWithOperations> {
    vec![RuleWithOperations {
        api_groups: Some(vec![API_GROUP.to_string()]),
        api_versions: Some(vec!["v1".to_string()]),
        operations: Some(operations.iter().map(|o| o.to_string()).collect()),
        resources: Some(vec!["multiclusterhubs".to_string()]),
        ..Default::default()
    }]
}

fn meta(name: &str, annotations: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        annotations: Some(annotations),
        ..Default::default()
    }
}

fn inject_ca() -> BTreeMap<String, String> {
    BTreeMap::from([(INJECT_CA_ANNOTATION.to_string(), "true".to_string())])
}

/// Validating configuration pointing at the operator's webhook service
pub fn validating_configuration(namespace: &str) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
        metadata: meta(VALIDATING_NAME, inject_ca()),
        webhooks: Some(vec![ValidatingWebhook {
            name: "multiclusterhub.validating-webhook.open-cluster-management.io".to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: service_ref(namespace, VALIDATE_PATH),
            failure_policy: Some("Fail".to_string()),
            rules: Some(hub_rule(&["CREATE", "UPDATE", "DELETE"])),
            side_effects: "None".to_string(),
            ..Default::default()
        }]),
    }
}

/// Mutating configuration pointing at the operator's webhook service
pub fn mutating_configuration(namespace: &str) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
        metadata: meta(MUTATING_NAME, inject_ca()),
        webhooks: Some(vec![MutatingWebhook {
            name: "multiclusterhub.mutating-webhook.open-cluster-management.io".to_string(),
            admission_review_versions: vec!["v1".to_string()],
            client_config: service_ref(namespace, MUTATE_PATH),
            failure_policy: Some("Fail".to_string()),
            rules: Some(hub_rule(&["CREATE"])),
            side_effects: "None".to_string(),
            ..Default::default()
        }]),
    }
}

fn webhook_service(namespace: &str, port: u16) -> Service {
    let selector = BTreeMap::from([("name".to_string(), "multiclusterhub-operator".to_string())]);
    Service {
        metadata: ObjectMeta {
            name: Some(WEBHOOK_SERVICE.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(BTreeMap::from([(
                SERVING_CERT_ANNOTATION.to_string(),
                SERVING_CERT_SECRET.to_string(),
            )])),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(selector),
            ports: Some(vec![ServicePort {
                port: 443,
                target_port: Some(IntOrString::Int(i32::from(port))),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create or refresh the webhook service and both configurations
pub async fn register(client: Client, namespace: &str, port: u16) -> Result<()> {
    let params = PatchParams::apply(FIELD_MANAGER).force();

    let services: Api<Service> = Api::namespaced(client.clone(), namespace);
    services
        .patch(WEBHOOK_SERVICE, &params, &Patch::Apply(&webhook_service(namespace, port)))
        .await?;

    let validating: Api<ValidatingWebhookConfiguration> = Api::all(client.clone());
    validating
        .patch(VALIDATING_NAME, &params, &Patch::Apply(&validating_configuration(namespace)))
        .await?;

    let mutating: Api<MutatingWebhookConfiguration> = Api::all(client);
    mutating
        .patch(MUTATING_NAME, &params, &Patch::Apply(&mutating_configuration(namespace)))
        .await?;

    info!(namespace, "webhook configurations registered");
    Ok(())
}
