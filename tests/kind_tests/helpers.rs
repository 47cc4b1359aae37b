//! Shared fixtures for cluster-backed tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use hub_operator::crd::{MultiClusterHub, MultiClusterHubSpec};

/// Namespace the tests install hubs into
pub const TEST_NAMESPACE: &str = "hub-operator-e2e";

/// Client for the current kubeconfig context, with the test namespace created
pub async fn client() -> Client {
    let client = Client::try_default()
        .await
        .expect("a reachable cluster is required for these tests");
    let namespaces: Api<Namespace> = Api::all(client.clone());
    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => {}
        Err(kube::Error::Api(e)) if e.code == 409 => {}
        Err(e) => panic!("failed to create test namespace: {e}"),
    }
    client
}

/// Hub named `name` in the test namespace
pub fn hub(name: &str) -> MultiClusterHub {
    let mut hub = MultiClusterHub::new(name, MultiClusterHubSpec::default());
    hub.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    hub
}

/// Delete `name` and wait for its finalizer to be processed
pub async fn delete_and_wait(api: &Api<MultiClusterHub>, name: &str, timeout: Duration) {
    let _ = api.delete(name, &DeleteParams::default()).await;
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if api.get_opt(name).await.expect("get hub").is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    panic!("hub {name} was not deleted within {timeout:?}");
}
