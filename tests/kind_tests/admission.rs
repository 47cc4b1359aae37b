//! Stories about the validating webhook on a live cluster

use kube::api::{Api, PostParams};

use hub_operator::crd::MultiClusterHub;

use super::helpers::{client, hub, TEST_NAMESPACE};

/// Story: with a standalone hub running, a second standalone hub is refused
/// at admission time
#[tokio::test]
#[ignore]
async fn story_second_standalone_hub_is_refused() {
    let client = client().await;
    let api: Api<MultiClusterHub> = Api::namespaced(client, TEST_NAMESPACE);
    let _ = api
        .create(&PostParams::default(), &hub("multiclusterhub"))
        .await;

    let err = api
        .create(&PostParams::default(), &hub("second-hub"))
        .await
        .expect_err("second standalone hub must be rejected");
    assert!(err.to_string().contains("already exists"));
}
