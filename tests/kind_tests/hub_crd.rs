//! Stories about hub resources on a live API server

use std::time::Duration;

use kube::api::{Api, PostParams};
use kube::ResourceExt;

use hub_operator::crd::{HubPhase, MultiClusterHub};

use super::helpers::{client, delete_and_wait, hub, TEST_NAMESPACE};

/// Story: the operator adopts a new hub, adds its finalizer and defaults, and
/// starts reporting a phase
#[tokio::test]
#[ignore]
async fn story_operator_picks_up_new_hub() {
    let client = client().await;
    let api: Api<MultiClusterHub> = Api::namespaced(client, TEST_NAMESPACE);
    api.create(&PostParams::default(), &hub("multiclusterhub"))
        .await
        .expect("create hub");

    let mut adopted = None;
    for _ in 0..30 {
        let current = api.get("multiclusterhub").await.expect("get hub");
        if current.has_finalizer() && current.status.is_some() {
            adopted = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    let adopted = adopted.expect("operator never reconciled the hub");
    assert_eq!(adopted.spec.availability_config, "High");
    assert!(!adopted.component_configs().is_empty());
    assert_ne!(adopted.phase(), HubPhase::Uninstalling);

    delete_and_wait(&api, &adopted.name_any(), Duration::from_secs(300)).await;
}

/// Story: pausing a hub is reflected in its status without touching the
/// components it already installed
#[tokio::test]
#[ignore]
async fn story_pause_annotation_is_honoured() {
    let client = client().await;
    let api: Api<MultiClusterHub> = Api::namespaced(client, TEST_NAMESPACE);
    let mut paused = hub("paused-hub");
    paused.annotations_mut().insert(
        hub_operator::ANNOTATION_PAUSE.to_string(),
        "true".to_string(),
    );
    api.create(&PostParams::default(), &paused)
        .await
        .expect("create hub");

    let mut phase = HubPhase::Pending;
    for _ in 0..30 {
        phase = api.get("paused-hub").await.expect("get hub").phase();
        if phase == HubPhase::Paused {
            break;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    assert_eq!(phase, HubPhase::Paused);

    delete_and_wait(&api, "paused-hub", Duration::from_secs(300)).await;
}
