//! Map observed resources onto normalized component status entries
//!
//! Each mapper is total: anything it cannot read yields [`unknown`] rather than
//! an error.

use chrono::Utc;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentCondition};
use kube::api::DynamicObject;
use serde_json::Value;

use super::fields::{self, Field};
use crate::crd::{ConditionStatus, StatusCondition};

/// Status used until something is observed
pub fn unknown() -> StatusCondition {
    let now = Utc::now();
    StatusCondition {
        kind: String::new(),
        available: false,
        type_: "Unknown".to_string(),
        status: ConditionStatus::Unknown,
        last_update_time: Some(now),
        last_transition_time: Some(now),
        reason: "No conditions available".to_string(),
        message: "No conditions available".to_string(),
    }
}

/// Status for pieces installed separately from this hub
pub fn unmanaged() -> StatusCondition {
    let now = Utc::now();
    StatusCondition {
        kind: String::new(),
        available: true,
        type_: "Available".to_string(),
        status: ConditionStatus::True,
        last_update_time: Some(now),
        last_transition_time: Some(now),
        reason: "ComponentUnmanaged".to_string(),
        message: "Component is installed separately and not managed by the multiclusterhub"
            .to_string(),
    }
}

/// Status for the console component when the platform console is missing
pub fn console_unavailable() -> StatusCondition {
    let now = Utc::now();
    StatusCondition {
        kind: String::new(),
        available: false,
        type_: "Available".to_string(),
        status: ConditionStatus::False,
        last_update_time: Some(now),
        last_transition_time: Some(now),
        reason: "OCP Console missing".to_string(),
        message: "The OCP Console must be enabled before using ACM Console".to_string(),
    }
}

/// True if the deployment has no unavailable replicas and is not explicitly unavailable
pub fn deployment_successful(d: &Deployment) -> bool {
    let Some(status) = d.status.as_ref() else {
        return false;
    };
    let explicitly_unavailable = status
        .conditions
        .iter()
        .flatten()
        .any(|c| c.type_ == "Available" && c.status == "False");
    !explicitly_unavailable && status.unavailable_replicas.unwrap_or(0) == 0
}

fn latest_condition(conditions: &[DeploymentCondition]) -> Option<&DeploymentCondition> {
    conditions.iter().fold(None, |latest: Option<&DeploymentCondition>, c| match latest {
        None => Some(c),
        Some(l) => {
            let newer = match (&c.last_transition_time, &l.last_transition_time) {
                (Some(a), Some(b)) => a.0 > b.0,
                (Some(_), None) => true,
                _ => false,
            };
            Some(if newer { c } else { l })
        }
    })
}

fn from_deployment_condition(c: &DeploymentCondition, available: bool) -> StatusCondition {
    StatusCondition {
        kind: "Deployment".to_string(),
        available,
        type_: c.type_.clone(),
        status: ConditionStatus::parse(&c.status),
        last_update_time: c.last_update_time.as_ref().map(|t| t.0),
        last_transition_time: c.last_transition_time.as_ref().map(|t| t.0),
        reason: c.reason.clone().unwrap_or_default(),
        message: c.message.clone().unwrap_or_default(),
    }
}

/// Map a deployment onto a status entry
///
/// Our notion of success is stricter than the deployment's own Available
/// condition, so when Available=True is the latest condition but replicas are
/// still unavailable, the Progressing condition is surfaced instead.
pub fn map_deployment(d: &Deployment) -> StatusCondition {
    let conditions: &[DeploymentCondition] = d
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or(&[]);
    let Some(latest) = latest_condition(conditions) else {
        return unknown();
    };

    let successful = deployment_successful(d);
    let mut out = from_deployment_condition(latest, successful);
    if successful {
        out.message.clear();
    } else if latest.type_ == "Available" && latest.status == "True" {
        out = conditions
            .iter()
            .find(|c| c.type_ == "Progressing")
            .map(|c| from_deployment_condition(c, false))
            .unwrap_or_else(|| StatusCondition {
                kind: "Deployment".to_string(),
                ..Default::default()
            });
    }
    out
}

/// Map the engine OLM subscription onto a status entry
pub fn map_subscription(sub: &DynamicObject) -> StatusCondition {
    let doc = &sub.data;
    if !matches!(fields::object(doc, &["spec"]), Field::Found(_))
        || !matches!(fields::object(doc, &["status", "installPlanRef"]), Field::Found(_))
    {
        return unknown();
    }

    let state = fields::string_or_empty(doc, &["status", "state"]);
    let mut message = format!(
        "installPlanApproval: {}. installPlan: {}/{}",
        fields::string_or_empty(doc, &["spec", "installPlanApproval"]),
        fields::string_or_empty(doc, &["status", "installPlanRef", "namespace"]),
        fields::string_or_empty(doc, &["status", "installPlanRef", "name"]),
    );
    if state == "UpgradePending" {
        message = format!(
            "Upgrade pending. Installed CSV: {}. Pending CSV: {}",
            fields::string_or_empty(doc, &["status", "installedCSV"]),
            fields::string_or_empty(doc, &["status", "currentCSV"]),
        );
    }

    let now = Utc::now();
    StatusCondition {
        kind: "Subscription".to_string(),
        available: true,
        type_: "Available".to_string(),
        status: ConditionStatus::True,
        last_update_time: Some(now),
        last_transition_time: Some(now),
        reason: state,
        message,
    }
}

fn condition_entries(doc: &Value) -> Option<Vec<&serde_json::Map<String, Value>>> {
    let list = fields::array(doc, &["status", "conditions"]).found()?;
    if list.is_empty() {
        return None;
    }
    list.iter().map(|c| c.as_object()).collect()
}

/// Map the engine ClusterServiceVersion onto a status entry
pub fn map_csv(csv: &DynamicObject) -> StatusCondition {
    let Some(entries) = condition_entries(&csv.data) else {
        return unknown();
    };

    let now = Utc::now();
    let mut out = unknown();
    for entry in entries {
        let value = Value::Object(entry.clone());
        let phase = fields::string_or_empty(&value, &["phase"]);
        let reason = fields::string_or_empty(&value, &["reason"]);
        let succeeded = phase == "Succeeded";
        out = StatusCondition {
            kind: "ClusterServiceVersion".to_string(),
            available: false,
            type_: "Unavailable".to_string(),
            status: if succeeded {
                ConditionStatus::True
            } else {
                ConditionStatus::False
            },
            last_update_time: Some(now),
            last_transition_time: Some(now),
            reason: reason.clone(),
            message: fields::string_or_empty(&value, &["message"]),
        };
        if succeeded && reason == "InstallSucceeded" {
            out.type_ = "Available".to_string();
            out.available = true;
            return out;
        }
    }
    out
}

/// Map the multicluster engine resource onto a status entry
pub fn map_engine(engine: &DynamicObject) -> StatusCondition {
    let Some(entries) = condition_entries(&engine.data) else {
        return unknown();
    };

    let now = Utc::now();
    let mut out = unknown();
    for entry in entries {
        let value = Value::Object(entry.clone());
        let type_ = fields::string_or_empty(&value, &["type"]);
        let status = fields::string_or_empty(&value, &["status"]);
        let available = type_ == "Available" && status == "True";
        out = StatusCondition {
            kind: "MultiClusterEngine".to_string(),
            available,
            type_,
            status: ConditionStatus::parse(&status),
            last_update_time: Some(now),
            last_transition_time: Some(now),
            reason: fields::string_or_empty(&value, &["reason"]),
            message: fields::string_or_empty(&value, &["message"]),
        };
        if available {
            return out;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use serde_json::json;

    fn condition(type_: &str, status: &str, minutes_ago: i64) -> DeploymentCondition {
        DeploymentCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            last_transition_time: Some(Time(
                Utc::now() - chrono::Duration::minutes(minutes_ago),
            )),
            reason: Some(format!("{type_}Reason")),
            message: Some(format!("{type_} message")),
            ..Default::default()
        }
    }

    fn deployment(conditions: Vec<DeploymentCondition>, unavailable: i32) -> Deployment {
        Deployment {
            status: Some(DeploymentStatus {
                conditions: Some(conditions),
                unavailable_replicas: Some(unavailable),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn dynamic(data: Value) -> DynamicObject {
        let mut obj = crate::kinds::CSV.object("x", Some("ns"));
        obj.data = data;
        obj
    }

    mod deployments {
        use super::*;

        /// Story: a healthy deployment is available with an empty message
        #[test]
        fn story_healthy_deployment_is_available() {
            let d = deployment(
                vec![condition("Progressing", "True", 10), condition("Available", "True", 1)],
                0,
            );
            let sc = map_deployment(&d);
            assert!(sc.available);
            assert_eq!(sc.type_, "Available");
            assert!(sc.message.is_empty());
        }

        /// Story: a rollout with unavailable replicas does not show the stale
        /// Available=True condition
        #[test]
        fn story_unavailable_replicas_surface_progressing() {
            let d = deployment(
                vec![condition("Progressing", "True", 10), condition("Available", "True", 1)],
                1,
            );
            let sc = map_deployment(&d);
            assert!(!sc.available);
            assert_eq!(sc.type_, "Progressing");
            assert_eq!(sc.reason, "ProgressingReason");
        }

        #[test]
        fn explicit_available_false_is_unsuccessful() {
            let d = deployment(vec![condition("Available", "False", 1)], 0);
            assert!(!deployment_successful(&d));
            assert!(!map_deployment(&d).available);
        }

        #[test]
        fn no_conditions_is_unknown() {
            let sc = map_deployment(&deployment(vec![], 0));
            assert_eq!(sc.status, ConditionStatus::Unknown);
            assert!(!sc.available);
            assert!(!map_deployment(&Deployment::default()).available);
        }
    }

    mod custom_resources {
        use super::*;

        #[test]
        fn subscription_without_install_plan_is_unknown() {
            let sub = dynamic(json!({"spec": {}, "status": {"state": "AtLatestKnown"}}));
            assert_eq!(map_subscription(&sub).type_, "Unknown");
        }

        #[test]
        fn subscription_reports_install_plan() {
            let sub = dynamic(json!({
                "spec": {"installPlanApproval": "Automatic"},
                "status": {
                    "state": "AtLatestKnown",
                    "installPlanRef": {"namespace": "multicluster-engine", "name": "install-abc"}
                }
            }));
            let sc = map_subscription(&sub);
            assert!(sc.available);
            assert_eq!(sc.reason, "AtLatestKnown");
            assert_eq!(
                sc.message,
                "installPlanApproval: Automatic. installPlan: multicluster-engine/install-abc"
            );
        }

        #[test]
        fn subscription_upgrade_pending_names_csvs() {
            let sub = dynamic(json!({
                "spec": {},
                "status": {
                    "state": "UpgradePending",
                    "installPlanRef": {},
                    "installedCSV": "mce.v2.7.0",
                    "currentCSV": "mce.v2.8.0"
                }
            }));
            assert_eq!(
                map_subscription(&sub).message,
                "Upgrade pending. Installed CSV: mce.v2.7.0. Pending CSV: mce.v2.8.0"
            );
        }

        #[test]
        fn csv_succeeded_install_is_available() {
            let csv = dynamic(json!({"status": {"conditions": [
                {"phase": "Pending", "reason": "RequirementsUnknown"},
                {"phase": "Succeeded", "reason": "InstallSucceeded", "message": "done"}
            ]}}));
            let sc = map_csv(&csv);
            assert!(sc.available);
            assert_eq!(sc.type_, "Available");
        }

        #[test]
        fn csv_without_success_returns_last_entry() {
            let csv = dynamic(json!({"status": {"conditions": [
                {"phase": "Pending", "reason": "RequirementsUnknown"},
                {"phase": "Installing", "reason": "InstallWaiting"}
            ]}}));
            let sc = map_csv(&csv);
            assert!(!sc.available);
            assert_eq!(sc.reason, "InstallWaiting");
            assert_eq!(sc.status, ConditionStatus::False);
        }

        /// Story: malformed status documents degrade to Unknown
        #[test]
        fn story_malformed_documents_are_unknown() {
            for doc in [
                json!({}),
                json!({"status": "weird"}),
                json!({"status": {"conditions": "weird"}}),
                json!({"status": {"conditions": ["not-an-object"]}}),
                json!({"status": {"conditions": []}}),
            ] {
                assert_eq!(map_csv(&dynamic(doc.clone())).type_, "Unknown");
                assert_eq!(map_engine(&dynamic(doc)).type_, "Unknown");
            }
        }

        #[test]
        fn engine_available_condition_wins() {
            let engine = dynamic(json!({"status": {"conditions": [
                {"type": "Progressing", "status": "True"},
                {"type": "Available", "status": "True", "reason": "ComponentsAvailable"},
                {"type": "Degraded", "status": "False"}
            ]}}));
            let sc = map_engine(&engine);
            assert!(sc.available);
            assert_eq!(sc.reason, "ComponentsAvailable");
        }
    }
}
