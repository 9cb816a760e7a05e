//! Kubernetes Job manifest DTOs
//!
//! Only the subset of the `batch/v1` Job schema the training jobs need.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A `batch/v1` Job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobManifest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: JobSpec,
}

impl JobManifest {
    /// Wraps a single-container pod template into a Job that never restarts in place
    pub fn new(name: impl Into<String>, container: Container, backoff_limit: u32) -> Self {
        let name = name.into();
        let mut labels = BTreeMap::new();
        labels.insert("app.kubernetes.io/managed-by".to_string(), "gridsweep".to_string());

        Self {
            api_version: "batch/v1".to_string(),
            kind: "Job".to_string(),
            metadata: ObjectMeta { name, labels },
            spec: JobSpec {
                template: PodTemplateSpec {
                    spec: PodSpec {
                        service_account_name: None,
                        containers: vec![container],
                        restart_policy: "Never".to_string(),
                    },
                },
                backoff_limit,
            },
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.spec.template.spec.service_account_name = Some(account.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub template: PodTemplateSpec,
    pub backoff_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    pub spec: PodSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
    pub containers: Vec<Container>,
    pub restart_policy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_uses_kubernetes_field_names() {
        let manifest = JobManifest::new(
            "sweep-0",
            Container {
                name: "trainer".to_string(),
                image: "registry/trainer:latest".to_string(),
                command: vec!["python".to_string(), "train.py".to_string()],
                args: vec!["--max_depth".to_string(), "3".to_string()],
            },
            4,
        )
        .with_service_account("trainer-sa");

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["apiVersion"], "batch/v1");
        assert_eq!(json["kind"], "Job");
        assert_eq!(json["metadata"]["name"], "sweep-0");
        assert_eq!(json["spec"]["backoffLimit"], 4);
        assert_eq!(json["spec"]["template"]["spec"]["restartPolicy"], "Never");
        assert_eq!(
            json["spec"]["template"]["spec"]["serviceAccountName"],
            "trainer-sa"
        );
        assert_eq!(
            json["spec"]["template"]["spec"]["containers"][0]["args"][1],
            "3"
        );
    }
}
