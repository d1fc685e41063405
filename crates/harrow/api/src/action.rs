use k8s_openapi::api::core::v1::{EnvVar, Volume, VolumeMount};
use serde::{Deserialize, Serialize};

/// A pre-configured job template, selectable by dispatch callers via its
/// `action` name. Field names follow the on-disk action config schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionTemplate {
    pub name: String,
    pub action: String,
    pub container: ContainerSpec,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default = "ActionTemplate::default_restart_policy")]
    pub restart_policy: String,
    #[serde(default, rename = "serviceAccountName")]
    pub service_account_name: Option<String>,
    #[serde(default, rename = "activeDeadlineSeconds")]
    pub active_deadline_seconds: Option<i64>,
    #[serde(default, rename = "ttlSecondsAfterFinished")]
    pub ttl_seconds_after_finished: Option<i32>,
}

impl ActionTemplate {
    fn default_restart_policy() -> String {
        "Never".into()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub pull_policy: Option<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default, rename = "volumeMounts")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(rename = "cpu-limit")]
    pub cpu_limit: String,
    #[serde(rename = "memory-limit")]
    pub memory_limit: String,
}
