use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use harrow_api::{
    action::ActionTemplate,
    config::{BatchConfig, ANNOTATION_CALLER, LABEL_APP, LABEL_USERNAME},
    error::{DispatchError, JobError},
    job::JobInfo,
    principal::{DispatchRequest, Principal},
};
use k8s_openapi::{
    api::{
        batch::v1::{Job, JobSpec},
        core::v1::{
            Container, EnvVar, Pod, PodSpec, PodTemplateSpec, ResourceRequirements,
            SecurityContext,
        },
    },
    apimachinery::pkg::api::resource::Quantity,
};
use kube::{
    api::{DeleteParams, ListParams, PostParams},
    core::ObjectMeta,
    Api, Client, ResourceExt,
};
use rand::{thread_rng, Rng};
use tracing::{instrument, warn, Level};

pub(crate) const FIELD_MANAGER: &str = "harrow-gateway";

const ENV_INPUT_DATA: &str = "INPUT_DATA";
const ENV_ACCESS_TOKEN: &str = "ACCESS_TOKEN";
const ENV_ACCESS_FORMAT: &str = "ACCESS_FORMAT";

/// Jobs are bounded by the backend even when the template says nothing.
const DEFAULT_DEADLINE_SECONDS: i64 = 7200;
const BACKOFF_LIMIT: i32 = 1;

/// Grace period handed to the backend on job deletion.
const DELETE_GRACE_SECONDS: u32 = 120;

const NAME_SUFFIX_LEN: usize = 5;

/// The kube-backed job client. All authoritative job state lives in the
/// backend; this client carries no cache.
#[derive(Clone)]
pub struct BatchClient {
    kube: Client,
    config: BatchConfig,
}

impl BatchClient {
    /// Connects to the cluster once at startup. Callers treat a failure
    /// here as fatal.
    #[instrument(level = Level::INFO, skip_all, err(Display))]
    pub async fn connect(config: BatchConfig) -> Result<Self> {
        let kube = Client::try_default()
            .await
            .map_err(|error| anyhow!("failed to load kubernetes account: {error}"))?;
        Ok(Self { kube, config })
    }

    fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.kube.clone(), &self.config.namespace)
    }

    pub(crate) fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.kube.clone(), &self.config.namespace)
    }

    fn label_selector(&self, username: Option<&str>) -> String {
        label_selector(&self.config, username)
    }

    /// Materializes and submits a job for the given template.
    #[instrument(level = Level::INFO, skip_all, fields(action = %request.action), err(Display))]
    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
        template: &ActionTemplate,
    ) -> Result<JobInfo, DispatchError> {
        let name = format!(
            "{name}-{suffix}",
            name = template.name,
            suffix = random_suffix(NAME_SUFFIX_LEN),
        );
        let job = build_job(&self.config, template, request, &name)?;

        let pp = PostParams {
            field_manager: Some(FIELD_MANAGER.into()),
            ..Default::default()
        };
        // name collisions are resolved by the backend's uniqueness
        // enforcement and surface here
        let created = self
            .jobs()
            .create(&pp, &job)
            .await
            .map_err(DispatchError::SubmissionFailed)?;
        Ok(JobInfo::from_job(&created))
    }

    /// Finds one job by its backend-assigned identifier, scoped to the
    /// principal's tenant unless on the unscoped maintenance path.
    #[instrument(level = Level::INFO, skip(self, principal), err(Display))]
    pub async fn get_by_id(&self, uid: &str, principal: Option<&Principal>) -> Result<Job, JobError> {
        let lp = ListParams {
            label_selector: Some(
                self.label_selector(principal.map(|principal| principal.label_safe.as_str())),
            ),
            ..Default::default()
        };
        let jobs = self.jobs().list(&lp).await.map_err(JobError::Backend)?;
        jobs.items
            .into_iter()
            .find(|job| job.uid().as_deref() == Some(uid))
            .ok_or_else(|| JobError::NotFound(uid.into()))
    }

    #[instrument(level = Level::INFO, skip(self, principal), err(Display))]
    pub async fn status(
        &self,
        uid: &str,
        principal: Option<&Principal>,
    ) -> Result<JobInfo, JobError> {
        self.get_by_id(uid, principal)
            .await
            .map(|job| JobInfo::from_job(&job))
    }

    /// Lists the principal's jobs. A backend failure yields an empty
    /// list, not an error.
    #[instrument(level = Level::INFO, skip_all, fields(username = %principal.label_safe))]
    pub async fn list(&self, principal: &Principal) -> Vec<JobInfo> {
        let lp = ListParams {
            label_selector: Some(self.label_selector(Some(&principal.label_safe))),
            ..Default::default()
        };
        match self.jobs().list(&lp).await {
            Ok(jobs) => jobs.items.iter().map(JobInfo::from_job).collect(),
            Err(error) => {
                warn!("failed to list jobs: {error}");
                Vec::default()
            }
        }
    }

    /// Lists every job under the app label, for the maintenance path.
    #[instrument(level = Level::INFO, skip_all, err(Display))]
    pub async fn list_all(&self) -> Result<Vec<Job>, JobError> {
        let lp = ListParams {
            label_selector: Some(self.label_selector(None)),
            ..Default::default()
        };
        self.jobs()
            .list(&lp)
            .await
            .map(|jobs| jobs.items)
            .map_err(JobError::Backend)
    }

    /// Deletes a job by its identifier, scoped to the principal's
    /// tenant unless on the unscoped maintenance path.
    #[instrument(level = Level::INFO, skip(self, principal), err(Display))]
    pub async fn delete(&self, uid: &str, principal: Option<&Principal>) -> Result<(), JobError> {
        let job = self.get_by_id(uid, principal).await?;
        self.delete_named(&job.name_any()).await
    }

    /// Deletes a job by name with background cascading, so the backing
    /// pods are reclaimed with it.
    #[instrument(level = Level::INFO, skip(self), err(Display))]
    pub async fn delete_named(&self, name: &str) -> Result<(), JobError> {
        let dp = DeleteParams::background().grace_period(DELETE_GRACE_SECONDS);
        self.jobs()
            .delete(name, &dp)
            .await
            .map(|_| ())
            .map_err(JobError::Backend)
    }
}

fn label_selector(config: &BatchConfig, username: Option<&str>) -> String {
    let app = &config.app_label;
    match username {
        Some(username) => format!("{LABEL_APP}={app},{LABEL_USERNAME}={username}"),
        // the unscoped form is reserved for maintenance paths
        None => format!("{LABEL_APP}={app}"),
    }
}

fn random_suffix(len: usize) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

    let mut rng = thread_rng();
    (0..len)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

fn build_env(
    template: &ActionTemplate,
    request: &DispatchRequest,
) -> Result<Vec<EnvVar>, DispatchError> {
    let input = ::serde_json::to_string(&request.input).map_err(DispatchError::Input)?;

    let fixed = |name: &str, value: String| EnvVar {
        name: name.into(),
        value: Some(value),
        value_from: None,
    };
    let mut env = vec![
        fixed(ENV_INPUT_DATA, input),
        fixed(ENV_ACCESS_TOKEN, request.access_token.clone()),
        fixed(ENV_ACCESS_FORMAT, request.access_format.clone()),
    ];

    // template entries never override the fixed ones
    env.extend(
        template
            .container
            .env
            .iter()
            .filter(|var| {
                !matches!(
                    var.name.as_str(),
                    ENV_INPUT_DATA | ENV_ACCESS_TOKEN | ENV_ACCESS_FORMAT,
                )
            })
            .cloned(),
    );
    Ok(env)
}

/// Materializes the job object without touching the backend.
fn build_job(
    config: &BatchConfig,
    template: &ActionTemplate,
    request: &DispatchRequest,
    name: &str,
) -> Result<Job, DispatchError> {
    let labels: BTreeMap<String, String> = [
        (LABEL_APP.into(), config.app_label.clone()),
        (LABEL_USERNAME.into(), request.principal.label_safe.clone()),
    ]
    .into();
    let annotations: BTreeMap<String, String> =
        [(ANNOTATION_CALLER.into(), request.caller_user_name.clone())].into();

    // request == limit, so the pod lands in the Guaranteed QoS class
    let resources: BTreeMap<String, Quantity> = [
        ("cpu".into(), Quantity(template.container.cpu_limit.clone())),
        (
            "memory".into(),
            Quantity(template.container.memory_limit.clone()),
        ),
    ]
    .into();

    let container = Container {
        name: template.container.name.clone(),
        image: Some(template.container.image.clone()),
        image_pull_policy: template.container.pull_policy.clone(),
        env: Some(build_env(template, request)?),
        volume_mounts: Some(template.container.volume_mounts.clone()),
        resources: Some(ResourceRequirements {
            limits: Some(resources.clone()),
            requests: Some(resources),
            ..Default::default()
        }),
        security_context: Some(SecurityContext {
            privileged: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(Job {
        metadata: ObjectMeta {
            name: Some(name.into()),
            labels: Some(labels.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(BACKOFF_LIMIT),
            active_deadline_seconds: Some(
                template
                    .active_deadline_seconds
                    .unwrap_or(DEFAULT_DEADLINE_SECONDS),
            ),
            ttl_seconds_after_finished: template.ttl_seconds_after_finished,
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(name.into()),
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    restart_policy: Some(template.restart_policy.clone()),
                    service_account_name: template.service_account_name.clone(),
                    volumes: Some(template.volumes.clone()),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

#[cfg(test)]
mod tests {
    use harrow_api::action::ContainerSpec;
    use serde_json::json;

    use super::*;

    fn config() -> BatchConfig {
        BatchConfig::new("batch".into())
    }

    fn template() -> ActionTemplate {
        ActionTemplate {
            name: "ingest-job".into(),
            action: "ingest".into(),
            container: ContainerSpec {
                name: "ingest".into(),
                image: "quay.io/harrow/runner:latest".into(),
                pull_policy: Some("Always".into()),
                env: vec![
                    EnvVar {
                        name: "MODE".into(),
                        value: Some("bulk".into()),
                        value_from: None,
                    },
                    // must not shadow the fixed variable
                    EnvVar {
                        name: "ACCESS_TOKEN".into(),
                        value: Some("forged".into()),
                        value_from: None,
                    },
                ],
                volume_mounts: Vec::new(),
                cpu_limit: "2".into(),
                memory_limit: "1Gi".into(),
            },
            volumes: Vec::new(),
            restart_policy: "Never".into(),
            service_account_name: Some("ingest-runner".into()),
            active_deadline_seconds: None,
            ttl_seconds_after_finished: Some(120),
        }
    }

    fn request() -> DispatchRequest {
        DispatchRequest {
            action: "ingest".into(),
            input: json!({"x": 1}),
            access_format: "presigned_url".into(),
            access_token: "token".into(),
            caller_user_name: "Alice Smith".into(),
            principal: Principal {
                raw: "alice_example.org".into(),
                label_safe: "alice_example.org".into(),
            },
        }
    }

    #[test]
    fn suffixes_are_lowercase_and_sized() {
        for _ in 0..64 {
            let suffix = random_suffix(NAME_SUFFIX_LEN);
            assert_eq!(suffix.len(), NAME_SUFFIX_LEN);
            assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn fixed_env_comes_first_and_wins() {
        let env = build_env(&template(), &request()).unwrap();
        let names: Vec<_> = env.iter().map(|var| var.name.as_str()).collect();
        assert_eq!(names, ["INPUT_DATA", "ACCESS_TOKEN", "ACCESS_FORMAT", "MODE"]);
        assert_eq!(env[0].value.as_deref(), Some(r#"{"x":1}"#));
        assert_eq!(env[1].value.as_deref(), Some("token"));
    }

    #[test]
    fn jobs_are_labeled_for_the_tenant() {
        let job = build_job(&config(), &template(), &request(), "ingest-job-abcde").unwrap();
        let labels = job.metadata.labels.unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("harrowjob"));
        assert_eq!(
            labels.get("username").map(String::as_str),
            Some("alice_example.org"),
        );

        let annotations = job.metadata.annotations.unwrap();
        assert_eq!(
            annotations
                .get("harrow.io/caller-username")
                .map(String::as_str),
            Some("Alice Smith"),
        );

        // the pod template carries the same tenant labels
        let spec = job.spec.unwrap();
        assert_eq!(
            spec.template.metadata.unwrap().labels.unwrap().get("username"),
            Some(&"alice_example.org".to_string()),
        );
    }

    #[test]
    fn resources_are_guaranteed_class() {
        let job = build_job(&config(), &template(), &request(), "ingest-job-abcde").unwrap();
        let resources = job.spec.unwrap().template.spec.unwrap().containers[0]
            .resources
            .clone()
            .unwrap();
        assert_eq!(resources.limits, resources.requests);
        assert_eq!(
            resources.limits.unwrap().get("cpu"),
            Some(&Quantity("2".into())),
        );
    }

    #[test]
    fn deadline_defaults_and_overrides() {
        let job = build_job(&config(), &template(), &request(), "ingest-job-abcde").unwrap();
        let spec = job.spec.unwrap();
        assert_eq!(spec.active_deadline_seconds, Some(7200));
        assert_eq!(spec.backoff_limit, Some(1));
        assert_eq!(spec.ttl_seconds_after_finished, Some(120));

        let mut bounded = template();
        bounded.active_deadline_seconds = Some(600);
        let job = build_job(&config(), &bounded, &request(), "ingest-job-abcde").unwrap();
        assert_eq!(job.spec.unwrap().active_deadline_seconds, Some(600));
    }

    #[test]
    fn containers_run_unprivileged() {
        let job = build_job(&config(), &template(), &request(), "ingest-job-abcde").unwrap();
        let pod = job.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod.containers[0]
                .security_context
                .clone()
                .unwrap()
                .privileged,
            Some(false),
        );
        assert_eq!(pod.service_account_name.as_deref(), Some("ingest-runner"));
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
    }

    #[test]
    fn selectors_scope_by_tenant() {
        assert_eq!(
            label_selector(&config(), Some("alice_example.org")),
            "app=harrowjob,username=alice_example.org",
        );
        assert_eq!(label_selector(&config(), None), "app=harrowjob");
    }
}
