use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use harrow_api::job::JobStatus;
use harrow_core::signal::FunctionSignal;
use harrow_provider::BatchClient;
use k8s_openapi::api::batch::v1::Job;
use kube::ResourceExt;
use tokio::time::sleep;
use tracing::{info, instrument, warn, Level};

/// How often finished jobs are reclaimed. A failed pass waits for the
/// next tick instead of retrying, so this is also the only backoff.
pub const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Minimum age of a terminal job before it is deleted.
const REAP_CUTOFF_SECONDS: i64 = 1800;

/// Reclaims finished jobs until the process shuts down. This is a
/// privileged maintenance path: it sees every tenant's jobs.
pub async fn loop_forever(client: BatchClient, signal: FunctionSignal) {
    info!("started the job reaper");

    while !signal.is_terminating() {
        if let Err(error) = try_tick(&client).await {
            warn!("failed to reap jobs: {error}");
        }
        sleep(REAP_INTERVAL).await
    }

    info!("stopped the job reaper");
}

#[instrument(level = Level::INFO, skip_all, err(Display))]
async fn try_tick(client: &BatchClient) -> Result<()> {
    let now = Utc::now();
    for job in client.list_all().await? {
        if !should_reap(&job, now) {
            continue;
        }

        let name = job.name_any();
        info!("deleting old job: {name}");
        if let Err(error) = client.delete_named(&name).await {
            // keep going; the job gets another chance next pass
            warn!("failed to delete a job: {name}: {error}");
        }
    }
    Ok(())
}

/// A job is reaped once it is terminal and its recorded start time is
/// at least the cutoff in the past. Running jobs are never touched.
fn should_reap(job: &Job, now: DateTime<Utc>) -> bool {
    if !JobStatus::from_native(job.status.as_ref()).is_terminal() {
        return false;
    }

    match job
        .status
        .as_ref()
        .and_then(|status| status.start_time.as_ref())
    {
        Some(started) => {
            (now - started.0) >= ::chrono::Duration::seconds(REAP_CUTOFF_SECONDS)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::{
        api::batch::v1::JobStatus as JobStatusNative,
        apimachinery::pkg::apis::meta::v1::Time,
    };

    use super::*;

    fn job(active: i32, succeeded: i32, failed: i32, age_minutes: i64, now: DateTime<Utc>) -> Job {
        Job {
            status: Some(JobStatusNative {
                active: Some(active),
                succeeded: Some(succeeded),
                failed: Some(failed),
                start_time: Some(Time(now - ::chrono::Duration::minutes(age_minutes))),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn old_terminal_jobs_are_reaped() {
        let now = Utc::now();
        assert!(should_reap(&job(0, 1, 0, 31, now), now));
        assert!(should_reap(&job(0, 0, 1, 31, now), now));
    }

    #[test]
    fn young_terminal_jobs_are_kept() {
        let now = Utc::now();
        assert!(!should_reap(&job(0, 1, 0, 29, now), now));
    }

    #[test]
    fn running_jobs_are_never_reaped() {
        let now = Utc::now();
        assert!(!should_reap(&job(1, 0, 0, 600, now), now));
        // an active job stays running even with terminal counters set
        assert!(!should_reap(&job(1, 1, 1, 600, now), now));
    }

    #[test]
    fn jobs_without_a_start_time_are_kept() {
        let now = Utc::now();
        let mut job = job(0, 1, 0, 31, now);
        job.status.as_mut().unwrap().start_time = None;
        assert!(!should_reap(&job, now));
    }

    #[test]
    fn unknown_status_is_ignored() {
        let now = Utc::now();
        assert!(!should_reap(&job(0, 0, 0, 600, now), now));
        assert!(!should_reap(&Job::default(), now));
    }
}
