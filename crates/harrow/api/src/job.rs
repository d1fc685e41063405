use k8s_openapi::api::batch::v1::{Job, JobStatus as JobStatusNative};
use kube::ResourceExt;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A read-only view of a dispatched job, recomputed on every query.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobInfo {
    pub uid: String,
    pub name: String,
    pub status: JobStatus,
}

impl JobInfo {
    pub fn from_job(job: &Job) -> Self {
        Self {
            uid: job.uid().unwrap_or_default(),
            name: job.name_any(),
            status: JobStatus::from_native(job.status.as_ref()),
        }
    }
}

#[derive(
    Copy, Clone, Debug, Display, EnumString, PartialEq, Eq, Serialize, Deserialize,
)]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    /// Maps the backend counters with a strict priority: a record can
    /// transiently report multiple non-zero counters during transition,
    /// so "still active" dominates the terminal ones.
    pub fn from_native(status: Option<&JobStatusNative>) -> Self {
        let count = |counter: fn(&JobStatusNative) -> Option<i32>| {
            status.and_then(counter).unwrap_or_default()
        };

        if count(|status| status.active) >= 1 {
            Self::Running
        } else if count(|status| status.succeeded) >= 1 {
            Self::Completed
        } else if count(|status| status.failed) >= 1 {
            Self::Failed
        } else {
            Self::Unknown
        }
    }

    /// Terminal states expect no further transition.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(active: i32, succeeded: i32, failed: i32) -> JobStatusNative {
        JobStatusNative {
            active: Some(active),
            succeeded: Some(succeeded),
            failed: Some(failed),
            ..Default::default()
        }
    }

    #[test]
    fn active_dominates_terminal_counters() {
        let status = native(1, 1, 0);
        assert_eq!(JobStatus::from_native(Some(&status)), JobStatus::Running);
    }

    #[test]
    fn succeeded_dominates_failed() {
        let status = native(0, 1, 1);
        assert_eq!(JobStatus::from_native(Some(&status)), JobStatus::Completed);
    }

    #[test]
    fn failed_when_only_failures() {
        let status = native(0, 0, 2);
        assert_eq!(JobStatus::from_native(Some(&status)), JobStatus::Failed);
    }

    #[test]
    fn unknown_when_all_counters_are_zero() {
        let status = native(0, 0, 0);
        assert_eq!(JobStatus::from_native(Some(&status)), JobStatus::Unknown);
        assert_eq!(JobStatus::from_native(None), JobStatus::Unknown);
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Unknown.is_terminal());
    }
}
