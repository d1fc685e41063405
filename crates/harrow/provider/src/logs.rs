use futures::AsyncReadExt;
use harrow_api::{error::JobError, principal::Principal};
use kube::{
    api::{ListParams, LogParams},
    ResourceExt,
};
use tracing::{instrument, Level};

use crate::client::BatchClient;

/// The marker prefixing a job's single structured result line.
const OUTPUT_MARKER: &str = "[out] ";

impl BatchClient {
    /// Fetches the full log of the pod backing a job. Pods inherit the
    /// job's name as a prefix, which is how the pod is located.
    #[instrument(level = Level::INFO, skip(self, principal), err(Display))]
    pub async fn logs(&self, uid: &str, principal: Option<&Principal>) -> Result<String, JobError> {
        let job = self.get_by_id(uid, principal).await?;
        let job_name = job.name_any();

        let pods = self
            .pods()
            .list(&ListParams::default())
            .await
            .map_err(JobError::Backend)?;
        let pod_name = pods
            .items
            .iter()
            .map(ResourceExt::name_any)
            .find(|name| name.starts_with(&job_name))
            .ok_or(JobError::PodNotFound(job_name))?;

        let stream = self
            .pods()
            .log_stream(&pod_name, &LogParams::default())
            .await
            .map_err(JobError::StreamOpenFailed)?;
        ::futures::pin_mut!(stream);

        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(JobError::CopyFailed)?;

        // intermediate transport layers may have escaped the output
        let text = String::from_utf8_lossy(&buf);
        Ok(::html_escape::decode_html_entities(&text).into_owned())
    }
}

/// Reduces a raw log to the last line carrying the output marker, with
/// the marker stripped. Callers expecting a single structured result
/// line use this instead of the full log.
pub fn extract_result_line(log: &str) -> Option<String> {
    log.lines()
        .filter(|line| line.contains(OUTPUT_MARKER))
        .next_back()
        .map(|line| line.replace(OUTPUT_MARKER, ""))
}
