use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read the action config ({path}): {source}")]
    Unreadable {
        path: String,
        #[source]
        source: ::std::io::Error,
    },
    #[error("failed to parse the action config ({path}): {source}")]
    Malformed {
        path: String,
        #[source]
        source: ::serde_json::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no such action: {0}")]
    UnknownAction(String),
    #[error("duplicated action in the config: {0}")]
    AmbiguousAction(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    TokenMissing,
    #[error("failed to verify the bearer token: {0}")]
    TokenInvalid(String),
    #[error("the token carries no usable identity")]
    NoIdentity,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encode the input payload: {0}")]
    Input(#[source] ::serde_json::Error),
    #[error("failed to submit the job: {0}")]
    SubmissionFailed(#[source] ::kube::Error),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),
    #[error("no pod found for the job: {0}")]
    PodNotFound(String),
    #[error("failed to query the backend: {0}")]
    Backend(#[source] ::kube::Error),
    #[error("failed to open the log stream: {0}")]
    StreamOpenFailed(#[source] ::kube::Error),
    #[error("failed to copy the log stream: {0}")]
    CopyFailed(#[source] ::std::io::Error),
}
