use serde_json::Value;

/// A tenant identity resolved from a bearer credential.
/// Created per-request and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    /// The untrusted identity extracted from the credential's claims,
    /// after `@` => `_` normalization.
    pub raw: String,
    /// The backend-legal derivative of `raw`, used as a label value.
    pub label_safe: String,
}

/// Everything needed to materialize a job.
#[derive(Clone, Debug)]
pub struct DispatchRequest {
    pub action: String,
    pub input: Value,
    pub access_format: String,
    pub access_token: String,
    pub caller_user_name: String,
    pub principal: Principal,
}

impl DispatchRequest {
    pub const DEFAULT_ACCESS_FORMAT: &'static str = "presigned_url";
}
