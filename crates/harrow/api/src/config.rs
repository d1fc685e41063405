/// Label key marking every job owned by this gateway.
pub const LABEL_APP: &str = "app";

/// Label key binding a job to the tenant that dispatched it.
/// The value is always the principal's label-safe identity.
pub const LABEL_USERNAME: &str = "username";

/// Annotation carrying the caller's display name, for audit only.
/// The value is unsanitized and must never be used for access control.
pub const ANNOTATION_CALLER: &str = "harrow.io/caller-username";

/// Backend scoping, constructed once at startup and threaded into every
/// component that talks to the cluster.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub namespace: String,
    pub app_label: String,
}

impl BatchConfig {
    pub const DEFAULT_APP_LABEL: &'static str = "harrowjob";

    pub fn new(namespace: String) -> Self {
        Self {
            namespace,
            app_label: Self::DEFAULT_APP_LABEL.into(),
        }
    }
}
