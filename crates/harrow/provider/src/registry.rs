use std::fs;

use harrow_api::{
    action::ActionTemplate,
    error::{ConfigError, ResolveError},
};
use tracing::{instrument, Level};

/// The set of dispatchable action templates, loaded once at startup.
#[derive(Clone, Debug)]
pub struct ActionRegistry {
    templates: Vec<ActionTemplate>,
}

impl ActionRegistry {
    pub fn new(templates: Vec<ActionTemplate>) -> Self {
        Self { templates }
    }

    #[instrument(level = Level::INFO, err(Display))]
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let data = fs::read(path).map_err(|source| ConfigError::Unreadable {
            path: path.into(),
            source,
        })?;
        let templates = ::serde_json::from_slice(&data).map_err(|source| ConfigError::Malformed {
            path: path.into(),
            source,
        })?;
        Ok(Self::new(templates))
    }

    /// Resolves an action by exact name. A duplicate match is a
    /// configuration defect, not a caller error.
    pub fn resolve(&self, action: &str) -> Result<&ActionTemplate, ResolveError> {
        let mut matches = self
            .templates
            .iter()
            .filter(|template| template.action == action);

        match (matches.next(), matches.next()) {
            (Some(template), None) => Ok(template),
            (Some(_), Some(_)) => Err(ResolveError::AmbiguousAction(action.into())),
            (None, _) => Err(ResolveError::UnknownAction(action.into())),
        }
    }
}
