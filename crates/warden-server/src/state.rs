//! Application state for the API server.

use std::sync::Arc;

use warden_core::{ConfigError, ContentClassifier, ModerationConfig, Moderator};

/// Shared application state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Cache-fronted moderation pipeline.
    pub moderator: Arc<Moderator>,
}

impl AppState {
    /// Creates application state around an existing moderator.
    pub fn new(moderator: Moderator) -> Self {
        Self {
            moderator: Arc::new(moderator),
        }
    }

    /// Builds the moderator from configuration and a classifier.
    pub fn from_config(
        config: &ModerationConfig,
        classifier: Arc<dyn ContentClassifier>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(Moderator::new(config, classifier)?))
    }
}
