//! Classifier adapters.
//!
//! A classifier turns text into a [`RawVerdict`] or fails. Every failure is
//! treated as "unavailable" by the moderation pipeline: it is reported to the
//! caller as a degraded result and never cached.

mod llama;
mod verdict;

use async_trait::async_trait;
use thiserror::Error;

pub use llama::{ClassifierState, LlamaServerClassifier, LoadedModel};
pub use verdict::{parse_verdict, LegacyVerdict, ParseStrategy, RawVerdict};

/// Reasons a classifier could not produce a verdict.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No backend is loaded.
    #[error("classifier not loaded: {0}")]
    NotLoaded(String),

    /// The backend could not be reached or timed out.
    #[error("classifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with something unusable.
    #[error("malformed classifier response: {0}")]
    MalformedResponse(String),

    /// The backend reported an inference failure.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Scoring function consumed by the moderation pipeline.
///
/// Implementations must be safe to call from many requests at once and must
/// not rely on callers holding any lock.
#[async_trait]
pub trait ContentClassifier: Send + Sync {
    /// Classifies at most the first `max_chars` characters of `text`.
    async fn classify(&self, text: &str, max_chars: usize) -> Result<RawVerdict, ClassifierError>;

    /// Name reported as `modelUsed` for fresh classifications.
    fn name(&self) -> &str;

    /// Returns true if the backend is currently loaded.
    fn is_loaded(&self) -> bool;

    /// Loads the backend and runs one throwaway classification.
    async fn warm_up(&self) -> Result<(), ClassifierError> {
        self.classify("hello", 16).await.map(|_| ())
    }
}

/// Classifier used when no backend is configured. Always unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledClassifier;

#[async_trait]
impl ContentClassifier for DisabledClassifier {
    async fn classify(&self, _text: &str, _max_chars: usize) -> Result<RawVerdict, ClassifierError> {
        Err(ClassifierError::NotLoaded(
            "no classifier backend configured".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "none"
    }

    fn is_loaded(&self) -> bool {
        false
    }
}

/// Truncates text to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_classifier_is_unavailable() {
        let classifier = DisabledClassifier;
        assert!(!classifier.is_loaded());
        assert_eq!(classifier.name(), "none");

        let result = tokio_test::block_on(classifier.classify("anything", 500));
        assert!(matches!(result, Err(ClassifierError::NotLoaded(_))));
        assert!(tokio_test::block_on(classifier.warm_up()).is_err());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
