//! Warden Core - content classification cache and moderation pipeline.
//!
//! - [`scoring`]: severity → category/reason table and block threshold
//! - [`config`]: startup configuration loading and validation
//! - [`cache`]: fingerprint-keyed LRU cache with lazy TTL expiry
//! - [`classifier`]: classifier adapter trait, verdict parsing, llama.cpp backend
//! - [`moderation`]: the cache-fronted moderation orchestrator

pub mod cache;
pub mod classifier;
pub mod config;
pub mod moderation;
pub mod scoring;

pub use cache::{CacheStats, ContentFingerprint, FingerprintCache};
pub use classifier::{
    ClassifierError, ClassifierState, ContentClassifier, DisabledClassifier,
    LlamaServerClassifier, RawVerdict,
};
pub use config::{ConfigError, ModerationConfig};
pub use moderation::{
    ClassificationResult, Confidence, ContentType, ModerationError, ModerationOutcome,
    ModerationRequest, Moderator,
};
pub use scoring::{ScoringTable, ThresholdPolicy};
