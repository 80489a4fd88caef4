//! Severity scoring table and blocking threshold.
//!
//! The scoring table is the moderation taxonomy: every severity level from
//! 0 to 9 maps to exactly one category and a human-readable reason. It is
//! built once from configuration and never mutated afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Highest severity a classifier can report.
pub const MAX_SEVERITY: u8 = 9;

/// Category and reason attached to a severity level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Category name, e.g. "clean" or "toxic".
    pub category: String,
    /// Human-readable explanation returned to callers.
    pub reason: String,
}

/// Raw scoring table as it appears in the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringTableConfig {
    /// Version label of the taxonomy.
    #[serde(default = "default_version")]
    pub version: String,
    /// Entries keyed by severity.
    pub levels: BTreeMap<u8, ScoreEntry>,
}

fn default_version() -> String {
    "unversioned".to_string()
}

/// Immutable severity → {category, reason} mapping.
#[derive(Debug, Clone)]
pub struct ScoringTable {
    version: String,
    entries: Vec<ScoreEntry>,
}

impl ScoringTable {
    /// Builds a scoring table, requiring all ten levels and nothing else.
    pub fn new(
        version: impl Into<String>,
        mut levels: BTreeMap<u8, ScoreEntry>,
    ) -> Result<Self, ConfigError> {
        if let Some(&extra) = levels.keys().find(|&&s| s > MAX_SEVERITY) {
            return Err(ConfigError::Invalid(format!(
                "scoring table has level {} above maximum severity {}",
                extra, MAX_SEVERITY
            )));
        }

        let missing: Vec<String> = (0..=MAX_SEVERITY)
            .filter(|s| !levels.contains_key(s))
            .map(|s| s.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "scoring table is missing levels: {}",
                missing.join(", ")
            )));
        }

        let entries = (0..=MAX_SEVERITY)
            .filter_map(|s| levels.remove(&s))
            .collect::<Vec<_>>();

        Ok(Self {
            version: version.into(),
            entries,
        })
    }

    /// Returns the entry for a severity, clamping anything above 9.
    pub fn lookup(&self, severity: u8) -> &ScoreEntry {
        &self.entries[usize::from(severity.min(MAX_SEVERITY))]
    }

    /// Returns the taxonomy version label.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl TryFrom<ScoringTableConfig> for ScoringTable {
    type Error = ConfigError;

    fn try_from(config: ScoringTableConfig) -> Result<Self, Self::Error> {
        Self::new(config.version, config.levels)
    }
}

/// Severity thresholds applied to classifier verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThresholdPolicy {
    /// Minimum severity at which content is blocked.
    pub block_at: u8,
    /// Severity assigned to a legacy "warn" verdict.
    #[serde(default = "default_warn_severity")]
    pub warn_severity: u8,
}

fn default_warn_severity() -> u8 {
    5
}

impl ThresholdPolicy {
    /// Creates a policy, rejecting thresholds outside 0..=9.
    pub fn new(block_at: u8, warn_severity: u8) -> Result<Self, ConfigError> {
        let policy = Self {
            block_at,
            warn_severity,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Checks both thresholds are valid severities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_at > MAX_SEVERITY {
            return Err(ConfigError::Invalid(format!(
                "block_at must be between 0 and {}, got {}",
                MAX_SEVERITY, self.block_at
            )));
        }
        if self.warn_severity > MAX_SEVERITY {
            return Err(ConfigError::Invalid(format!(
                "warn_severity must be between 0 and {}, got {}",
                MAX_SEVERITY, self.warn_severity
            )));
        }
        Ok(())
    }

    /// Returns true if content of this severity is blocked.
    pub fn is_blocked(&self, severity: u8) -> bool {
        severity >= self.block_at
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn full_levels() -> BTreeMap<u8, ScoreEntry> {
        (0..=MAX_SEVERITY)
            .map(|s| {
                let category = match s {
                    0..=2 => "clean",
                    3..=4 => "borderline",
                    5..=6 => "inappropriate",
                    7..=8 => "harmful",
                    _ => "toxic",
                };
                (
                    s,
                    ScoreEntry {
                        category: category.to_string(),
                        reason: format!("level {}", s),
                    },
                )
            })
            .collect()
    }

    pub(crate) fn test_table() -> ScoringTable {
        ScoringTable::new("test", full_levels()).unwrap()
    }

    #[test]
    fn test_lookup_returns_configured_entry() {
        let table = test_table();
        assert_eq!(table.lookup(0).category, "clean");
        assert_eq!(table.lookup(7).category, "harmful");
        assert_eq!(table.lookup(9).reason, "level 9");
        assert_eq!(table.version(), "test");
    }

    #[test]
    fn test_lookup_clamps_out_of_range_severity() {
        let table = test_table();
        assert_eq!(table.lookup(42), table.lookup(9));
    }

    #[test]
    fn test_missing_level_is_rejected() {
        let mut levels = full_levels();
        levels.remove(&4);
        let err = ScoringTable::new("v1", levels).unwrap_err();
        assert!(err.to_string().contains("missing levels: 4"));
    }

    #[test]
    fn test_level_above_nine_is_rejected() {
        let mut levels = full_levels();
        levels.insert(
            10,
            ScoreEntry {
                category: "extra".to_string(),
                reason: "nope".to_string(),
            },
        );
        assert!(ScoringTable::new("v1", levels).is_err());
    }

    #[test]
    fn test_threshold_out_of_range_is_rejected() {
        assert!(ThresholdPolicy::new(10, 5).is_err());
        assert!(ThresholdPolicy::new(9, 12).is_err());
        assert!(ThresholdPolicy::new(0, 0).is_ok());
    }

    #[test]
    fn test_is_blocked_iff_severity_reaches_threshold() {
        for block_at in 0..=MAX_SEVERITY {
            let policy = ThresholdPolicy::new(block_at, 5).unwrap();
            for severity in 0..=MAX_SEVERITY {
                assert_eq!(policy.is_blocked(severity), severity >= block_at);
            }
        }
    }
}
