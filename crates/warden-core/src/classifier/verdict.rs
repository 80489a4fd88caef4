//! Raw classifier verdicts and the parsers that extract them from free text.
//!
//! Two encodings are supported side by side: a single severity digit, and
//! the older ok/warn/block keywords. Free-form responses go through
//! [`ParseStrategy::PIPELINE`] in order; the first strategy that produces a
//! verdict wins.

use serde::{Deserialize, Serialize};

use crate::scoring::{ThresholdPolicy, MAX_SEVERITY};

/// Older three-tier verdict encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegacyVerdict {
    Ok,
    Warn,
    Block,
}

/// Verdict returned by a classifier before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawVerdict {
    /// Severity from 0 to 9.
    Severity(u8),
    /// Legacy ok/warn/block signal.
    Legacy(LegacyVerdict),
}

impl RawVerdict {
    /// Builds a severity verdict, clamping to 0..=9.
    pub fn severity(value: u32) -> Self {
        Self::Severity(value.min(u32::from(MAX_SEVERITY)) as u8)
    }

    /// Resolves the verdict to a severity under the given policy.
    ///
    /// Legacy "block" maps to the block threshold and "warn" to the
    /// configured warn severity.
    pub fn resolve(self, policy: &ThresholdPolicy) -> u8 {
        match self {
            RawVerdict::Severity(s) => s.min(MAX_SEVERITY),
            RawVerdict::Legacy(LegacyVerdict::Ok) => 0,
            RawVerdict::Legacy(LegacyVerdict::Warn) => policy.warn_severity,
            RawVerdict::Legacy(LegacyVerdict::Block) => policy.block_at,
        }
    }
}

/// A single way of reading a verdict out of classifier text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// First decimal digit anywhere in the text.
    DigitScan,
    /// Leading "block"/"warn" keyword; anything else is ok.
    KeywordMatch,
}

impl ParseStrategy {
    /// Strategies applied to free-form responses, in order.
    pub const PIPELINE: &'static [ParseStrategy] =
        &[ParseStrategy::DigitScan, ParseStrategy::KeywordMatch];

    /// Applies this strategy, returning `None` if it does not apply.
    pub fn apply(self, text: &str) -> Option<RawVerdict> {
        match self {
            ParseStrategy::DigitScan => text
                .chars()
                .find_map(|c| c.to_digit(10))
                .map(RawVerdict::severity),
            ParseStrategy::KeywordMatch => {
                let normalized = text.trim().to_lowercase();
                let verdict = if normalized.starts_with("block") {
                    LegacyVerdict::Block
                } else if normalized.starts_with("warn") {
                    LegacyVerdict::Warn
                } else {
                    LegacyVerdict::Ok
                };
                Some(RawVerdict::Legacy(verdict))
            }
        }
    }
}

/// Parses free-form classifier output through the strategy pipeline.
pub fn parse_verdict(text: &str) -> RawVerdict {
    ParseStrategy::PIPELINE
        .iter()
        .find_map(|strategy| strategy.apply(text))
        .unwrap_or(RawVerdict::Legacy(LegacyVerdict::Ok))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ThresholdPolicy {
        ThresholdPolicy::new(8, 4).unwrap()
    }

    #[test]
    fn test_first_digit_wins() {
        assert_eq!(parse_verdict("7 — high severity"), RawVerdict::Severity(7));
        assert_eq!(parse_verdict("severity: 3/9"), RawVerdict::Severity(3));
        assert_eq!(parse_verdict("0"), RawVerdict::Severity(0));
    }

    #[test]
    fn test_digits_take_precedence_over_keywords() {
        assert_eq!(parse_verdict("block 2"), RawVerdict::Severity(2));
    }

    #[test]
    fn test_keyword_fallback() {
        assert_eq!(
            parse_verdict("Block."),
            RawVerdict::Legacy(LegacyVerdict::Block)
        );
        assert_eq!(
            parse_verdict("  warn"),
            RawVerdict::Legacy(LegacyVerdict::Warn)
        );
        assert_eq!(parse_verdict("ok"), RawVerdict::Legacy(LegacyVerdict::Ok));
        assert_eq!(
            parse_verdict("I cannot decide"),
            RawVerdict::Legacy(LegacyVerdict::Ok)
        );
        assert_eq!(parse_verdict(""), RawVerdict::Legacy(LegacyVerdict::Ok));
    }

    #[test]
    fn test_keyword_must_lead_the_response() {
        assert_eq!(
            parse_verdict("do not block"),
            RawVerdict::Legacy(LegacyVerdict::Ok)
        );
    }

    #[test]
    fn test_severity_constructor_clamps() {
        assert_eq!(RawVerdict::severity(42), RawVerdict::Severity(9));
        assert_eq!(RawVerdict::severity(4), RawVerdict::Severity(4));
    }

    #[test]
    fn test_legacy_verdicts_resolve_through_policy() {
        let policy = policy();
        assert_eq!(RawVerdict::Legacy(LegacyVerdict::Ok).resolve(&policy), 0);
        assert_eq!(RawVerdict::Legacy(LegacyVerdict::Warn).resolve(&policy), 4);
        assert_eq!(RawVerdict::Legacy(LegacyVerdict::Block).resolve(&policy), 8);
        assert_eq!(RawVerdict::Severity(6).resolve(&policy), 6);
    }
}
