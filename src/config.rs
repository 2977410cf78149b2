//! Engine configuration.
//!
//! Configuration is supplied programmatically by the connector; it derives
//! serde traits so connectors can embed it in their own config files.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Rule engine operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleEngineMode {
    /// Rules are enabled and will block.
    On,
    /// Rules are enabled but will only detect.
    DetectionOnly,
    /// Rules are disabled.
    Off,
}

impl Default for RuleEngineMode {
    fn default() -> Self {
        RuleEngineMode::On
    }
}

/// Anomaly points contributed per rule severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Critical severity score (severity 0-2).
    pub critical: i32,
    /// Error severity score.
    pub error: i32,
    /// Warning severity score.
    pub warning: i32,
    /// Notice severity score.
    pub notice: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            critical: 5,
            error: 4,
            warning: 3,
            notice: 2,
        }
    }
}

impl ScoringConfig {
    /// Get score for severity level.
    pub fn score_for_severity(&self, severity: u8) -> i32 {
        match severity {
            0..=2 => self.critical,
            3 => self.error,
            4 => self.warning,
            5 => self.notice,
            _ => 0,
        }
    }
}

/// Shape of the entries handed to the engine's log callback.
///
/// Flags combine with `|`. `INCLUDE_FULL_HIGHLIGHT` only has an effect
/// together with `RULE_MESSAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogProperty(u8);

impl LogProperty {
    /// Bracketed text line, as written to a server error log.
    pub const TEXT: LogProperty = LogProperty(1);
    /// Structured match record instead of text.
    pub const RULE_MESSAGE: LogProperty = LogProperty(2);
    /// Keep the matched value (the highlight) in structured records.
    pub const INCLUDE_FULL_HIGHLIGHT: LogProperty = LogProperty(4);

    /// Raw flag bits.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag of `other` is set.
    pub fn contains(self, other: LogProperty) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for LogProperty {
    fn default() -> Self {
        LogProperty::TEXT
    }
}

impl BitOr for LogProperty {
    type Output = LogProperty;

    fn bitor(self, rhs: LogProperty) -> LogProperty {
        LogProperty(self.0 | rhs.0)
    }
}

/// Engine-wide settings shared by every transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Operating mode.
    pub mode: RuleEngineMode,
    /// Status for `deny`/`block` without an explicit `status`.
    pub default_status: u16,
    /// Status reported for redirects.
    pub redirect_status: u16,
    /// Status reported for dropped connections.
    pub drop_status: u16,
    /// Severity scoring table.
    pub scoring: ScoringConfig,
    /// Log callback entry shape.
    pub log_property: LogProperty,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: RuleEngineMode::On,
            default_status: 403,
            redirect_status: 302,
            drop_status: 444,
            scoring: ScoringConfig::default(),
            log_property: LogProperty::default(),
        }
    }
}
