//! Metadata actions (msg, logdata, severity, tag) and their log rendering.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Syslog-style severity carried by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Severity {
    /// 0
    Emergency = 0,
    /// 1
    Alert = 1,
    /// 2
    Critical = 2,
    /// 3
    Error = 3,
    /// 4
    Warning = 4,
    /// 5
    Notice = 5,
    /// 6
    Info = 6,
    /// 7
    Debug = 7,
}

impl From<u8> for Severity {
    fn from(value: u8) -> Self {
        match value {
            0 => Severity::Emergency,
            1 => Severity::Alert,
            2 => Severity::Critical,
            3 => Severity::Error,
            4 => Severity::Warning,
            5 => Severity::Notice,
            6 => Severity::Info,
            _ => Severity::Debug,
        }
    }
}

impl Severity {
    /// Numeric level.
    pub fn level(&self) -> u8 {
        *self as u8
    }

    /// Upper-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Emergency => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
        }
    }

    /// Parse a name (`CRITICAL`) or a digit (`2`).
    pub fn from_name(name: &str) -> Option<Self> {
        if let Ok(level) = name.parse::<u8>() {
            return (level <= 7).then(|| Severity::from(level));
        }
        let severity = match name.to_ascii_uppercase().as_str() {
            "EMERGENCY" => Severity::Emergency,
            "ALERT" => Severity::Alert,
            "CRITICAL" => Severity::Critical,
            "ERROR" => Severity::Error,
            "WARNING" => Severity::Warning,
            "NOTICE" => Severity::Notice,
            "INFO" => Severity::Info,
            "DEBUG" => Severity::Debug,
            _ => return None,
        };
        Some(severity)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Annotations gathered from a rule's actions, with macros expanded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMetadata {
    /// Rule message.
    pub msg: Option<String>,
    /// Extra log data.
    pub logdata: Option<String>,
    /// Severity.
    pub severity: Option<Severity>,
    /// Tags in declared order.
    pub tags: Vec<String>,
    /// Whether the match is logged (`log`/`nolog`, last wins).
    pub log: bool,
}

impl RuleMetadata {
    /// Render as `[key "value"]` pairs.
    pub fn format_log(&self, rule_id: u64) -> String {
        let mut parts = vec![format!("[id \"{}\"]", rule_id)];

        if let Some(ref msg) = self.msg {
            parts.push(format!("[msg \"{}\"]", msg));
        }
        if let Some(ref data) = self.logdata {
            parts.push(format!("[data \"{}\"]", data));
        }
        if let Some(sev) = self.severity {
            parts.push(format!("[severity \"{}\"]", sev));
        }
        for tag in &self.tags {
            parts.push(format!("[tag \"{}\"]", tag));
        }

        parts.join(" ")
    }
}
