//! Audit records produced by the logging phase.

use super::disruption::DisruptiveAction;
use super::phase::Phase;
use crate::actions::Severity;
use crate::config::LogProperty;
use crate::error::Result;
use serde::Serialize;
use std::sync::Arc;

/// Receives every logged match as it happens.
pub type LogCallback = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// A logged match, in the shape selected by [`LogProperty`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LogEntry {
    /// Bracketed text line.
    Text(String),
    /// Structured record.
    RuleMessage(MatchRecord),
}

/// One matched rule, as recorded by the transaction.
///
/// For chains, `rule_id` and the matched variable are those of the head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    /// Chain head id.
    pub rule_id: u64,
    /// Phase of the match.
    pub phase: Phase,
    /// Matched variable name.
    pub matched_variable: String,
    /// Matched (transformed) value.
    pub matched_value: String,
    /// Position in the transaction's match sequence, starting at 1.
    pub ordinal: usize,
    /// Expanded `msg`.
    pub message: Option<String>,
    /// Expanded `logdata`.
    pub logdata: Option<String>,
    /// Declared severity.
    pub severity: Option<Severity>,
    /// Declared tags.
    pub tags: Vec<String>,
    /// Whether the rule asked for the match to be logged.
    pub logged: bool,
    /// Disruption the rule produced while the engine only detects.
    pub suppressed_action: Option<DisruptiveAction>,
}

impl MatchRecord {
    /// Format as a log entry.
    pub fn format_log(&self) -> String {
        let mut parts = vec![
            format!("[id \"{}\"]", self.rule_id),
            format!("[phase \"{}\"]", self.phase),
        ];

        if !self.matched_variable.is_empty() {
            parts.push(format!("[var \"{}\"]", self.matched_variable));
        }
        if let Some(ref msg) = self.message {
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
        if let Some(ref action) = self.suppressed_action {
            parts.push(format!("[suppressed \"{}\"]", action.kind));
        }

        parts.join(" ")
    }

    /// Build the log callback entry for `property`.
    ///
    /// Structured records drop the matched value unless
    /// `INCLUDE_FULL_HIGHLIGHT` is set.
    pub fn log_entry(&self, property: LogProperty) -> LogEntry {
        if !property.contains(LogProperty::RULE_MESSAGE) {
            return LogEntry::Text(self.format_log());
        }
        let mut record = self.clone();
        if !property.contains(LogProperty::INCLUDE_FULL_HIGHLIGHT) {
            record.matched_value.clear();
        }
        LogEntry::RuleMessage(record)
    }
}

/// Summary of a finished transaction.
///
/// Field order is part of the serialized format; new fields go at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Transaction id.
    pub transaction_id: String,
    /// Engine identity string.
    pub engine: String,
    /// Connector information, if the connector registered any.
    pub connector: Option<String>,
    /// Last phase processed before logging.
    pub final_phase: Phase,
    /// Whether a disruptive action was latched.
    pub disrupted: bool,
    /// The latched action.
    pub action: Option<DisruptiveAction>,
    /// Anomaly score at the end of the transaction.
    pub anomaly_score: i32,
    /// Matched rules, in match order.
    pub matches: Vec<MatchRecord>,
    /// Internal failure that aborted evaluation, if any.
    pub failure: Option<String>,
}

impl AuditRecord {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Format as a single log line.
    pub fn format_log(&self) -> String {
        let mut parts = vec![
            format!("[tx {}]", self.transaction_id),
            format!("[engine {}]", self.engine),
        ];

        if let Some(ref connector) = self.connector {
            parts.push(format!("[connector {}]", connector));
        }
        parts.push(format!("[phase {}]", self.final_phase));

        match self.action {
            Some(ref action) => {
                parts.push(format!("[action {}]", action.kind));
                parts.push(format!("[status {}]", action.status));
                parts.push(format!("[rule_id {}]", action.rule_id));
            }
            None => parts.push("[action none]".to_string()),
        }

        parts.push(format!("[score {}]", self.anomaly_score));
        if !self.matches.is_empty() {
            let ids: Vec<String> = self.matches.iter().map(|m| m.rule_id.to_string()).collect();
            parts.push(format!("[matches {}]", ids.join(", ")));
        }
        if let Some(ref failure) = self.failure {
            parts.push(format!("[failure {}]", failure));
        }

        parts.join(" ")
    }
}
