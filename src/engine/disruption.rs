//! Disruptive decisions reported to the connector.

use super::phase::Phase;
use serde::Serialize;
use std::fmt;

/// What the connector is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisruptiveKind {
    /// Block with the configured default response.
    Block,
    /// Deny with a status code.
    Deny,
    /// Redirect to a URL.
    Redirect,
    /// Close the connection without a response.
    Drop,
    /// Stop inspecting the current phase. Never latched.
    Allow,
}

impl DisruptiveKind {
    /// Lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            DisruptiveKind::Block => "block",
            DisruptiveKind::Deny => "deny",
            DisruptiveKind::Redirect => "redirect",
            DisruptiveKind::Drop => "drop",
            DisruptiveKind::Allow => "allow",
        }
    }

    /// Whether this kind ends the transaction once latched.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisruptiveKind::Allow)
    }
}

impl fmt::Display for DisruptiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A latched disruptive decision.
///
/// At most one exists per transaction; for chains `rule_id` is the head id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisruptiveAction {
    /// Decision kind.
    pub kind: DisruptiveKind,
    /// Rule that produced it.
    pub rule_id: u64,
    /// Phase it was produced in.
    pub phase: Phase,
    /// Human-readable reason (the rule message when present).
    pub reason: String,
    /// HTTP status to respond with.
    pub status: u16,
    /// Redirect target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DisruptiveAction {
    /// Whether the connector should close the connection.
    pub fn drops_connection(&self) -> bool {
        self.kind == DisruptiveKind::Drop
    }

    /// Format as a log entry.
    pub fn format_log(&self) -> String {
        let mut parts = vec![
            format!("[action {}]", self.kind),
            format!("[status {}]", self.status),
            format!("[id {}]", self.rule_id),
            format!("[phase {}]", self.phase),
        ];

        if let Some(ref url) = self.url {
            parts.push(format!("[redirect {}]", url));
        }
        if !self.reason.is_empty() {
            parts.push(format!("[msg {}]", self.reason));
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deny() -> DisruptiveAction {
        DisruptiveAction {
            kind: DisruptiveKind::Deny,
            rule_id: 942100,
            phase: Phase::RequestHeaders,
            reason: "SQL Injection".to_string(),
            status: 403,
            url: None,
        }
    }

    #[test]
    fn test_format_log() {
        assert_eq!(
            deny().format_log(),
            "[action deny] [status 403] [id 942100] [phase REQUEST_HEADERS] [msg SQL Injection]"
        );
    }

    #[test]
    fn test_serialize_omits_missing_url() {
        let json = serde_json::to_string(&deny()).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"kind":"deny","rule_id":942100,"phase":"REQUEST_HEADERS","#,
                r#""reason":"SQL Injection","status":403}"#
            )
        );
    }

    #[test]
    fn test_kinds() {
        assert!(DisruptiveKind::Deny.is_terminal());
        assert!(!DisruptiveKind::Allow.is_terminal());
        let drop = DisruptiveAction {
            kind: DisruptiveKind::Drop,
            status: 444,
            ..deny()
        };
        assert!(drop.drops_connection());
    }
}
