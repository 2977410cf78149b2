//! Request processing phases.

use serde::{Deserialize, Serialize};

/// Inspection phases, in the fixed order a transaction visits them.
///
/// Connectors must drive every phase even when they do not segment traffic
/// that way; skipping one is reported as a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Phase {
    /// Connection established, before the virtual host is resolved.
    Connection = 0,
    /// Full request URI acknowledged.
    Uri = 1,
    /// All request headers available, body not yet received.
    RequestHeaders = 2,
    /// Request body, possibly streamed in chunks.
    RequestBody = 3,
    /// Response headers about to be delivered.
    ResponseHeaders = 4,
    /// Response body, possibly streamed in chunks.
    ResponseBody = 5,
    /// Final bookkeeping. Produces the audit record, never an action.
    Logging = 6,
}

impl Phase {
    /// Get the phase number.
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Get phase name.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Connection => "CONNECTION",
            Phase::Uri => "URI",
            Phase::RequestHeaders => "REQUEST_HEADERS",
            Phase::RequestBody => "REQUEST_BODY",
            Phase::ResponseHeaders => "RESPONSE_HEADERS",
            Phase::ResponseBody => "RESPONSE_BODY",
            Phase::Logging => "LOGGING",
        }
    }

    /// Create from phase number.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            0 => Some(Phase::Connection),
            1 => Some(Phase::Uri),
            2 => Some(Phase::RequestHeaders),
            3 => Some(Phase::RequestBody),
            4 => Some(Phase::ResponseHeaders),
            5 => Some(Phase::ResponseBody),
            6 => Some(Phase::Logging),
            _ => None,
        }
    }

    /// Get all phases in order.
    pub fn all() -> &'static [Phase] {
        &[
            Phase::Connection,
            Phase::Uri,
            Phase::RequestHeaders,
            Phase::RequestBody,
            Phase::ResponseHeaders,
            Phase::ResponseBody,
            Phase::Logging,
        ]
    }

    /// The phase that directly follows this one.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Connection => Some(Phase::Uri),
            Phase::Uri => Some(Phase::RequestHeaders),
            Phase::RequestHeaders => Some(Phase::RequestBody),
            Phase::RequestBody => Some(Phase::ResponseHeaders),
            Phase::ResponseHeaders => Some(Phase::ResponseBody),
            Phase::ResponseBody => Some(Phase::Logging),
            Phase::Logging => None,
        }
    }

    /// Check if this is a request phase.
    pub fn is_request_phase(&self) -> bool {
        matches!(
            self,
            Phase::Connection | Phase::Uri | Phase::RequestHeaders | Phase::RequestBody
        )
    }

    /// Check if this is a response phase.
    pub fn is_response_phase(&self) -> bool {
        matches!(self, Phase::ResponseHeaders | Phase::ResponseBody)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Connection
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Phase {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Phase::from_number(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_number() {
        assert_eq!(Phase::Connection.number(), 0);
        assert_eq!(Phase::RequestBody.number(), 3);
        assert_eq!(Phase::Logging.number(), 6);
    }

    #[test]
    fn test_phase_from_number() {
        assert_eq!(Phase::from_number(1), Some(Phase::Uri));
        assert_eq!(Phase::from_number(6), Some(Phase::Logging));
        assert_eq!(Phase::from_number(7), None);
    }

    #[test]
    fn test_order_matches_next() {
        let all = Phase::all();
        for pair in all.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
        }
        assert_eq!(Phase::Logging.next(), None);
    }

    #[test]
    fn test_is_request_phase() {
        assert!(Phase::Uri.is_request_phase());
        assert!(Phase::RequestBody.is_request_phase());
        assert!(!Phase::ResponseHeaders.is_request_phase());
        assert!(Phase::ResponseBody.is_response_phase());
        assert!(!Phase::Logging.is_response_phase());
    }

    #[test]
    fn test_serializes_by_name() {
        let json = serde_json::to_string(&Phase::RequestHeaders).unwrap();
        assert_eq!(json, "\"REQUEST_HEADERS\"");
    }
}
