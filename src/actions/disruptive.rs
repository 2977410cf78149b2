//! Status resolution for disruptive actions.

use crate::config::EngineConfig;
use crate::engine::DisruptiveKind;

/// Final HTTP status for a disruptive kind.
///
/// An explicit `status` action wins for deny and block, and for redirect
/// when it is a 3xx code.
pub fn status_for(kind: DisruptiveKind, explicit: Option<u16>, config: &EngineConfig) -> u16 {
    match kind {
        DisruptiveKind::Deny | DisruptiveKind::Block => explicit.unwrap_or(config.default_status),
        DisruptiveKind::Redirect => explicit
            .filter(|s| (300..400).contains(s))
            .unwrap_or(config.redirect_status),
        DisruptiveKind::Drop => config.drop_status,
        DisruptiveKind::Allow => 200,
    }
}
