//! # modsecurity
//!
//! Phase-driven web application firewall inspection core in pure Rust.
//!
//! A connector (a proxy or server integration) feeds each HTTP exchange
//! through the seven inspection phases of a [`Transaction`]. Rules compiled
//! into an immutable [`RuleSet`] are evaluated as data arrives; the first
//! disruptive action is latched and reported back, and the logging phase
//! produces an [`AuditRecord`].
//!
//! ## Quick Start
//!
//! ```
//! use modsecurity::{Action, Engine, Phase, PhaseData, Rule, RuleSet, Variable};
//!
//! let rules = RuleSet::compile([Rule::builder(1001, Phase::Uri)
//!     .target(Variable::RequestFilename)
//!     .transform("lowercase")
//!     .operator("@beginsWith", "/admin")
//!     .msg("admin area")
//!     .action(Action::Deny)])?;
//!
//! let engine = Engine::with_ruleset(rules);
//! let mut tx = engine.new_transaction()?;
//! tx.advance(Phase::Connection, PhaseData::connection("10.0.0.1", 51000, "10.0.0.2", 443))?;
//! let outcome = tx.advance(Phase::Uri, PhaseData::uri("/Admin/", "GET", "HTTP/1.1"))?;
//! assert!(outcome.disrupted);
//!
//! tx.advance(Phase::Logging, PhaseData::Empty)?;
//! let audit = tx.audit_record().map(|r| r.to_json()).transpose()?;
//! assert!(audit.is_some());
//! # Ok::<(), modsecurity::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod actions;
pub mod config;
pub mod engine;
pub mod error;
pub mod operators;
pub mod transformations;
pub mod variables;

pub use actions::{Action, ActionExecutor, Outcome, SetVarOp, Severity};
pub use config::{EngineConfig, LogProperty, RuleEngineMode, ScoringConfig};
pub use engine::{
    AuditRecord, DisruptiveAction, DisruptiveKind, Engine, LogEntry, MatchEngine, MatchRecord,
    Matcher, Phase, PhaseOutcome, Rule, RuleBuilder, RuleSet, Transaction, TransactionState,
};
pub use error::{Error, Result};
pub use variables::{PhaseData, Target, Variable, VariableStore};

use once_cell::sync::Lazy;

/// Product name reported by [`identity`].
pub const PRODUCT: &str = "ModSecurity-rs";

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static PLATFORM: Lazy<String> = Lazy::new(|| {
    let os = std::env::consts::OS;
    let mut chars = os.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
});

static IDENTITY: Lazy<String> = Lazy::new(|| format!("{} v{} ({})", PRODUCT, VERSION, platform()));

/// Operating system the library was built for, capitalized (`Linux`).
pub fn platform() -> &'static str {
    &PLATFORM
}

/// Identity string, e.g. `ModSecurity-rs v0.1.0 (Linux)`.
///
/// The format only ever gains suffixes, so connectors may parse it.
pub fn identity() -> &'static str {
    &IDENTITY
}
