//! Error types for the inspection core.

use crate::engine::{DisruptiveAction, Phase};
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rule compilation and transaction processing.
#[derive(Debug, Error)]
pub enum Error {
    /// Two rules (or chain links) share the same id.
    #[error("duplicate rule id: {id}")]
    DuplicateRuleId {
        /// The duplicate ID.
        id: u64,
    },

    /// Error compiling a regex pattern.
    #[error("invalid regex pattern '{pattern}': {source}")]
    RegexCompile {
        /// The pattern that failed to compile.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// Error compiling an Aho-Corasick pattern set.
    #[error("invalid pattern set: {message}")]
    PatternSet {
        /// Error message.
        message: String,
    },

    /// Error parsing an IP address or network.
    #[error("invalid IP address or network '{value}': {message}")]
    InvalidIp {
        /// The value that failed to parse.
        value: String,
        /// Error message.
        message: String,
    },

    /// Operator argument rejected at compile time.
    #[error("invalid argument for operator @{operator}: {message}")]
    InvalidOperatorArgument {
        /// Operator name.
        operator: String,
        /// Error message.
        message: String,
    },

    /// Unknown operator name.
    #[error("unknown operator: @{name}")]
    UnknownOperator {
        /// The unknown operator name.
        name: String,
    },

    /// Unknown variable name.
    #[error("unknown variable: {name}")]
    UnknownVariable {
        /// The unknown variable name.
        name: String,
    },

    /// A target expression could not be applied.
    #[error("invalid target '{spec}': {message}")]
    InvalidTarget {
        /// The target expression.
        spec: String,
        /// What was wrong.
        message: String,
    },

    /// Unknown transformation name.
    #[error("unknown transformation: t:{name}")]
    UnknownTransformation {
        /// The unknown transformation name.
        name: String,
    },

    /// An action argument could not be interpreted.
    #[error("invalid {action} action: {message}")]
    InvalidAction {
        /// Action name.
        action: &'static str,
        /// What was wrong.
        message: String,
    },

    /// A rule declares more than one disruptive action.
    #[error("rule {id} declares more than one disruptive action")]
    ConflictingDisruptiveActions {
        /// Offending rule.
        id: u64,
    },

    /// A non-final chain link carries actions.
    #[error("chain link {id} is not the last link but declares actions")]
    InvalidChainLink {
        /// Offending link.
        id: u64,
    },

    /// A logging-phase rule declares a disruptive action.
    #[error("rule {id} runs in the logging phase and cannot be disruptive")]
    DisruptiveInLoggingPhase {
        /// Offending rule.
        id: u64,
    },

    /// A conditional rule has nothing to inspect.
    #[error("rule {id} has an operator but no targets")]
    MissingTargets {
        /// Offending rule.
        id: u64,
    },

    /// The engine has no compiled ruleset.
    #[error("engine has no compiled ruleset")]
    NotInitialized,

    /// `advance` was called out of sequence.
    #[error("invalid phase order: transaction is at {current}, cannot advance to {requested}")]
    InvalidPhaseOrder {
        /// Phase the transaction is at.
        current: Phase,
        /// Phase the caller asked for.
        requested: Phase,
    },

    /// `advance` was called after a disruptive action was latched.
    #[error("transaction already disrupted by rule {} ({:?})", action.rule_id, action.kind)]
    AlreadyDisrupted {
        /// The latched action.
        action: DisruptiveAction,
    },

    /// The transaction finished its logging phase.
    #[error("transaction already completed")]
    TransactionCompleted,

    /// The data bundle does not belong to the phase.
    #[error("{data} data cannot be supplied to the {phase} phase")]
    PhaseDataMismatch {
        /// Phase the data was supplied to.
        phase: Phase,
        /// Kind of data supplied.
        data: &'static str,
    },

    /// Matching failed at evaluation time.
    #[error("internal match failure in rule {rule_id}: {message}")]
    InternalMatchFailure {
        /// Rule being evaluated.
        rule_id: u64,
        /// Error message.
        message: String,
    },

    /// Connector information must be non-empty.
    #[error("connector information must not be empty")]
    EmptyConnectorInfo,

    /// Audit record serialization failed.
    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error can only be produced while compiling a ruleset.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            Error::DuplicateRuleId { .. }
                | Error::RegexCompile { .. }
                | Error::PatternSet { .. }
                | Error::InvalidIp { .. }
                | Error::InvalidOperatorArgument { .. }
                | Error::UnknownOperator { .. }
                | Error::UnknownVariable { .. }
                | Error::InvalidTarget { .. }
                | Error::UnknownTransformation { .. }
                | Error::InvalidAction { .. }
                | Error::ConflictingDisruptiveActions { .. }
                | Error::InvalidChainLink { .. }
                | Error::DisruptiveInLoggingPhase { .. }
                | Error::MissingTargets { .. }
        )
    }

    /// Whether the error ends the transaction that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::InternalMatchFailure { .. })
    }

    /// The latched action, when the error reports a prior disruption.
    pub fn disruption(&self) -> Option<&DisruptiveAction> {
        match self {
            Error::AlreadyDisrupted { action } => Some(action),
            _ => None,
        }
    }
}
