//! Inspection engine: rules, transactions and their results.

pub mod audit;
pub mod disruption;
pub mod match_engine;
pub mod phase;
pub mod ruleset;
pub mod scoring;
pub mod transaction;

pub use audit::{AuditRecord, LogCallback, LogEntry, MatchRecord};
pub use disruption::{DisruptiveAction, DisruptiveKind};
pub use match_engine::{MatchEngine, RuleMatch};
pub use phase::Phase;
pub use ruleset::{Matcher, Rule, RuleBuilder, RuleSet};
pub use scoring::{AnomalyScore, ScoreContribution, ANOMALY_SCORE};
pub use transaction::{PhaseOutcome, Transaction, TransactionState};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Entry point for connectors.
///
/// Holds the compiled ruleset and configuration and hands out transactions.
/// Once configured, an engine can be shared by reference across threads;
/// every transaction gets its own state.
pub struct Engine {
    ruleset: Option<Arc<RuleSet>>,
    config: Arc<EngineConfig>,
    connector: Option<String>,
    log_callback: Option<LogCallback>,
    next_id: AtomicU64,
}

impl Engine {
    /// Create an engine without rules. Transactions cannot be created
    /// until a ruleset is installed.
    pub fn new() -> Self {
        Self {
            ruleset: None,
            config: Arc::new(EngineConfig::default()),
            connector: None,
            log_callback: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create an engine with the given ruleset.
    pub fn with_ruleset(ruleset: RuleSet) -> Self {
        let mut engine = Self::new();
        engine.set_ruleset(ruleset);
        engine
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Install a ruleset. Transactions already running keep the old one.
    pub fn set_ruleset(&mut self, ruleset: RuleSet) {
        info!(rules = ruleset.rule_count(), "ruleset installed");
        self.ruleset = Some(Arc::new(ruleset));
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Installed ruleset.
    pub fn ruleset(&self) -> Option<&RuleSet> {
        self.ruleset.as_deref()
    }

    /// Number of installed rules.
    pub fn rule_count(&self) -> usize {
        self.ruleset.as_ref().map_or(0, |r| r.rule_count())
    }

    /// Start a transaction.
    pub fn new_transaction(&self) -> Result<Transaction> {
        let ruleset = self.ruleset.as_ref().ok_or(Error::NotInitialized)?;
        let id = format!("tx-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        Ok(Transaction::new(
            id,
            Arc::clone(ruleset),
            Arc::clone(&self.config),
            crate::identity(),
            self.connector.clone(),
            self.log_callback.clone(),
        ))
    }

    /// Register the callback that receives logged matches.
    ///
    /// Entries are shaped by [`EngineConfig::log_property`]. Transactions
    /// already running keep the callback they started with.
    pub fn set_log_callback<F>(&mut self, callback: F)
    where
        F: Fn(&LogEntry) + Send + Sync + 'static,
    {
        self.log_callback = Some(Arc::new(callback));
    }

    /// Product identity: `"<product> v<version> (<platform>)"`.
    pub fn identity(&self) -> &'static str {
        crate::identity()
    }

    /// Register the connector's name and version, e.g. `"nginx-connector v1.0"`.
    pub fn set_connector_info(&mut self, info: impl Into<String>) -> Result<()> {
        let info = info.into();
        if info.trim().is_empty() {
            return Err(Error::EmptyConnectorInfo);
        }
        self.connector = Some(info);
        Ok(())
    }

    /// Connector information, exactly as registered.
    pub fn connector_info(&self) -> Option<&str> {
        self.connector.as_deref()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("rule_count", &self.rule_count())
            .field("mode", &self.config.mode)
            .field("connector", &self.connector)
            .field("log_callback", &self.log_callback.is_some())
            .finish()
    }
}
