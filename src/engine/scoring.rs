//! Anomaly scoring.

use crate::variables::{MutableCollection, TxCollection};
use serde::Serialize;

/// TX variable mirroring the transaction's anomaly score.
pub const ANOMALY_SCORE: &str = "anomaly_score";

/// Points added by one rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreContribution {
    /// Contributing rule.
    pub rule_id: u64,
    /// Points added (may be negative).
    pub points: i32,
}

/// Accumulated anomaly score of a transaction.
///
/// The total is mirrored into `TX:anomaly_score` so rules can inspect it,
/// and re-read from there so `setvar` adjustments are honoured.
#[derive(Debug, Clone, Default)]
pub struct AnomalyScore {
    total: i32,
    contributions: Vec<ScoreContribution>,
}

impl AnomalyScore {
    /// Create a new anomaly score tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current total.
    pub fn total(&self) -> i32 {
        self.total
    }

    /// Scoring actions in the order they ran.
    pub fn contributions(&self) -> &[ScoreContribution] {
        &self.contributions
    }

    /// Add points on behalf of a rule.
    pub fn add(&mut self, rule_id: u64, points: i32) {
        self.total = self.total.saturating_add(points);
        self.contributions.push(ScoreContribution { rule_id, points });
    }

    /// Check if a threshold is reached.
    pub fn exceeds(&self, threshold: i32) -> bool {
        self.total >= threshold
    }

    /// Write the total to TX.
    pub fn sync_to_tx(&self, tx: &mut TxCollection) {
        tx.set(ANOMALY_SCORE, self.total.to_string());
    }

    /// Pick up changes made to the TX mirror by `setvar`.
    pub fn sync_from_tx(&mut self, tx: &TxCollection) {
        if tx.value(ANOMALY_SCORE).is_some() {
            self.total = tx.int(ANOMALY_SCORE).clamp(i32::MIN.into(), i32::MAX.into()) as i32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_score() {
        let mut score = AnomalyScore::new();
        score.add(942100, 5);
        score.add(920350, 3);
        assert_eq!(score.total(), 8);
        assert!(score.exceeds(5));
        assert!(!score.exceeds(10));
        assert_eq!(score.contributions()[1], ScoreContribution { rule_id: 920350, points: 3 });
    }

    #[test]
    fn test_tx_mirror() {
        let mut score = AnomalyScore::new();
        let mut tx = TxCollection::new();
        score.add(1, 5);
        score.sync_to_tx(&mut tx);
        assert_eq!(tx.value(ANOMALY_SCORE), Some("5"));

        tx.increment(ANOMALY_SCORE, 2);
        score.sync_from_tx(&tx);
        assert_eq!(score.total(), 7);
    }

    #[test]
    fn test_sync_from_empty_tx_keeps_total() {
        let mut score = AnomalyScore::new();
        score.add(1, 4);
        score.sync_from_tx(&TxCollection::new());
        assert_eq!(score.total(), 4);
    }
}
