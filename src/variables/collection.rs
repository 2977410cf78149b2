//! Collection trait and implementations.

use regex::Regex;
use std::collections::HashMap;

/// A collection of key-value pairs.
pub trait Collection: Send + Sync {
    /// Get all key-value pairs.
    fn all(&self) -> Vec<(&str, &str)>;

    /// Get values by key.
    fn get(&self, key: &str) -> Vec<&str>;

    /// Get values whose key matches a regex pattern.
    fn get_regex(&self, pattern: &Regex) -> Vec<(&str, &str)>;

    /// Count items.
    fn count(&self) -> usize;
}

/// A mutable collection (TX).
pub trait MutableCollection: Collection {
    /// Set a value.
    fn set(&mut self, key: &str, value: String);

    /// Delete a key.
    fn delete(&mut self, key: &str);

    /// Increment a numeric value.
    fn increment(&mut self, key: &str, amount: i64);

    /// Decrement a numeric value.
    fn decrement(&mut self, key: &str, amount: i64) {
        self.increment(key, -amount);
    }
}

/// Append-only collection preserving insertion order.
///
/// Keys compare case-insensitively, as header and argument names do.
#[derive(Debug, Clone, Default)]
pub struct OrderedCollection {
    entries: Vec<(String, String)>,
}

impl OrderedCollection {
    /// Create a new empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to a key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Distinct keys, in first-seen order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.entries {
            if !keys.iter().any(|seen| seen.eq_ignore_ascii_case(k)) {
                keys.push(k);
            }
        }
        keys
    }

    /// Whether nothing was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Collection for OrderedCollection {
    fn all(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    fn get(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn get_regex(&self, pattern: &Regex) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter(|(k, _)| pattern.is_match(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    fn count(&self) -> usize {
        self.entries.len()
    }
}

/// Transaction collection for storing intermediate values.
///
/// Unlike the request/response variables this collection is freely
/// rewritten by `setvar` and scoring actions.
#[derive(Debug, Clone, Default)]
pub struct TxCollection {
    data: HashMap<String, String>,
}

impl TxCollection {
    /// Create a new TX collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a single value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.data.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    /// Get a value parsed as an integer, defaulting to zero.
    pub fn int(&self, key: &str) -> i64 {
        self.value(key).and_then(|v| v.parse().ok()).unwrap_or(0)
    }
}

impl Collection for TxCollection {
    fn all(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<(&str, &str)> = self
            .data
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        all.sort_unstable();
        all
    }

    fn get(&self, key: &str) -> Vec<&str> {
        self.value(key).into_iter().collect()
    }

    fn get_regex(&self, pattern: &Regex) -> Vec<(&str, &str)> {
        self.all()
            .into_iter()
            .filter(|(k, _)| pattern.is_match(k))
            .collect()
    }

    fn count(&self) -> usize {
        self.data.len()
    }
}

impl MutableCollection for TxCollection {
    fn set(&mut self, key: &str, value: String) {
        self.data.insert(key.to_ascii_lowercase(), value);
    }

    fn delete(&mut self, key: &str) {
        self.data.remove(&key.to_ascii_lowercase());
    }

    fn increment(&mut self, key: &str, amount: i64) {
        let current = self.int(key);
        self.set(key, (current + amount).to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_collection_case_insensitive_get() {
        let mut c = OrderedCollection::new();
        c.add("Host", "example.com");
        c.add("accept", "*/*");
        c.add("host", "other.example");
        assert_eq!(c.get("HOST"), vec!["example.com", "other.example"]);
        assert_eq!(c.keys(), vec!["Host", "accept"]);
        assert_eq!(c.count(), 3);
    }

    #[test]
    fn test_ordered_collection_regex() {
        let mut c = OrderedCollection::new();
        c.add("user_id", "1");
        c.add("user_name", "bob");
        c.add("page", "2");
        let re = Regex::new("^user").unwrap();
        assert_eq!(c.get_regex(&re).len(), 2);
    }

    #[test]
    fn test_tx_increment_and_decrement() {
        let mut tx = TxCollection::new();
        tx.set("Score", "10".to_string());
        tx.increment("score", 5);
        assert_eq!(tx.value("SCORE"), Some("15"));
        tx.decrement("score", 3);
        assert_eq!(tx.int("score"), 12);
        tx.increment("fresh", 2);
        assert_eq!(tx.int("fresh"), 2);
    }

    #[test]
    fn test_tx_delete() {
        let mut tx = TxCollection::new();
        tx.set("flag", "1".to_string());
        tx.delete("FLAG");
        assert_eq!(tx.count(), 0);
    }
}
