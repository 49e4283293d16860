use serde::{Serialize, Serializer};
use std::fmt;

const SEPARATOR: char = '|';

/// Insertion-ordered set of traffic sources a visitor arrived from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficHistory {
    sources: Vec<String>,
}

impl TrafficHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the pipe-joined cookie form. Empty entries and repeats are dropped.
    pub fn parse(serialized: &str) -> Self {
        let mut history = Self::new();
        for source in serialized.split(SEPARATOR) {
            history.add(source);
        }
        history
    }

    /// Append `source` unless it is empty or already present.
    pub fn add(&mut self, source: &str) -> bool {
        if source.is_empty() || self.contains(source) {
            return false;
        }
        self.sources.push(source.to_string());
        true
    }

    pub fn contains(&self, source: &str) -> bool {
        self.sources.iter().any(|s| s == source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Display for TrafficHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            f.write_str(source)?;
        }
        Ok(())
    }
}

impl Serialize for TrafficHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_empty_and_duplicates() {
        let history = TrafficHistory::parse("|google||criteo|google|");
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["google", "criteo"]);
        assert_eq!(history.to_string(), "google|criteo");
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let mut history = TrafficHistory::new();
        assert!(history.add("criteo"));
        assert!(history.add("NO_REFERRER"));
        assert!(!history.add("criteo"));
        assert!(!history.add(""));
        assert_eq!(history.to_string(), "criteo|NO_REFERRER");
    }

    #[test]
    fn test_empty_history_serializes_empty() {
        assert_eq!(TrafficHistory::parse("").to_string(), "");
        assert!(TrafficHistory::parse("").is_empty());
    }
}
