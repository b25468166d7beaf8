//! Base implementation of records.
use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for metrics like reward or KL.
    Scalar(f32),
}

/// A container for storing key-value pairs of metrics.
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            None => Err(anyhow!("record has no key {}", k)),
        }
    }

    /// Checks if the record is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Formats the record as `key=value` pairs sorted by key.
    pub fn fmt_line(&self) -> String {
        let mut entries = self.0.iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .iter()
            .map(|(k, v)| match v {
                RecordValue::Scalar(v) => format!("{}={}", k, v),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insert_overwrites() {
        let mut r = Record::from_slice(&[
            ("kl", RecordValue::Scalar(0.1)),
            ("improvement", RecordValue::Scalar(0.5)),
        ]);
        r.insert("kl", RecordValue::Scalar(0.2));
        assert_eq!(r.get_scalar("kl").unwrap(), 0.2);
        assert_eq!(r.get_scalar("improvement").unwrap(), 0.5);
        assert!(r.get_scalar("missing").is_err());
        assert!(Record::empty().is_empty());
    }

    #[test]
    fn test_fmt_line_sorted() {
        let r = Record::from_slice(&[
            ("b", RecordValue::Scalar(2.0)),
            ("a", RecordValue::Scalar(1.0)),
        ]);
        assert_eq!(r.fmt_line(), "a=1 b=2");
    }
}
