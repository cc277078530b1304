//! HTTP headers handling
//!
//! This module provides a type for managing HTTP headers with case-insensitive
//! lookups and support for multiple values per header name.

use std::fmt;

/// HTTP headers collection
///
/// Headers are stored in insertion order and support:
/// - Case-insensitive header name lookups
/// - Multiple values for the same header name (`add` always appends)
/// - Iteration and serialization in insertion order
///
/// Names must not contain a colon and neither names nor values may contain
/// CR or LF. Name storage preserves the first-seen casing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    headers: Vec<(String, String)>,
}

impl HeaderMap {
    /// Create a new empty headers collection
    pub fn new() -> Self {
        HeaderMap {
            headers: Vec::new(),
        }
    }

    /// Append a header
    ///
    /// A header with the same name (case-insensitive) may already exist;
    /// this adds another value rather than replacing it.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        debug_assert!(!name.contains(':'), "header name contains a colon");
        debug_assert!(
            !name.contains(['\r', '\n']) && !value.contains(['\r', '\n']),
            "header contains CR or LF"
        );

        self.headers.push((name, value));
    }

    /// Get the first value for a header (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        for (n, v) in self.iter() {
            if n.eq_ignore_ascii_case(name) {
                return Some(v);
            }
        }
        None
    }

    /// Get all values for a header (case-insensitive), in insertion order
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let mut values = Vec::new();
        for (n, v) in self.iter() {
            if n.eq_ignore_ascii_case(name) {
                values.push(v);
            }
        }
        values
    }

    /// Check if a header exists (case-insensitive)
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove all instances of a header (case-insensitive), returning how
    /// many there were
    pub fn remove(&mut self, name: &str) -> usize {
        let mut removed = 0;
        self.headers.retain(|(n, _)| {
            if n.eq_ignore_ascii_case(name) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    /// Get the number of headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if there are no headers
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Clear all headers
    pub fn clear(&mut self) {
        self.headers.clear();
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Iterate over all headers in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries()
            .iter()
            .map(|entry| (entry.0.as_str(), entry.1.as_str()))
    }

    /// Serialize all headers as `Name: Value\r\n` pairs in insertion order
    pub fn serialize(&self, buf: &mut Vec<u8>) {
        for (name, value) in self.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
    }
}

impl fmt::Display for HeaderMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            writeln!(f, "{}: {}", name, value)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, String)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}
