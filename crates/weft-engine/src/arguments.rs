//! Directive argument scopes.
//!
//! Every directive carries a scope of named string values. Scopes are copied
//! from the parent when a directive is created and may later be extended by
//! the directive itself (variable blocks, message blocks).

/// Ordered collection of named argument values.
///
/// Lookups are exact and case-sensitive. Setting an existing key replaces its
/// value in place, so insertion order is stable.
///
/// # Example
///
/// ```
/// use weft_engine::Arguments;
///
/// let mut args = Arguments::new();
/// args.set("Name", "Ann");
/// args.set("Age", "42");
/// args.set("Name", "Bob");
///
/// assert_eq!(args.get("Name"), Some("Bob"));
/// assert_eq!(args.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Arguments {
    entries: Vec<(String, String)>,
}

impl Arguments {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Set a value, replacing an existing entry with the same key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Merge another scope into this one. Entries from `other` win.
    pub fn extend(&mut self, other: &Self) {
        for (key, value) in &other.entries {
            self.set(key.as_str(), value.as_str());
        }
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a `key=value` pair.
    ///
    /// Returns `None` when there is no `=` or the key is empty.
    #[must_use]
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_owned(), value.to_owned()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Arguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut args = Self::new();
        for (key, value) in iter {
            args.set(key, value);
        }
        args
    }
}
