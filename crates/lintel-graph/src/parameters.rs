//! Ordered parameter storage

use serde::{Deserialize, Serialize};

/// Named parameter values of a single element
///
/// Backed by a TOML table built with `preserve_order`, so iteration follows
/// the order parameters were declared in the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(toml::Table);

impl Parameters {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: toml::Table) -> Self {
        Self(table)
    }

    /// Get a parameter value by name
    pub fn get(&self, name: &str) -> Option<&toml::Value> {
        self.0.get(name)
    }

    /// Get a parameter value as a string slice
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    /// Get a numeric parameter, accepting integers as well as floats
    pub fn get_number(&self, name: &str) -> Option<f64> {
        self.0
            .get(name)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
    }

    /// Set a parameter value, returning the previous one.
    ///
    /// Existing parameters keep their position.
    pub fn set(&mut self, name: impl Into<String>, value: toml::Value) -> Option<toml::Value> {
        let name = name.into();
        match self.0.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.insert(name, value);
                None
            }
        }
    }

    /// Remove a parameter, keeping the order of the remaining ones
    pub fn remove(&mut self, name: &str) -> Option<toml::Value> {
        let mut removed = None;
        self.retain(|k, v| {
            if k == name {
                removed = Some(v.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Keep only the parameters for which `keep` returns true
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &toml::Value) -> bool,
    {
        let old = std::mem::take(&mut self.0);
        self.0 = old.into_iter().filter(|(k, v)| keep(k.as_str(), v)).collect();
    }

    /// Check if a parameter exists
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Parameter names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &toml::Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_table(&self) -> &toml::Table {
        &self.0
    }
}

impl From<toml::Table> for Parameters {
    fn from(table: toml::Table) -> Self {
        Self(table)
    }
}

impl<K: Into<String>> FromIterator<(K, toml::Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, toml::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// True when a value carries no information: a blank string or an empty
/// array/table. Numbers, booleans and dates are never blank.
pub fn value_is_blank(value: &toml::Value) -> bool {
    match value {
        toml::Value::String(s) => s.trim().is_empty(),
        toml::Value::Array(a) => a.is_empty(),
        toml::Value::Table(t) => t.is_empty(),
        _ => false,
    }
}
