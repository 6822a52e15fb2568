//! Element type selectors
//!
//! A selector is a `|`-separated list of patterns matched against an
//! element's type tag:
//! - `*` matches every type
//! - `Door` matches exactly
//! - `Revit*` matches by prefix
//! - `*Wall` matches by suffix

use lintel_core::{LintelError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Any,
    Exact(String),
    Prefix(String),
    Suffix(String),
}

impl Pattern {
    fn matches(&self, element_type: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Exact(t) => element_type == t,
            Pattern::Prefix(p) => element_type.starts_with(p.as_str()),
            Pattern::Suffix(s) => element_type.ends_with(s.as_str()),
        }
    }
}

/// Matches element type tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeSelector {
    source: String,
    patterns: Vec<Pattern>,
}

impl TypeSelector {
    /// Selector that matches every element type
    pub fn any() -> Self {
        Self {
            source: "*".to_string(),
            patterns: vec![Pattern::Any],
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let mut patterns = Vec::new();

        for part in input.split('|') {
            let part = part.trim();
            if part.is_empty() {
                return Err(LintelError::InvalidSelector(format!(
                    "empty alternative in '{}'",
                    input
                )));
            }

            let pattern = if part == "*" {
                Pattern::Any
            } else if let Some(prefix) = part.strip_suffix('*') {
                Pattern::Prefix(prefix.to_string())
            } else if let Some(suffix) = part.strip_prefix('*') {
                Pattern::Suffix(suffix.to_string())
            } else {
                Pattern::Exact(part.to_string())
            };

            let literal = match &pattern {
                Pattern::Any => "",
                Pattern::Exact(s) | Pattern::Prefix(s) | Pattern::Suffix(s) => s.as_str(),
            };
            if literal.contains('*') {
                return Err(LintelError::InvalidSelector(format!(
                    "'*' is only allowed at the start or end of '{}'",
                    part
                )));
            }

            patterns.push(pattern);
        }

        Ok(Self {
            source: input.trim().to_string(),
            patterns,
        })
    }

    pub fn matches(&self, element_type: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(element_type))
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl Default for TypeSelector {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for TypeSelector {
    type Err = LintelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TypeSelector {
    type Error = LintelError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<TypeSelector> for String {
    fn from(selector: TypeSelector) -> Self {
        selector.source
    }
}

impl fmt::Display for TypeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_and_any() {
        let door = TypeSelector::parse("Door").unwrap();
        assert!(door.matches("Door"));
        assert!(!door.matches("DoorFrame"));
        assert!(TypeSelector::any().matches("Anything"));
    }

    #[test]
    fn test_prefix_suffix_alternatives() {
        let sel = TypeSelector::parse("Revit* | *Wall | Door").unwrap();
        assert!(sel.matches("RevitInstance"));
        assert!(sel.matches("CurtainWall"));
        assert!(sel.matches("Door"));
        assert!(!sel.matches("Window"));
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(TypeSelector::parse("").is_err());
        assert!(TypeSelector::parse("Door||Wall").is_err());
        assert!(TypeSelector::parse("Do*or").is_err());
        assert!(TypeSelector::parse("**").is_err());
    }

    #[test]
    fn test_deserialize_from_string() {
        #[derive(Deserialize)]
        struct Holder {
            select: TypeSelector,
        }
        let holder: Holder = toml::from_str("select = \"Geometry*\"").unwrap();
        assert!(holder.select.matches("GeometryMesh"));

        let bad: std::result::Result<Holder, _> = toml::from_str("select = \"a*b\"");
        assert!(bad.is_err());
    }
}
