//! Physical measurement units for numeric variables.

use serde::{Deserialize, Serialize};

/// A physical unit tag carried by a numeric variable.
///
/// Units are opaque labels (`"celsius"`, `"bar"`, `"rpm"`); the address
/// space never converts between them. Absence of a unit is expressed as
/// `Option<Unit>` on the variable, not as a sentinel.
///
/// # Example
///
/// ```
/// use mast_types::Unit;
///
/// let u = Unit::new("celsius");
/// assert_eq!(u.as_str(), "celsius");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Unit(String);

impl Unit {
    /// Creates a unit tag from a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the unit label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Unit {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_roundtrip() {
        let u = Unit::new("bar");
        assert_eq!(u.as_str(), "bar");
        assert_eq!(u.to_string(), "bar");
    }

    #[test]
    fn serde_transparent() {
        let u = Unit::new("rpm");
        assert_eq!(serde_json::to_string(&u).expect("unit"), "\"rpm\"");
    }
}
