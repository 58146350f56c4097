//! Canonical sender/recipient value.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A display name paired with an email address.
///
/// Every recipient value is reduced to this form before an adapter sees it.
/// The name may be empty; equality is structural.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    name: String,
    address: String,
}

impl Address {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }

    /// An address without a display name.
    pub fn bare(address: impl Into<String>) -> Self {
        Self::new(String::new(), address)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.address.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} <{}>", self.name, self.address)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_name() {
        assert_eq!(Address::bare("a@b.com").to_string(), "a@b.com");
        assert_eq!(
            Address::new("John", "j@x.com").to_string(),
            "John <j@x.com>"
        );
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Address::new("", "a@b.com"), Address::bare("a@b.com"));
        assert_ne!(Address::new("A", "a@b.com"), Address::bare("a@b.com"));
    }
}
