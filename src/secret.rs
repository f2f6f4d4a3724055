//! Passphrase storage
//!
//! The repository passphrase travels from the command line into the borg
//! child environment. [`SecureString`] carries it there, wipes it on drop
//! and prints as a placeholder in logs.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret text, wiped on drop and redacted when formatted
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    pub fn new(s: impl Into<String>) -> Self {
        Self { inner: s.into() }
    }

    /// Raw value, for handing to a child process
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecureString(***)")
    }
}

impl fmt::Display for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_string_access() {
        let s = SecureString::from("Pa55w0rd".to_string());
        assert_eq!(s.as_str(), "Pa55w0rd");
        assert!(!s.is_empty());
    }

    #[test]
    fn test_secure_string_redacts_debug_and_display() {
        let s = SecureString::new("Pa55w0rd");
        assert_eq!(format!("{:?}", s), "SecureString(***)");
        assert_eq!(format!("{}", s), "***");
    }

    #[test]
    fn test_explicit_zeroize_clears_contents() {
        let mut s = SecureString::new("Pa55w0rd");
        s.zeroize();
        assert!(s.is_empty());
    }
}
