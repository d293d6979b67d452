//! Credential handling
//!
//! API keys arrive from two places (the task envelope and the process
//! configuration) and must never end up in logs, debug output, or payloads.

use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// An API credential that prints as `[REDACTED]`
pub struct Credential(SecretBox<str>);

impl Credential {
    /// Wraps a raw credential value
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretBox::new(Box::from(value.into().as_str())))
    }

    /// Returns the raw value, for use in an outgoing request only
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns true if the credential is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self::new(self.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Credential::new)
    }
}

/// Picks the credential to use for a task
///
/// A non-blank task-supplied credential wins over the process-wide one.
pub fn resolve_credential<'a>(
    task: Option<&'a Credential>,
    configured: Option<&'a Credential>,
) -> Option<&'a Credential> {
    task.filter(|c| !c.is_blank())
        .or_else(|| configured.filter(|c| !c.is_blank()))
}
