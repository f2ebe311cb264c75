//! Environment values that never show up in logs or debug output.
//!
//! `setEnvironment` routinely carries DNS-provider tokens and storage
//! credentials, so the engine keeps them wrapped in [`RedactedValue`].

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// A string value that is zeroized on drop and redacted when formatted.
#[derive(Clone, PartialEq, Eq)]
pub struct RedactedValue {
    inner: String,
}

impl RedactedValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the real value.
    ///
    /// # Security Note
    /// Only call this when handing the value to the process that needs it.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Length of the value (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<String> for RedactedValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for RedactedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedValue([REDACTED])")
    }
}

impl fmt::Display for RedactedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Drop for RedactedValue {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Serializing would leak the value into status payloads or log lines.
impl serde::Serialize for RedactedValue {
    #[track_caller]
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::Serialization {
            message: String::from("RedactedValue cannot be serialized - use expose() explicitly"),
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
