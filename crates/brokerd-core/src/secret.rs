//! A wrapper that keeps resolved authentication material out of logs.
//!
//! Spec §3: "resolved authentication material (kept only in memory, never
//! logged, never returned)". [`Secret`] makes the accidental case (a
//! `{:?}` in a log line, a `Serialize` impl on a response struct) inert
//! instead of relying on call-site discipline.

use serde::Serialize;
use std::fmt;
use zeroize::Zeroize;

/// An in-memory secret value that redacts itself on `Debug`/`Display` and
/// refuses to serialise.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the underlying value. The only sanctioned use is handing it
    /// to the backend process/SDK that needs it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(\"***redacted***\")")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***redacted***")
    }
}

impl Serialize for Secret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("***redacted***")
    }
}
