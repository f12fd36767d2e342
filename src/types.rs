//! Core types for the feed client.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Type tag marking a profile as a removal (tombstone).
pub const REMOVED_TYPE: &str = "REMOVED";

/// Identity key for a profile.
///
/// Computed as a single SHA-256 over the concatenation of the type tag and
/// the symbol. This is NOT a composite key: two distinct (type, symbol)
/// pairs whose concatenations coincide (e.g. `("AB", "C")` and
/// `("A", "BC")`) map to the same key and are indistinguishable to the
/// diff engine. Known limitation, kept for feed-protocol compatibility.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileKey(pub [u8; 32]);

impl ProfileKey {
    /// Compute the key for a (type, symbol) pair.
    pub fn of(profile_type: &str, symbol: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(profile_type.as_bytes());
        hasher.update(symbol.as_bytes());
        ProfileKey(hasher.finalize().into())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProfileKey({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A single instrument profile.
///
/// Immutable after construction. A profile with type [`REMOVED_TYPE`] is a
/// tombstone: it only addresses an existing entry for deletion and carries
/// no attributes of its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    /// Application-defined type tag (e.g. "STOCK", "FUTURE").
    pub profile_type: String,

    /// Instrument symbol.
    pub symbol: String,

    /// Remaining fields, opaque to the engine. Only participates in
    /// equality checks.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl InstrumentProfile {
    /// Create a profile with no attributes.
    pub fn new(profile_type: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            profile_type: profile_type.into(),
            symbol: symbol.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Create a tombstone addressing `symbol` for deletion.
    pub fn tombstone(symbol: impl Into<String>) -> Self {
        Self::new(REMOVED_TYPE, symbol)
    }

    /// Set an attribute (builder style).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Whether this profile is a tombstone.
    pub fn is_removed(&self) -> bool {
        self.profile_type == REMOVED_TYPE
    }

    /// Identity key of this profile.
    pub fn key(&self) -> ProfileKey {
        ProfileKey::of(&self.profile_type, &self.symbol)
    }
}

/// Life-cycle state of a [`Connection`](crate::Connection).
///
/// Transitions are monotonic except for `Connecting ⇄ Connected`, which
/// may cycle once per poll attempt. `Closed` is absorbing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Created, not yet started.
    NotConnected,
    /// Worker running, no data accepted yet this attempt.
    Connecting,
    /// Data is being received.
    Connected,
    /// At least one full snapshot pass has completed.
    Completed,
    /// Shut down. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NotConnected => "not connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Completed => "completed",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable() {
        let a = InstrumentProfile::new("STOCK", "AAPL");
        let b = InstrumentProfile::new("STOCK", "AAPL").with_attribute("CURRENCY", "USD");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_is_combined_hash() {
        // The key hashes the concatenation, so boundary-shifted pairs
        // collide. Kept for protocol compatibility.
        assert_eq!(ProfileKey::of("AB", "C"), ProfileKey::of("A", "BC"));
        assert_ne!(ProfileKey::of("STOCK", "AAPL"), ProfileKey::of("STOCK", "MSFT"));
    }

    #[test]
    fn test_tombstone() {
        let t = InstrumentProfile::tombstone("AAPL");
        assert!(t.is_removed());
        assert_eq!(t.key(), ProfileKey::of(REMOVED_TYPE, "AAPL"));
        assert!(!InstrumentProfile::new("STOCK", "AAPL").is_removed());
    }

    #[test]
    fn test_key_hex() {
        let key = ProfileKey::of("STOCK", "AAPL");
        assert_eq!(key.to_hex().len(), 64);
        assert!(format!("{:?}", key).starts_with("ProfileKey("));
    }
}
