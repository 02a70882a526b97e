//! Account identities.
//!
//! An [`Identity`] is a 20-byte ledger account (maker, taker, validator,
//! custody contract). Asset ledgers are addressed the same way, so
//! [`AssetId`] is an alias.
//!
//! The all-zero identity is the null account; the engine rejects it wherever
//! an identity must be meaningful (assets, validator rotation, custody).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Identifier of a confidential asset ledger.
pub type AssetId = Identity;

/// Errors from parsing a hex identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityParseError {
    #[error("identity is not valid hex: {0}")]
    InvalidHex(String),

    #[error("identity must be 20 bytes, got {0}")]
    InvalidLength(usize),
}

/// A 20-byte account identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Identity([u8; 20]);

impl Identity {
    /// The null account.
    pub const NULL: Identity = Identity([0u8; 20]);

    /// Wrap raw account bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive a stable identity from a human label.
    ///
    /// Used by the demo binary and tests to name parties ("maker", "validator")
    /// without hard-coding addresses.
    ///
    /// ```
    /// use dark_otc::types::Identity;
    ///
    /// let a = Identity::from_label("maker");
    /// assert_eq!(a, Identity::from_label("maker"));
    /// assert_ne!(a, Identity::from_label("taker"));
    /// assert!(!a.is_null());
    /// ```
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest[12..]);
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Left-pad to a 32-byte word, the layout used in order records.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    /// `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse hex with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, IdentityParseError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(digits).map_err(|e| IdentityParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 20] = raw
            .as_slice()
            .try_into()
            .map_err(|_| IdentityParseError::InvalidLength(raw.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

impl FromStr for Identity {
    type Err = IdentityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Identity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
