//! Opaque references to encrypted values.
//!
//! The core never sees plaintext. Amounts and the allow-listed taker are
//! carried as 32-byte handles with equality by identity only: two handles are
//! "the same value" to the core only if they are the same handle.
//!
//! - [`ExternalHandle`]: produced client-side by the confidential-computation
//!   service, not yet trusted.
//! - [`Proof`]: attestation bytes binding one or more external handles to a
//!   (contract, user) context.
//! - [`Handle`]: an internal handle, obtained only through an
//!   [`AttestationVerifier`](crate::confidential::AttestationVerifier) import.

use std::fmt;

macro_rules! handle_type {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name([u8; 32]);

        impl $name {
            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            #[inline]
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            // Short form keeps logs readable.
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(0x{}..)", stringify!($name), hex::encode(&self.0[..6]))
            }
        }
    };
}

handle_type!(Handle);
handle_type!(ExternalHandle);

/// Attestation bytes accompanying one or more external handles.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Proof(Vec<u8>);

impl Proof {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proof({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Proof {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_equality_is_by_bytes() {
        let a = Handle::from_bytes([7u8; 32]);
        let b = Handle::from_bytes([7u8; 32]);
        let c = Handle::from_bytes([8u8; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_handle_display_is_full_hex() {
        let h = ExternalHandle::from_bytes([0xCD; 32]);
        let s = h.to_string();
        assert!(s.starts_with("0x"));
        assert_eq!(s.len(), 2 + 64);
    }

    #[test]
    fn test_proof_debug_hides_bytes() {
        let p = Proof::new(vec![1, 2, 3]);
        assert_eq!(format!("{:?}", p), "Proof(3 bytes)");
        assert!(!p.is_empty());
        assert!(Proof::default().is_empty());
    }
}
