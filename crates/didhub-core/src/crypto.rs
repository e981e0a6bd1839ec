//! Hashes and keys used by the registries.
//!
//! Document anchors and convergence digests are Blake3. Operation signatures,
//! when a registry checks them, are Ed25519 over the canonical operation
//! message.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Fixed-width byte newtype with hex display and slice conversion.
macro_rules! fixed_bytes {
    ($name:ident, $len:literal, $tag:literal, $err:expr) => {
        impl $name {
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Accept exactly the right number of bytes.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
                <[u8; $len]>::try_from(bytes).map(Self).map_err(|_| $err)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "({}..)"), &self.to_hex()[..12])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }
    };
}

/// Blake3 digest of a document or of a registry's record set.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

fixed_bytes!(
    Blake3Hash,
    32,
    "Blake3",
    CoreError::InvalidAnchor("digest must be 32 bytes".into())
);

impl Blake3Hash {
    /// Digest of nothing at all; what an empty registry reports.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

impl fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Ed25519 verifying key listed in a document or enrolled for a caller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

fixed_bytes!(Ed25519PublicKey, 32, "Ed25519Pub", CoreError::InvalidPublicKey);

impl Ed25519PublicKey {
    /// Parse the hex form found in documents.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s).map_err(|_| CoreError::InvalidPublicKey)?;
        Self::from_slice(&bytes)
    }

    /// Check `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        VerifyingKey::from_bytes(&self.0)
            .map_err(|_| CoreError::InvalidPublicKey)?
            .verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

/// Ed25519 signature attached to a caller.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature(pub [u8; 64]);

fixed_bytes!(Ed25519Signature, 64, "Ed25519Sig", CoreError::InvalidSignature);

/// Signing half of a caller identity.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut rand::thread_rng()))
    }

    /// Deterministic key from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.public_key()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sign_verify() {
        let keypair = Keypair::generate();
        let message = b"Register did:bitxhub:app:.";
        let signature = keypair.sign(message);

        keypair
            .public_key()
            .verify(message, &signature)
            .expect("valid signature should verify");
        assert!(keypair.public_key().verify(b"Register other", &signature).is_err());
    }

    #[test]
    fn test_keypair_deterministic_from_seed() {
        let seed = [0x42u8; 32];
        assert_eq!(
            Keypair::from_seed(&seed).public_key(),
            Keypair::from_seed(&seed).public_key()
        );
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(Ed25519Signature::from_slice(&[0u8; 63]).is_err());
        assert!(Ed25519Signature::from_slice(&[0u8; 64]).is_ok());
        assert!(matches!(
            Blake3Hash::from_slice(&[0u8; 31]),
            Err(CoreError::InvalidAnchor(_))
        ));
        assert_eq!(Blake3Hash::from_slice(&[0u8; 32]).unwrap(), Blake3Hash::ZERO);
    }

    #[test]
    fn test_public_key_hex() {
        let pk = Keypair::generate().public_key();
        assert_eq!(Ed25519PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert!(Ed25519PublicKey::from_hex("abcd").is_err());
        assert!(Ed25519PublicKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_is_short() {
        let hash = Blake3Hash::hash(b"doc");
        assert_eq!(format!("{hash:?}"), format!("Blake3({}..)", &hash.to_hex()[..12]));
    }
}
