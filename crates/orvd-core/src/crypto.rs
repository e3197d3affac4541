//! Signatures over the relay protocol.
//!
//! Messages are signed with unpadded RSA over the big-endian SHA-256 digest:
//! `sig = H(m)^d mod n`, verified as `sig^e mod n == H(m)`. Deployed vehicles
//! speak exactly this scheme, so no padding is applied.

use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use rsa::BigUint;

/// Key size used for the relay's own keypair.
pub const DEFAULT_KEY_BITS: usize = 1024;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid hex integer: {0}")]
    InvalidHex(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("no private key for group {0}")]
    MissingPrivateKey(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Public half of a keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pub n: BigUint,
    pub e: BigUint,
}

impl PublicKey {
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    /// Parse `(n, e)` from hex, tolerating a `0x` prefix.
    pub fn from_hex(n: &str, e: &str) -> CryptoResult<Self> {
        Ok(Self {
            n: parse_hex(n)?,
            e: parse_hex(e)?,
        })
    }

    pub fn n_hex(&self) -> String {
        to_hex(&self.n)
    }

    pub fn e_hex(&self) -> String {
        to_hex(&self.e)
    }

    /// Check `signature` against `message`. Never fails; a degenerate key is just a mismatch.
    pub fn verify(&self, message: &str, signature: &BigUint) -> bool {
        if self.n.bits() == 0 {
            return false;
        }
        signature.modpow(&self.e, &self.n) == sha256_int(message)
    }
}

/// Full keypair held in memory.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKey,
    d: BigUint,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a fresh keypair of `bits` modulus size.
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self {
            public: PublicKey::new(key.n().clone(), key.e().clone()),
            d: key.d().clone(),
        })
    }

    pub fn from_parts(n: BigUint, e: BigUint, d: BigUint) -> Self {
        Self {
            public: PublicKey::new(n, e),
            d,
        }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn sign(&self, message: &str) -> BigUint {
        sha256_int(message).modpow(&self.d, &self.public.n)
    }

    /// Signature rendered for the wire.
    pub fn sign_hex(&self, message: &str) -> String {
        to_hex(&self.sign(message))
    }

    pub fn verify(&self, message: &str, signature: &BigUint) -> bool {
        self.public.verify(message, signature)
    }
}

/// SHA-256 digest as an unsigned big-endian integer.
pub fn sha256_int(message: &str) -> BigUint {
    BigUint::from_bytes_be(&Sha256::digest(message.as_bytes()))
}

/// SHA-256 digest rendered as an integer in hex: lowercase, no leading zeros.
pub fn sha256_hex(message: &str) -> String {
    to_hex(&sha256_int(message))
}

/// Parse a hex integer, stripping an optional `0x`.
pub fn parse_hex(value: &str) -> CryptoResult<BigUint> {
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(CryptoError::InvalidHex(value.to_string()));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| CryptoError::InvalidHex(value.to_string()))
}

pub fn to_hex(value: &BigUint) -> String {
    value.to_str_radix(16)
}
