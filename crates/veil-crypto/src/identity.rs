//! Node identities and session key agreement.
//!
//! An identity is an X25519 public key, optionally paired with its secret.
//! Only identities holding a secret can agree on a session key; remote peers
//! are represented by public-only identities.

use crate::error::CryptoError;
use crate::hash::{Kdf, hash};
use crate::{ADDRESS_LENGTH, SESSION_KEY_LENGTH};
use rand_core::{CryptoRng, RngCore};
use std::fmt;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

const SESSION_KEY_CONTEXT: &str = "veil 2024 peer session key";

/// X25519 public key size
const PUBLIC_KEY_LENGTH: usize = 32;

/// 40-bit overlay address derived from an identity's public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Derive the address of an X25519 public key.
    #[must_use]
    pub fn from_public_key(public: &[u8; PUBLIC_KEY_LENGTH]) -> Self {
        let digest = hash(public);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Parse a hex-encoded address.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidEncoding` if the string is not
    /// `2 * ADDRESS_LENGTH` hex digits.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let decoded = hex::decode(s).map_err(|_| CryptoError::InvalidEncoding)?;
        let bytes: [u8; ADDRESS_LENGTH] = decoded
            .try_into()
            .map_err(|_| CryptoError::InvalidEncoding)?;
        Ok(Self(bytes))
    }

    /// Raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Symmetric per-peer secret produced by [`Identity::agree`].
#[derive(Clone, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct SessionKey([u8; SESSION_KEY_LENGTH]);

impl SessionKey {
    /// Key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LENGTH] {
        &self.0
    }

    /// Key length in bytes. Always `SESSION_KEY_LENGTH`.
    #[must_use]
    pub const fn len(&self) -> usize {
        SESSION_KEY_LENGTH
    }

    /// Never true; present for API symmetry with `len`.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// A node identity.
///
/// The secret, when present, is zeroized on drop.
#[derive(Clone)]
pub struct Identity {
    public: PublicKey,
    secret: Option<StaticSecret>,
    address: Address,
}

impl Identity {
    /// Generate a fresh identity with a secret key.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self {
            public,
            address: Address::from_public_key(public.as_bytes()),
            secret: Some(secret),
        }
    }

    /// Build a public-only identity from a key learned from a remote peer.
    #[must_use]
    pub fn from_public_bytes(public: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self {
            public: PublicKey::from(public),
            address: Address::from_public_key(&public),
            secret: None,
        }
    }

    /// This identity with its secret stripped.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self::from_public_bytes(self.public.to_bytes())
    }

    /// Public key bytes.
    #[must_use]
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        self.public.as_bytes()
    }

    /// Overlay address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Whether a secret key is present.
    #[must_use]
    pub const fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Agree on a session key with `remote`.
    ///
    /// Both sides derive the same key: X25519 followed by the BLAKE3 KDF.
    ///
    /// # Errors
    ///
    /// - `CryptoError::MissingSecret` if this identity is public-only
    /// - `CryptoError::LowOrderPoint` if `remote` is a low-order point
    pub fn agree(&self, remote: &Identity) -> Result<SessionKey, CryptoError> {
        let secret = self.secret.as_ref().ok_or(CryptoError::MissingSecret)?;
        let shared = secret.diffie_hellman(&remote.public);
        if bool::from(shared.as_bytes()[..].ct_eq(&[0u8; 32][..])) {
            return Err(CryptoError::LowOrderPoint);
        }

        let mut key = [0u8; SESSION_KEY_LENGTH];
        Kdf::new(SESSION_KEY_CONTEXT).derive(shared.as_bytes(), &mut key);
        let session_key = SessionKey(key);
        key.zeroize();
        Ok(session_key)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.public == other.public
    }
}

impl Eq for Identity {}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.address)
            .field("has_secret", &self.has_secret())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn test_agreement_is_symmetric() {
        let alice = Identity::generate(&mut OsRng);
        let bob = Identity::generate(&mut OsRng);

        let ab = alice.agree(&bob.to_public()).unwrap();
        let ba = bob.agree(&alice.to_public()).unwrap();

        assert_eq!(ab, ba);
        assert_eq!(ab.len(), SESSION_KEY_LENGTH);
    }

    #[test]
    fn test_agreement_is_deterministic() {
        let alice = Identity::generate(&mut OsRng);
        let bob = Identity::generate(&mut OsRng).to_public();

        assert_eq!(alice.agree(&bob).unwrap(), alice.agree(&bob).unwrap());
    }

    #[test]
    fn test_public_only_cannot_agree() {
        let alice = Identity::generate(&mut OsRng).to_public();
        let bob = Identity::generate(&mut OsRng);

        assert_eq!(alice.agree(&bob), Err(CryptoError::MissingSecret));
    }

    #[test]
    fn test_low_order_remote_rejected() {
        let alice = Identity::generate(&mut OsRng);
        let bogus = Identity::from_public_bytes([0u8; PUBLIC_KEY_LENGTH]);

        assert_eq!(alice.agree(&bogus), Err(CryptoError::LowOrderPoint));
    }

    #[test]
    fn test_public_bytes_roundtrip() {
        let id = Identity::generate(&mut OsRng);
        let learned = Identity::from_public_bytes(*id.public_key());

        assert_eq!(learned, id);
        assert_eq!(learned.address(), id.address());
        assert_eq!(
            Identity::generate(&mut OsRng).agree(&learned).unwrap().len(),
            SESSION_KEY_LENGTH
        );
    }

    // RFC 7748 section 6.1: Alice and Bob derive the same shared secret
    #[test]
    fn test_rfc7748_agreement_vector() {
        let alice_secret: [u8; 32] = [
            0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2,
            0x66, 0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5,
            0x1d, 0xb9, 0x2c, 0x2a,
        ];
        let bob_public: [u8; 32] = [
            0xde, 0x9e, 0xdb, 0x7d, 0x7b, 0x7d, 0xc1, 0xb4, 0xd3, 0x5b, 0x61, 0xc2, 0xec, 0xe4,
            0x35, 0x37, 0x3f, 0x83, 0x43, 0xc8, 0x5b, 0x78, 0x67, 0x4d, 0xad, 0xfc, 0x7e, 0x14,
            0x6f, 0x88, 0x2b, 0x4f,
        ];
        let shared: [u8; 32] = [
            0x4a, 0x5d, 0x9d, 0x5b, 0xa4, 0xce, 0x2d, 0xe1, 0x72, 0x8e, 0x3b, 0xf4, 0x80, 0x35,
            0x0f, 0x25, 0xe0, 0x7e, 0x21, 0xc9, 0x47, 0xd1, 0x9e, 0x33, 0x76, 0xf0, 0x9b, 0x3c,
            0x1e, 0x16, 0x17, 0x42,
        ];

        let secret = StaticSecret::from(alice_secret);
        let alice = Identity {
            public: PublicKey::from(&secret),
            address: Address::from_public_key(PublicKey::from(&secret).as_bytes()),
            secret: Some(secret),
        };
        let bob = Identity::from_public_bytes(bob_public);

        let mut expected = [0u8; SESSION_KEY_LENGTH];
        Kdf::new(SESSION_KEY_CONTEXT).derive(&shared, &mut expected);
        assert_eq!(alice.agree(&bob).unwrap().as_bytes(), &expected);
    }

    #[test]
    fn test_address_hex_roundtrip() {
        let id = Identity::generate(&mut OsRng);
        let text = id.address().to_string();

        assert_eq!(text.len(), ADDRESS_LENGTH * 2);
        assert_eq!(Address::from_hex(&text).unwrap(), id.address());
    }

    #[test]
    fn test_address_from_hex_rejects_bad_input() {
        assert_eq!(Address::from_hex("zz"), Err(CryptoError::InvalidEncoding));
        assert_eq!(
            Address::from_hex("0011223344556677"),
            Err(CryptoError::InvalidEncoding)
        );
    }

    #[test]
    fn test_public_identity_keeps_address() {
        let id = Identity::generate(&mut OsRng);
        let public = id.to_public();

        assert_eq!(id, public);
        assert_eq!(id.address(), public.address());
        assert!(!public.has_secret());
    }

    #[test]
    fn test_debug_hides_secret() {
        let id = Identity::generate(&mut OsRng);
        let text = format!("{id:?}");
        assert!(text.contains("has_secret: true"));
        assert!(!text.contains("StaticSecret"));
    }
}
