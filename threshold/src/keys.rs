//! Key types for threshold Ed25519.
//!
//! This module defines the long-lived per-party keypair, the shared key a
//! party holds after distributed key generation, and the ephemeral
//! per-message nonce material. The secret-bearing types are intentionally
//! opaque and zeroize their contents on drop.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::protocol::primitives;

/// Long-lived keypair for one party.
///
/// Created once per party at registration. The signing scalar and the
/// RFC 8032 nonce prefix are expanded from a 32-byte seed with SHA-512;
/// the public share `y = a · G` is this party's additive contribution to
/// the joint public key.
///
/// **This contains secret material and MUST be kept confidential.**
#[derive(Clone)]
pub struct PartyKey {
    /// Secret signing scalar `a` (clamped per RFC 8032).
    signing_scalar: Scalar,
    /// Nonce prefix: the upper half of the SHA-512 seed expansion.
    prefix: [u8; 32],
    /// Public share `y = a · G`.
    public_share: EdwardsPoint,
}

impl PartyKey {
    /// Create a keypair from fresh randomness.
    pub fn create<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        let key = Self::create_from_seed(&seed);
        seed.zeroize();
        key
    }

    /// Create a keypair from a caller-supplied 32-byte secret seed.
    ///
    /// The seed is expanded exactly as a standard Ed25519 secret key, so a
    /// party can bring an existing Ed25519 identity into the scheme.
    pub fn create_from_seed(seed: &[u8; 32]) -> Self {
        let (signing_scalar, prefix) = primitives::expand_secret_seed(seed);
        let public_share = EdwardsPoint::mul_base(&signing_scalar);
        Self { signing_scalar, prefix, public_share }
    }

    /// Get the encoded public share `y = a · G`.
    pub fn public_share(&self) -> [u8; 32] {
        primitives::encode_point(&self.public_share)
    }

    /// Get the secret signing scalar (for internal use).
    pub(crate) fn signing_scalar(&self) -> &Scalar {
        &self.signing_scalar
    }

    /// Get the nonce prefix (for internal use).
    pub(crate) fn prefix(&self) -> &[u8; 32] {
        &self.prefix
    }

    /// Get the public share as a point (for internal use).
    pub(crate) fn public_point(&self) -> &EdwardsPoint {
        &self.public_share
    }
}

impl Zeroize for PartyKey {
    fn zeroize(&mut self) {
        self.signing_scalar.zeroize();
        self.prefix.zeroize();
    }
}

impl Drop for PartyKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for PartyKey {}

impl std::fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartyKey")
            .field("signing_scalar", &"[REDACTED]")
            .field("prefix", &"[REDACTED]")
            .field("public_share", &self.public_share.compress())
            .finish()
    }
}

/// A party's durable output of distributed key generation.
///
/// Holds the secret share `x_i` of the joint key, the joint public key
/// `Y = Σ y_j`, and the party's nonce prefix. This is the minimal state a
/// party must persist to survive a restart and keep signing; everything
/// else can be rebuilt from the coordinator's group record.
///
/// **The share is secret material; the joint public key is not.**
#[derive(Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SharedKey {
    /// Secret share `x_i = Σ_j f_j(i + 1)`.
    #[cfg_attr(feature = "serde", serde(with = "scalar_serde"))]
    secret_share: Scalar,
    /// Joint public key `Y`.
    group_public_key: [u8; 32],
    /// RFC 8032 nonce prefix, carried over from the long-lived keypair.
    /// Mandatory: without it the party cannot derive signing nonces.
    prefix: [u8; 32],
    /// This party's assigned protocol index.
    party_index: u16,
}

impl SharedKey {
    pub(crate) fn new(
        secret_share: Scalar,
        group_public_key: [u8; 32],
        prefix: [u8; 32],
        party_index: u16,
    ) -> Self {
        Self { secret_share, group_public_key, prefix, party_index }
    }

    /// Get the joint public key `Y` all signatures verify under.
    pub fn group_public_key(&self) -> [u8; 32] {
        self.group_public_key
    }

    /// Get this party's assigned protocol index.
    pub fn party_index(&self) -> u16 {
        self.party_index
    }

    /// Get the secret share (for internal use).
    pub(crate) fn secret_share(&self) -> &Scalar {
        &self.secret_share
    }

    /// Get the nonce prefix (for internal use).
    pub(crate) fn prefix(&self) -> &[u8; 32] {
        &self.prefix
    }
}

impl Zeroize for SharedKey {
    fn zeroize(&mut self) {
        self.secret_share.zeroize();
        self.prefix.zeroize();
        self.group_public_key.zeroize();
        self.party_index = 0;
    }
}

impl Drop for SharedKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for SharedKey {}

impl std::fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKey")
            .field("secret_share", &"[REDACTED]")
            .field("prefix", &"[REDACTED]")
            .field("group_public_key", &self.group_public_key)
            .field("party_index", &self.party_index)
            .finish()
    }
}

/// Ephemeral nonce key for one signing session on one party.
///
/// The scalar is derived deterministically from `(prefix, message)`, so
/// the same party asked to sign the same message contributes the same
/// nonce point. Never persisted.
#[derive(Clone)]
pub(crate) struct EphemeralKey {
    /// Nonce scalar `r_i = SHA-512(prefix ‖ m) mod ℓ`.
    nonce_scalar: Scalar,
    /// Public nonce share `R_i = r_i · G`.
    nonce_point: EdwardsPoint,
}

impl EphemeralKey {
    /// Derive the session nonce key from the party's prefix and the message.
    pub(crate) fn derive(prefix: &[u8; 32], message: &[u8]) -> Self {
        let nonce_scalar = primitives::nonce_scalar(prefix, message);
        let nonce_point = EdwardsPoint::mul_base(&nonce_scalar);
        Self { nonce_scalar, nonce_point }
    }

    pub(crate) fn nonce_scalar(&self) -> &Scalar {
        &self.nonce_scalar
    }

    pub(crate) fn nonce_point_bytes(&self) -> [u8; 32] {
        primitives::encode_point(&self.nonce_point)
    }
}

impl Zeroize for EphemeralKey {
    fn zeroize(&mut self) {
        self.nonce_scalar.zeroize();
    }
}

impl Drop for EphemeralKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for EphemeralKey {}

impl std::fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralKey")
            .field("nonce_scalar", &"[REDACTED]")
            .field("nonce_point", &self.nonce_point.compress())
            .finish()
    }
}

/// A party's constructed share of the joint session nonce.
#[derive(Clone)]
pub(crate) struct EphemeralSharedKey {
    /// Share `rho_i = Σ_{j ∈ S} f'_j(i + 1)` of the joint nonce scalar.
    nonce_share: Scalar,
    /// Joint nonce point `R = Σ_{j ∈ S} R_j`, identical for all signers.
    group_nonce: [u8; 32],
}

impl EphemeralSharedKey {
    pub(crate) fn new(nonce_share: Scalar, group_nonce: [u8; 32]) -> Self {
        Self { nonce_share, group_nonce }
    }

    pub(crate) fn nonce_share(&self) -> &Scalar {
        &self.nonce_share
    }

    pub(crate) fn group_nonce(&self) -> [u8; 32] {
        self.group_nonce
    }
}

impl Zeroize for EphemeralSharedKey {
    fn zeroize(&mut self) {
        self.nonce_share.zeroize();
        self.group_nonce.zeroize();
    }
}

impl Drop for EphemeralSharedKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl ZeroizeOnDrop for EphemeralSharedKey {}

impl std::fmt::Debug for EphemeralSharedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralSharedKey")
            .field("nonce_share", &"[REDACTED]")
            .field("group_nonce", &self.group_nonce)
            .finish()
    }
}

/// Serde support for secret scalars, encoding the canonical 32 bytes.
#[cfg(feature = "serde")]
mod scalar_serde {
    use curve25519_dalek::scalar::Scalar;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(scalar: &Scalar, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        scalar.to_bytes().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = <[u8; 32]>::deserialize(deserializer)?;
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .ok_or_else(|| serde::de::Error::custom("non-canonical scalar encoding"))
    }
}
