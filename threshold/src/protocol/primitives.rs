//! Low-level cryptographic primitives for threshold Ed25519.
//!
//! Hash-to-scalar derivations, the hash commitment scheme and canonical
//! encoding checks shared by the key generation and signing rounds. All
//! functions here are pure; scalar arithmetic is delegated to
//! `curve25519-dalek` and is constant-time.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{ThresholdError, ThresholdResult};

/// Expand a 32-byte secret seed into a signing scalar and nonce prefix.
///
/// This is the RFC 8032 §5.1.5 expansion: the seed is hashed with SHA-512,
/// the lower half is clamped into the scalar, the upper half becomes the
/// nonce prefix used for deterministic per-message nonce derivation.
pub(crate) fn expand_secret_seed(seed: &[u8; 32]) -> (Scalar, [u8; 32]) {
    let digest = Sha512::digest(seed);

    let mut lower = [0u8; 32];
    lower.copy_from_slice(&digest[..32]);
    lower[0] &= 248;
    lower[31] &= 127;
    lower[31] |= 64;

    let mut prefix = [0u8; 32];
    prefix.copy_from_slice(&digest[32..]);

    (Scalar::from_bytes_mod_order(lower), prefix)
}

/// Derive the deterministic nonce scalar for a message.
///
/// `SHA-512(prefix ‖ message)` reduced wide, per RFC 8032 §5.1.6. A fixed
/// `(prefix, message)` pair always yields the same scalar, so a party's
/// nonce contribution is stable across retries of the same signing request.
pub(crate) fn nonce_scalar(prefix: &[u8; 32], message: &[u8]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(prefix);
    hasher.update(message);
    reduce_wide(&hasher.finalize())
}

/// Compute the Ed25519 challenge scalar `SHA-512(R ‖ Y ‖ m) mod ℓ`.
pub(crate) fn challenge_scalar(
    group_nonce: &[u8; 32],
    group_public_key: &[u8; 32],
    message: &[u8],
) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(group_nonce);
    hasher.update(group_public_key);
    hasher.update(message);
    reduce_wide(&hasher.finalize())
}

/// Reduce a 64-byte digest into a scalar mod ℓ.
fn reduce_wide(digest: &[u8]) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(digest);
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Hash commitment to a point: `SHA-256(encode(point) ‖ blind)`.
///
/// Opening is by byte equality against a recomputed commitment.
pub(crate) fn point_commitment(point: &[u8; 32], blind: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(point);
    hasher.update(blind);
    hasher.finalize().into()
}

/// Encode a point into its canonical 32-byte compressed Edwards form.
#[inline]
pub(crate) fn encode_point(point: &EdwardsPoint) -> [u8; 32] {
    point.compress().to_bytes()
}

/// Decode a 32-byte compressed Edwards point.
///
/// Rejects encodings that do not decompress, that are not canonical
/// (re-compression must reproduce the input bytes), or that lie outside the
/// prime-order subgroup. `what` names the field for the error message.
pub(crate) fn decode_point(bytes: &[u8; 32], what: &str) -> ThresholdResult<EdwardsPoint> {
    let point = CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or_else(|| ThresholdError::InvalidData(format!("{} is not a curve point", what)))?;

    if point.compress().to_bytes() != *bytes {
        return Err(ThresholdError::InvalidData(format!(
            "{} is a non-canonical point encoding",
            what
        )));
    }

    if !point.is_torsion_free() {
        return Err(ThresholdError::InvalidData(format!(
            "{} is outside the prime-order subgroup",
            what
        )));
    }

    Ok(point)
}

/// Decode a 32-byte scalar, rejecting non-canonical encodings (values ≥ ℓ).
pub(crate) fn decode_scalar(bytes: &[u8; 32], what: &str) -> ThresholdResult<Scalar> {
    Option::<Scalar>::from(Scalar::from_canonical_bytes(*bytes))
        .ok_or_else(|| ThresholdError::InvalidData(format!("{} is not a canonical scalar", what)))
}
