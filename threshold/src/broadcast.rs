//! Message payload types for the threshold protocol.
//!
//! These types represent the payloads exchanged between the parties and
//! the coordinator during key generation and signing. Every field is a
//! canonical 32-byte encoding of a curve object, hash or blind factor;
//! conversion to typed curve elements happens inside the party and
//! coordinator operations, never on the wire.
//!
//! # Protocol flow
//!
//! ```text
//! Key generation:
//!   register      party -> coordinator   (party_id, y_i)
//!   CommitOpen    party -> coordinator   commitment to y_i plus opening
//!   DistributePacket  coordinator -> party   everyone's openings
//!   ShareBundle   party -> coordinator   VSS commitments + shares
//!   ConstructPacket   coordinator -> party   shares addressed to the party
//!   SharedKeyReport   party -> coordinator   the joint public key it computed
//!
//! Signing (over the subset S):
//!   NonceOpen     party -> coordinator   R_i plus commitment opening
//!   DistributePacket / ShareBundle / ConstructPacket   as above, over S
//!   LocalSigReport    party -> coordinator   gamma_i and the challenge
//! ```
//!
//! All payload types implement `serde::Serialize` and `serde::Deserialize`
//! (when the `serde` feature is enabled) for easy network transmission.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::participants::PartyId;

/// Size of the final Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Commitment to a party's public share, with its opening.
///
/// The commitment is `SHA-256(y_i ‖ blind)`; peers recompute it from the
/// revealed values before accepting `y_i` into the joint key. A party that
/// swaps its public share after seeing the others' is caught here.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CommitOpen {
	/// The party that produced this commitment.
	pub party_id: PartyId,
	/// Hash commitment to the party's public share.
	pub commitment: [u8; 32],
	/// The 32-byte blind factor opening the commitment.
	pub blind: [u8; 32],
}

impl CommitOpen {
	/// Create a new commitment opening.
	pub fn new(party_id: PartyId, commitment: [u8; 32], blind: [u8; 32]) -> Self {
		Self { party_id, commitment, blind }
	}
}

/// A signing party's nonce point with its commitment opening.
///
/// The signing analogue of [`CommitOpen`]: `R_i` rides along because the
/// coordinator learns it here for the first time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NonceOpen {
	/// The party that produced this nonce.
	pub party_id: PartyId,
	/// The party's public nonce share `R_i`.
	pub nonce_point: [u8; 32],
	/// Hash commitment to `R_i`.
	pub commitment: [u8; 32],
	/// The 32-byte blind factor opening the commitment.
	pub blind: [u8; 32],
}

impl NonceOpen {
	/// Create a new nonce opening.
	pub fn new(
		party_id: PartyId,
		nonce_point: [u8; 32],
		commitment: [u8; 32],
		blind: [u8; 32],
	) -> Self {
		Self { party_id, nonce_point, commitment, blind }
	}
}

/// A dealer's verifiable sharing of its secret.
///
/// Contains the per-coefficient commitment vector (length `t`, first entry
/// the dealer's public share) and one share per recipient, ordered by the
/// recipients' positions in the round's member list. Each share is
/// confidential to its recipient; the coordinator rearranges the bundles
/// into per-recipient [`ConstructPacket`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShareBundle {
	/// The dealing party.
	pub party_id: PartyId,
	/// Base-point commitments to the polynomial coefficients.
	pub commitments: Vec<[u8; 32]>,
	/// Shares by recipient position: `shares[p]` is for the party at
	/// position `p` in the member list.
	pub shares: Vec<[u8; 32]>,
}

/// A party's report of the joint public key it constructed.
///
/// The secret share `x_i` stays on the party; only the public result is
/// reported so the coordinator can check that everyone agrees.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SharedKeyReport {
	/// The reporting party.
	pub party_id: PartyId,
	/// The party's own public share `y_i`.
	pub public_share: [u8; 32],
	/// The joint public key `Y = Σ y_j` the party computed.
	pub group_public_key: [u8; 32],
}

/// A party's local signature over the session message.
///
/// The challenge is reported alongside the share so the coordinator can
/// detect a party that signed against a different `(R, Y, m)`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalSigReport {
	/// The signing party.
	pub party_id: PartyId,
	/// The Lagrange-weighted local signature `gamma_i`.
	pub signature_share: [u8; 32],
	/// The Ed25519 challenge `k` the party derived.
	pub challenge: [u8; 32],
}

/// Round packet: everything a party needs to verify the commitment
/// openings and deal its shares.
///
/// Built by the coordinator once a round's openings are complete. The
/// vectors are ordered by `member_indices`; in key generation the members
/// are all `n` parties (indices `0..n`), in signing they are the sorted
/// subset `S`. The secret-sharing layer evaluates at `index + 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistributePacket {
	/// The signing threshold `t`.
	pub threshold: u16,
	/// Protocol indices of the round's members, ascending.
	pub member_indices: Vec<u16>,
	/// The recipient's position within `member_indices`.
	pub my_position: usize,
	/// Each member's public point (`y_j` in keygen, `R_j` in signing).
	pub points: Vec<[u8; 32]>,
	/// Each member's hash commitment.
	pub commitments: Vec<[u8; 32]>,
	/// Each member's blind factor.
	pub blinds: Vec<[u8; 32]>,
}

/// Round packet: the shares addressed to one party, with everything
/// needed to verify them.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstructPacket {
	/// The signing threshold `t`.
	pub threshold: u16,
	/// Protocol indices of the round's members, ascending.
	pub member_indices: Vec<u16>,
	/// The recipient's position within `member_indices`.
	pub my_position: usize,
	/// Each member's public point (`y_j` in keygen, `R_j` in signing).
	pub points: Vec<[u8; 32]>,
	/// Each dealer's commitment vector, by member position.
	pub commitment_vectors: Vec<Vec<[u8; 32]>>,
	/// The shares addressed to the recipient, by dealer position.
	pub shares: Vec<[u8; 32]>,
}

/// A threshold Ed25519 signature.
///
/// This is the final output of the signing protocol: the 64-byte
/// concatenation `R ‖ s`, bit-for-bit compatible with RFC 8032. Verifiers
/// do not need to know the signature was produced by a threshold scheme.
///
/// # Verification
///
/// Use [`verify_signature`](crate::verify_signature) or any compliant
/// Ed25519 implementation:
///
/// ```ignore
/// let is_valid = verify_signature(&group_public_key, message, &signature);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Signature {
	/// `R ‖ s` in standard Ed25519 layout.
	#[cfg_attr(feature = "serde", serde(with = "serde_arrays"))]
	bytes: [u8; SIGNATURE_SIZE],
}

impl Signature {
	/// Create a signature from bytes.
	///
	/// Returns `None` if the slice is not exactly [`SIGNATURE_SIZE`] bytes.
	pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
		if bytes.len() != SIGNATURE_SIZE {
			return None;
		}
		let mut fixed = [0u8; SIGNATURE_SIZE];
		fixed.copy_from_slice(bytes);
		Some(Self { bytes: fixed })
	}

	/// Assemble a signature from its `R` point and `s` scalar encodings.
	pub(crate) fn from_parts(group_nonce: &[u8; 32], s: &[u8; 32]) -> Self {
		let mut bytes = [0u8; SIGNATURE_SIZE];
		bytes[..32].copy_from_slice(group_nonce);
		bytes[32..].copy_from_slice(s);
		Self { bytes }
	}

	/// Get the signature as a byte array.
	pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
		&self.bytes
	}

	/// Convert the signature into its byte array.
	pub fn into_bytes(self) -> [u8; SIGNATURE_SIZE] {
		self.bytes
	}

	/// Get the encoded nonce point `R` (the first 32 bytes).
	pub fn nonce_bytes(&self) -> [u8; 32] {
		let mut r = [0u8; 32];
		r.copy_from_slice(&self.bytes[..32]);
		r
	}

	/// Get the encoded scalar `s` (the last 32 bytes).
	pub fn scalar_bytes(&self) -> [u8; 32] {
		let mut s = [0u8; 32];
		s.copy_from_slice(&self.bytes[32..]);
		s
	}
}

impl AsRef<[u8]> for Signature {
	fn as_ref(&self) -> &[u8] {
		&self.bytes
	}
}

/// Serde support for fixed-size arrays larger than 32 bytes.
#[cfg(feature = "serde")]
mod serde_arrays {
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S, const N: usize>(arr: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		arr.as_slice().serialize(serializer)
	}

	pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
	where
		D: Deserializer<'de>,
	{
		let vec: Vec<u8> = Vec::deserialize(deserializer)?;
		if vec.len() != N {
			return Err(serde::de::Error::custom(format!(
				"expected {} bytes, got {}",
				N,
				vec.len()
			)));
		}
		let mut arr = [0u8; N];
		arr.copy_from_slice(&vec);
		Ok(arr)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_commit_open() {
		let msg = CommitOpen::new("p0".into(), [0x42u8; 32], [0x43u8; 32]);
		assert_eq!(msg.party_id, "p0");
		assert_eq!(msg.commitment, [0x42u8; 32]);
		assert_eq!(msg.blind, [0x43u8; 32]);
	}

	#[test]
	fn test_signature_from_bytes() {
		let bytes = vec![0u8; SIGNATURE_SIZE];
		let sig = Signature::from_bytes(&bytes).unwrap();
		assert_eq!(sig.as_bytes().len(), SIGNATURE_SIZE);
	}

	#[test]
	fn test_signature_from_bytes_invalid_length() {
		assert!(Signature::from_bytes(&[0u8; 63]).is_none());
		assert!(Signature::from_bytes(&[0u8; 65]).is_none());
	}

	#[test]
	fn test_signature_parts_roundtrip() {
		let r = [0xAAu8; 32];
		let s = [0xBBu8; 32];
		let sig = Signature::from_parts(&r, &s);
		assert_eq!(sig.nonce_bytes(), r);
		assert_eq!(sig.scalar_bytes(), s);
		assert_eq!(&sig.as_bytes()[..32], &r);
		assert_eq!(&sig.as_bytes()[32..], &s);
	}

	#[cfg(feature = "serde")]
	mod serde_tests {
		use super::*;

		#[test]
		fn test_commit_open_serde() {
			let msg = CommitOpen::new("p1".into(), [1u8; 32], [2u8; 32]);
			let json = serde_json::to_string(&msg).unwrap();
			let recovered: CommitOpen = serde_json::from_str(&json).unwrap();
			assert_eq!(msg, recovered);
		}

		#[test]
		fn test_share_bundle_serde() {
			let bundle = ShareBundle {
				party_id: "p2".into(),
				commitments: vec![[3u8; 32], [4u8; 32]],
				shares: vec![[5u8; 32], [6u8; 32], [7u8; 32]],
			};
			let json = serde_json::to_string(&bundle).unwrap();
			let recovered: ShareBundle = serde_json::from_str(&json).unwrap();
			assert_eq!(bundle, recovered);
		}

		#[test]
		fn test_signature_serde() {
			let sig = Signature::from_parts(&[8u8; 32], &[9u8; 32]);
			let json = serde_json::to_string(&sig).unwrap();
			let recovered: Signature = serde_json::from_str(&json).unwrap();
			assert_eq!(sig, recovered);
		}
	}
}
