//! # Threshold Ed25519 Signature Scheme
//!
//! This crate implements a threshold variant of the Ed25519 signature
//! scheme, allowing a fixed group of parties to collectively sign messages
//! without any single party ever holding the complete signing key.
//!
//! ## Overview
//!
//! In a (t, n) threshold scheme:
//! - There are n total parties
//! - Any t or more parties can cooperate to produce a valid signature
//! - Fewer than t parties cannot produce a signature or learn the secret key
//!
//! Key generation is fully distributed (no trusted dealer): the parties run
//! a commit/open round over their public shares followed by Feldman
//! verifiable secret sharing, ending with each party holding a share of the
//! joint key and everyone agreeing on the joint public key `Y`. Signing
//! runs a second, ephemeral sharing round for the per-message nonce and
//! aggregates Lagrange-weighted local signatures into a standard 64-byte
//! Ed25519 signature that verifies under `Y` with any RFC 8032 compliant
//! verifier.
//!
//! ## Quick Start
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use threshold_ed25519::coordinator::{run_local_keygen, run_local_signing};
//! use threshold_ed25519::verify_signature;
//!
//! let mut rng = StdRng::seed_from_u64(7);
//!
//! // 1. Distributed key generation among three parties, threshold two
//! let (mut coordinator, mut parties) =
//!     run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).unwrap();
//! let group_key = coordinator.group().unwrap().group_public_key();
//!
//! // 2. Any two parties sign
//! let message = b"Hello, Threshold Signatures!";
//! let signature =
//!     run_local_signing(&mut coordinator, &mut parties[..2], message, &mut rng).unwrap();
//!
//! // 3. The output is a plain Ed25519 signature
//! assert!(verify_signature(&group_key, message, &signature));
//! ```
//!
//! The `run_local_*` drivers wire everything together in one process. In a
//! real deployment each [`ThresholdParty`] runs on its own machine and the
//! [`Coordinator`]'s packets move over whatever transport the application
//! provides; every payload type in [`broadcast`] is plain data (and
//! serde-serializable with the `serde` feature).
//!
//! ## Security Warning
//!
//! **This implementation is for research and experimentation purposes
//! only.** It has not undergone a security audit and should not be used in
//! production systems without thorough review. The protocol detects and
//! attributes misbehavior but does not tolerate it: any failed check aborts
//! the session.
//!
//! ## Protocol Usage
//!
//! Key generation, per party:
//!
//! 1. `register`: create the long-lived keypair, send the public share.
//! 2. `commit`: broadcast a hash commitment to the public share.
//! 3. `distribute`: after all commitments are opened, verify them and
//!    deal one verifiable share of the party's secret to every party.
//! 4. `construct`: verify the received shares and fold them into the
//!    party's share of the joint key; report the joint public key.
//!
//! Signing, per participating party: `open_signing`, `commit_nonce`,
//! `distribute_nonce`, `construct_nonce`, `local_signature`: the same
//! shape over the per-message nonce, followed by the coordinator's
//! verification and aggregation.
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization of the payload types
//!   and the persistable key material

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

// Core modules
pub mod broadcast;
mod config;
pub mod coordinator;
mod error;
mod keys;
pub mod participants;
mod party;

// Internal protocol implementation
pub(crate) mod protocol;

// ============================================================================
// Public API
// ============================================================================

// Configuration
pub use config::ThresholdConfig;

// Error types
pub use error::{validate_threshold_params, ThresholdError, ThresholdResult};

// Participant management
pub use participants::{ParticipantList, PartyId};

// Key types
pub use keys::{PartyKey, SharedKey};

// Payload types
pub use broadcast::{
	CommitOpen, ConstructPacket, DistributePacket, LocalSigReport, NonceOpen, ShareBundle,
	SharedKeyReport, Signature, SIGNATURE_SIZE,
};

// The party state machine and the coordinator
pub use coordinator::{Coordinator, GroupRecord};
pub use party::ThresholdParty;

// Verification
pub use verification::verify_signature;

/// Signature verification.
mod verification {
	use crate::broadcast::Signature;
	use crate::protocol::signing;

	/// Verify a threshold signature.
	///
	/// The signature is a standard Ed25519 signature, so this performs the
	/// RFC 8032 §5.1.7 verification of `R ‖ s` against the 32-byte joint
	/// public key: both points must decode canonically, `s` must be a
	/// reduced scalar, and `s·G == R + SHA-512(R ‖ Y ‖ m)·Y` must hold.
	/// Any compliant Ed25519 verifier accepts the same signatures.
	///
	/// # Arguments
	///
	/// * `group_public_key` - The joint public key `Y` from key generation
	/// * `message` - The message that was signed
	/// * `signature` - The signature to verify
	///
	/// # Returns
	///
	/// `true` if the signature is valid, `false` otherwise.
	pub fn verify_signature(
		group_public_key: &[u8; 32],
		message: &[u8],
		signature: &Signature,
	) -> bool {
		signing::verify_bytes(signature.as_bytes(), message, group_public_key)
	}
}

// ============================================================================
// Constants
// ============================================================================

/// Minimum threshold value (at least 2 parties required).
pub use error::MIN_THRESHOLD;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_constants() {
		assert_eq!(MIN_THRESHOLD, 2);
		assert_eq!(SIGNATURE_SIZE, 64);
	}

	#[test]
	fn test_config_creation() {
		let config = ThresholdConfig::new(2, 3);
		assert!(config.is_ok());

		let config = config.unwrap();
		assert_eq!(config.threshold(), 2);
		assert_eq!(config.total_parties(), 3);
	}
}
