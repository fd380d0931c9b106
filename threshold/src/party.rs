//! Per-party protocol state machine.
//!
//! Each party in the threshold scheme runs one `ThresholdParty`. It owns
//! the party's long-lived secret material across the key generation rounds
//! and a table of ephemeral signing sessions, and exposes one method per
//! protocol step. A coordinator (local or remote) drives the rounds by
//! passing the packets between parties; see [`crate::coordinator`].
//!
//! # Key generation
//!
//! ```text
//! Idle ─register─▶ Registered ─commit─▶ Committed ─distribute─▶ Distributed
//!      ─construct─▶ Ready
//! ```
//!
//! # Signing
//!
//! A `Ready` party can serve any number of concurrent signing sessions.
//! `open_signing` returns an opaque handle; the per-session state machine is
//!
//! ```text
//! Opened ─commit_nonce─▶ Committed ─distribute_nonce─▶ Distributed
//!        ─construct_nonce─▶ Constructed ─local_signature─▶ Signed
//! ```
//!
//! # Failure behavior
//!
//! A failed verification aborts the round: the party's keygen state (or the
//! affected signing session) is discarded and its secrets are wiped. There
//! is no retry at this layer; the caller starts a fresh session.
//!
//! # Security
//!
//! - Secret material never appears in any returned payload except the
//!   shares inside a [`ShareBundle`], each of which is destined for exactly
//!   one recipient; the transport is expected to deliver them
//!   confidentially.
//! - All state is zeroized on reset, on session close and on drop.

use std::collections::HashMap;

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, error};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::broadcast::{
	CommitOpen, ConstructPacket, DistributePacket, LocalSigReport, NonceOpen, ShareBundle,
	SharedKeyReport,
};
use crate::error::{validate_threshold_params, ThresholdError, ThresholdResult};
use crate::keys::{EphemeralKey, EphemeralSharedKey, PartyKey, SharedKey};
use crate::participants::PartyId;
use crate::protocol::{primitives, signing, vss};

/// One party's view of the threshold protocol.
pub struct ThresholdParty {
	/// This party's identifier.
	party_id: PartyId,
	/// Key generation state.
	state: PartyState,
	/// Live signing sessions, keyed by opaque handle.
	sessions: HashMap<String, SigningSession>,
}

/// Key generation state of the party.
enum PartyState {
	/// No key material yet.
	Idle,
	/// Long-lived keypair created.
	Registered { keys: PartyKey },
	/// Commitment to the public share broadcast.
	Committed { keys: PartyKey },
	/// Shares dealt; waiting for everyone else's.
	Distributed { keys: PartyKey, party_index: u16 },
	/// Shared key constructed; the party can sign.
	Ready { keys: PartyKey, shared: SharedKey },
}

impl Default for PartyState {
	fn default() -> Self {
		PartyState::Idle
	}
}

/// One signing session on this party.
struct SigningSession {
	/// The message being signed.
	message: Vec<u8>,
	/// Session round state.
	state: SessionState,
}

/// Round state of a signing session.
enum SessionState {
	/// Ephemeral nonce derived.
	Opened { key: EphemeralKey },
	/// Nonce commitment produced.
	Committed { key: EphemeralKey },
	/// Nonce shares dealt.
	Distributed { key: EphemeralKey },
	/// Joint nonce constructed; ready to sign.
	Constructed { shared_nonce: EphemeralSharedKey, subset: Vec<u16> },
	/// Local signature emitted.
	Signed,
}

impl ThresholdParty {
	/// Create a party with the given identifier and no key material.
	pub fn new(party_id: impl Into<PartyId>) -> Self {
		Self { party_id: party_id.into(), state: PartyState::Idle, sessions: HashMap::new() }
	}

	/// Get this party's identifier.
	pub fn party_id(&self) -> &str {
		&self.party_id
	}

	/// Get the party's encoded public share, once registered.
	pub fn public_share(&self) -> Option<[u8; 32]> {
		match &self.state {
			PartyState::Idle => None,
			PartyState::Registered { keys }
			| PartyState::Committed { keys }
			| PartyState::Distributed { keys, .. }
			| PartyState::Ready { keys, .. } => Some(keys.public_share()),
		}
	}

	/// Get the constructed shared key, once key generation has completed.
	pub fn shared_key(&self) -> Option<&SharedKey> {
		match &self.state {
			PartyState::Ready { shared, .. } => Some(shared),
			_ => None,
		}
	}

	/// Get the party's assigned protocol index, once known.
	pub fn party_index(&self) -> Option<u16> {
		match &self.state {
			PartyState::Distributed { party_index, .. } => Some(*party_index),
			PartyState::Ready { shared, .. } => Some(shared.party_index()),
			_ => None,
		}
	}

	/// Number of live signing sessions.
	pub fn open_sessions(&self) -> usize {
		self.sessions.len()
	}

	// ========================================================================
	// Key generation
	// ========================================================================

	/// Create the party's long-lived keypair and return its public share.
	///
	/// # Errors
	///
	/// Fails if the party already holds key material.
	///
	/// # State Transition
	///
	/// `Idle` → `Registered`
	pub fn register<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> ThresholdResult<[u8; 32]> {
		if !matches!(self.state, PartyState::Idle) {
			return Err(ThresholdError::InvalidState {
				current: self.state_name(),
				expected: "Idle",
			});
		}

		let keys = PartyKey::create(rng);
		let public_share = keys.public_share();
		debug!(party = %self.party_id, "registered long-lived keypair");
		self.state = PartyState::Registered { keys };
		Ok(public_share)
	}

	/// Like [`register`](Self::register), but expands a caller-supplied
	/// 32-byte secret seed instead of drawing fresh randomness.
	pub fn register_with_seed(&mut self, seed: &[u8; 32]) -> ThresholdResult<[u8; 32]> {
		if !matches!(self.state, PartyState::Idle) {
			return Err(ThresholdError::InvalidState {
				current: self.state_name(),
				expected: "Idle",
			});
		}

		let keys = PartyKey::create_from_seed(seed);
		let public_share = keys.public_share();
		self.state = PartyState::Registered { keys };
		Ok(public_share)
	}

	/// Produce the hash commitment to this party's public share.
	///
	/// # State Transition
	///
	/// `Registered` → `Committed`
	pub fn commit<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> ThresholdResult<CommitOpen> {
		let keys = match std::mem::take(&mut self.state) {
			PartyState::Registered { keys } => keys,
			other => {
				self.state = other;
				return Err(ThresholdError::InvalidState {
					current: self.state_name(),
					expected: "Registered",
				});
			},
		};

		let mut blind = [0u8; 32];
		rng.fill_bytes(&mut blind);
		let commitment = primitives::point_commitment(&keys.public_share(), &blind);

		self.state = PartyState::Committed { keys };
		Ok(CommitOpen::new(self.party_id.clone(), commitment, blind))
	}

	/// Verify everyone's commitment openings and deal shares of this
	/// party's secret.
	///
	/// # Arguments
	///
	/// * `packet` - The coordinator's distribute packet with all parties'
	///   openings and this party's assigned position
	///
	/// # Errors
	///
	/// - `InvalidState` when called out of order (state is preserved)
	/// - `ProtocolFailure` naming the first party whose opening does not
	///   match its commitment (state is discarded)
	/// - `InvalidData` for a malformed packet (state is discarded)
	///
	/// # State Transition
	///
	/// `Committed` → `Distributed`
	pub fn distribute<R: RngCore + CryptoRng>(
		&mut self,
		packet: &DistributePacket,
		rng: &mut R,
	) -> ThresholdResult<ShareBundle> {
		let keys = match std::mem::take(&mut self.state) {
			PartyState::Committed { keys } => keys,
			other => {
				self.state = other;
				return Err(ThresholdError::InvalidState {
					current: self.state_name(),
					expected: "Committed",
				});
			},
		};

		Self::check_packet_shape(
			packet.member_indices.len(),
			packet.my_position,
			&[packet.points.len(), packet.commitments.len(), packet.blinds.len()],
		)?;
		validate_threshold_params(packet.threshold, packet.member_indices.len() as u16)?;

		if packet.points[packet.my_position] != keys.public_share() {
			return Err(ThresholdError::InvalidData(
				"distribute packet does not list this party's public share".to_string(),
			));
		}

		self.verify_openings(packet)?;

		let party_index = packet.member_indices[packet.my_position];
		let bundle = Self::deal_shares(
			self.party_id.clone(),
			keys.signing_scalar(),
			packet.threshold,
			&packet.member_indices,
			rng,
		);

		debug!(party = %self.party_id, index = party_index, "dealt key shares");
		self.state = PartyState::Distributed { keys, party_index };
		Ok(bundle)
	}

	/// Verify the received shares and construct this party's shared key.
	///
	/// Each dealer's share is checked against its commitment vector, and
	/// each commitment vector must open to the dealer's public share. On
	/// success the party holds `x_i = Σ_j s_{j→i}` and the joint key
	/// `Y = Σ_j y_j`, and reports the latter.
	///
	/// # Errors
	///
	/// `ProtocolFailure` naming the first dealer whose sharing fails
	/// verification; the keygen state is discarded.
	///
	/// # State Transition
	///
	/// `Distributed` → `Ready`
	pub fn construct(&mut self, packet: &ConstructPacket) -> ThresholdResult<SharedKeyReport> {
		let (keys, party_index) = match std::mem::take(&mut self.state) {
			PartyState::Distributed { keys, party_index } => (keys, party_index),
			other => {
				self.state = other;
				return Err(ThresholdError::InvalidState {
					current: self.state_name(),
					expected: "Distributed",
				});
			},
		};

		Self::check_packet_shape(
			packet.member_indices.len(),
			packet.my_position,
			&[packet.points.len(), packet.commitment_vectors.len(), packet.shares.len()],
		)?;
		if packet.member_indices[packet.my_position] != party_index {
			return Err(ThresholdError::InvalidData(
				"construct packet addressed to a different protocol index".to_string(),
			));
		}

		let (secret_share, group_point) =
			Self::fold_shares(packet, party_index, &self.party_id)?;

		let group_public_key = primitives::encode_point(&group_point);
		let report = SharedKeyReport {
			party_id: self.party_id.clone(),
			public_share: keys.public_share(),
			group_public_key,
		};

		let shared = SharedKey::new(secret_share, group_public_key, *keys.prefix(), party_index);
		debug!(party = %self.party_id, index = party_index, "constructed shared key");
		self.state = PartyState::Ready { keys, shared };
		Ok(report)
	}

	// ========================================================================
	// Signing
	// ========================================================================

	/// Open a signing session for a message.
	///
	/// Derives the deterministic ephemeral nonce from the party's prefix
	/// and the message, and returns an opaque session handle together with
	/// the public nonce share `R_i`. The same `(party, message)` pair
	/// always produces the same `R_i`.
	///
	/// # Errors
	///
	/// Fails unless key generation has completed (`Ready`).
	pub fn open_signing(&mut self, message: &[u8]) -> ThresholdResult<(String, [u8; 32])> {
		let shared = match &self.state {
			PartyState::Ready { shared, .. } => shared,
			_ => {
				return Err(ThresholdError::InvalidState {
					current: self.state_name(),
					expected: "Ready",
				});
			},
		};

		let key = EphemeralKey::derive(shared.prefix(), message);
		let nonce_point = key.nonce_point_bytes();
		let handle = Uuid::new_v4().to_string();

		debug!(party = %self.party_id, session = %handle, "opened signing session");
		self.sessions.insert(
			handle.clone(),
			SigningSession { message: message.to_vec(), state: SessionState::Opened { key } },
		);
		Ok((handle, nonce_point))
	}

	/// Produce the commitment opening for the session's nonce point.
	///
	/// # Session Transition
	///
	/// `Opened` → `Committed`
	pub fn commit_nonce<R: RngCore + CryptoRng>(
		&mut self,
		handle: &str,
		rng: &mut R,
	) -> ThresholdResult<NonceOpen> {
		let session = self.session_mut(handle)?;
		let key = match &session.state {
			SessionState::Opened { key } => key.clone(),
			_ => {
				return Err(ThresholdError::InvalidState {
					current: session.state_name(),
					expected: "Opened",
				});
			},
		};

		let mut blind = [0u8; 32];
		rng.fill_bytes(&mut blind);
		let nonce_point = key.nonce_point_bytes();
		let commitment = primitives::point_commitment(&nonce_point, &blind);

		session.state = SessionState::Committed { key };
		Ok(NonceOpen::new(self.party_id.clone(), nonce_point, commitment, blind))
	}

	/// Verify the subset's nonce commitment openings and deal shares of
	/// this party's nonce scalar across the signing subset.
	///
	/// A failure discards the signing session (the long-lived key is
	/// unaffected).
	///
	/// # Session Transition
	///
	/// `Committed` → `Distributed`
	pub fn distribute_nonce<R: RngCore + CryptoRng>(
		&mut self,
		handle: &str,
		packet: &DistributePacket,
		rng: &mut R,
	) -> ThresholdResult<ShareBundle> {
		let party_index = self.require_party_index()?;
		let session = self.session_mut(handle)?;
		let key = match &session.state {
			SessionState::Committed { key } => key.clone(),
			_ => {
				return Err(ThresholdError::InvalidState {
					current: session.state_name(),
					expected: "Committed",
				});
			},
		};

		let result: ThresholdResult<ShareBundle> = (|| {
			Self::check_packet_shape(
				packet.member_indices.len(),
				packet.my_position,
				&[packet.points.len(), packet.commitments.len(), packet.blinds.len()],
			)?;
			validate_threshold_params(packet.threshold, packet.member_indices.len() as u16)?;

			if packet.member_indices[packet.my_position] != party_index {
				return Err(ThresholdError::InvalidData(
					"nonce distribute packet addressed to a different protocol index".to_string(),
				));
			}
			if packet.points[packet.my_position] != key.nonce_point_bytes() {
				return Err(ThresholdError::InvalidData(
					"nonce distribute packet does not list this party's nonce point".to_string(),
				));
			}

			self.verify_openings(packet)?;

			Ok(Self::deal_shares(
				self.party_id.clone(),
				key.nonce_scalar(),
				packet.threshold,
				&packet.member_indices,
				rng,
			))
		})();

		match result {
			Ok(bundle) => {
				let session = self.session_mut(handle)?;
				session.state = SessionState::Distributed { key };
				Ok(bundle)
			},
			Err(err) => {
				self.sessions.remove(handle);
				Err(err)
			},
		}
	}

	/// Verify the received nonce shares and construct the joint nonce.
	///
	/// Returns the joint nonce point `R = Σ_{j∈S} R_j`, which is identical
	/// for every participant of the session.
	///
	/// # Session Transition
	///
	/// `Distributed` → `Constructed`
	pub fn construct_nonce(
		&mut self,
		handle: &str,
		packet: &ConstructPacket,
	) -> ThresholdResult<[u8; 32]> {
		let party_index = self.require_party_index()?;
		let session = self.session_mut(handle)?;
		if !matches!(session.state, SessionState::Distributed { .. }) {
			return Err(ThresholdError::InvalidState {
				current: session.state_name(),
				expected: "Distributed",
			});
		}

		let result: ThresholdResult<(Scalar, EdwardsPoint)> = (|| {
			Self::check_packet_shape(
				packet.member_indices.len(),
				packet.my_position,
				&[packet.points.len(), packet.commitment_vectors.len(), packet.shares.len()],
			)?;
			if packet.member_indices[packet.my_position] != party_index {
				return Err(ThresholdError::InvalidData(
					"nonce construct packet addressed to a different protocol index".to_string(),
				));
			}
			Self::fold_shares(packet, party_index, &self.party_id)
		})();

		match result {
			Ok((nonce_share, group_point)) => {
				let group_nonce = primitives::encode_point(&group_point);
				let shared_nonce = EphemeralSharedKey::new(nonce_share, group_nonce);
				let subset = packet.member_indices.clone();
				let session = self.session_mut(handle)?;
				session.state = SessionState::Constructed { shared_nonce, subset };
				Ok(group_nonce)
			},
			Err(err) => {
				self.sessions.remove(handle);
				Err(err)
			},
		}
	}

	/// Emit this party's local signature for the session.
	///
	/// Computes the Ed25519 challenge `k = SHA-512(R ‖ Y ‖ m) mod ℓ` and
	/// the Lagrange-weighted share `gamma_i = λ_i · (rho_i + k · x_i)`.
	/// The challenge is reported alongside the share so the coordinator
	/// can cross-check that every signer agreed on `(R, Y, m)`.
	///
	/// # Session Transition
	///
	/// `Constructed` → `Signed`
	pub fn local_signature(&mut self, handle: &str) -> ThresholdResult<LocalSigReport> {
		let shared = match &self.state {
			PartyState::Ready { shared, .. } => shared,
			_ => {
				return Err(ThresholdError::InvalidState {
					current: self.state_name(),
					expected: "Ready",
				});
			},
		};
		let party_index = shared.party_index();
		let secret_share = *shared.secret_share();
		let group_public_key = shared.group_public_key();

		let session = self
			.sessions
			.get_mut(handle)
			.ok_or_else(|| ThresholdError::UnknownSession(handle.to_string()))?;
		let (shared_nonce, subset) = match &session.state {
			SessionState::Constructed { shared_nonce, subset } => {
				(shared_nonce.clone(), subset.clone())
			},
			_ => {
				return Err(ThresholdError::InvalidState {
					current: session.state_name(),
					expected: "Constructed",
				});
			},
		};

		let challenge = primitives::challenge_scalar(
			&shared_nonce.group_nonce(),
			&group_public_key,
			&session.message,
		);
		let interpolation: Vec<u16> = subset.iter().map(|&index| index + 1).collect();
		let lambda = vss::lagrange_coefficient(party_index + 1, &interpolation)?;
		let gamma = signing::local_signature(
			shared_nonce.nonce_share(),
			&challenge,
			&lambda,
			&secret_share,
		);

		session.state = SessionState::Signed;
		Ok(LocalSigReport {
			party_id: self.party_id.clone(),
			signature_share: gamma.to_bytes(),
			challenge: challenge.to_bytes(),
		})
	}

	/// Close a signing session, wiping its ephemeral secrets.
	///
	/// Closing an unknown handle is a no-op: the session may already have
	/// been discarded by a failed round.
	pub fn close_session(&mut self, handle: &str) {
		self.sessions.remove(handle);
	}

	/// Cancel everything: wipe all signing sessions and the keygen state.
	pub fn reset(&mut self) {
		self.sessions.clear();
		self.state = PartyState::Idle;
	}

	// ========================================================================
	// Helpers
	// ========================================================================

	fn session_mut(&mut self, handle: &str) -> ThresholdResult<&mut SigningSession> {
		self.sessions
			.get_mut(handle)
			.ok_or_else(|| ThresholdError::UnknownSession(handle.to_string()))
	}

	fn require_party_index(&self) -> ThresholdResult<u16> {
		self.party_index().ok_or(ThresholdError::InvalidState {
			current: self.state_name(),
			expected: "Ready",
		})
	}

	/// Structural validation shared by the packet-consuming operations.
	fn check_packet_shape(
		members: usize,
		my_position: usize,
		lengths: &[usize],
	) -> ThresholdResult<()> {
		if my_position >= members {
			return Err(ThresholdError::InvalidData(
				"packet position out of range".to_string(),
			));
		}
		if lengths.iter().any(|&len| len != members) {
			return Err(ThresholdError::InvalidData(
				"packet field lengths do not match the member count".to_string(),
			));
		}
		Ok(())
	}

	/// Check every peer's commitment opening in a distribute packet.
	fn verify_openings(&self, packet: &DistributePacket) -> ThresholdResult<()> {
		for position in 0..packet.member_indices.len() {
			if position == packet.my_position {
				continue;
			}
			let expected =
				primitives::point_commitment(&packet.points[position], &packet.blinds[position]);
			if expected != packet.commitments[position] {
				let party_index = packet.member_indices[position];
				error!(party = %self.party_id, offender = party_index, "commitment opening mismatch");
				return Err(ThresholdError::ProtocolFailure { party_index });
			}
		}
		Ok(())
	}

	/// Deal VSS shares of a secret across the member indices.
	fn deal_shares<R: RngCore + CryptoRng>(
		party_id: PartyId,
		secret: &Scalar,
		threshold: u16,
		member_indices: &[u16],
		rng: &mut R,
	) -> ShareBundle {
		let indices: Vec<u16> = member_indices.iter().map(|&index| index + 1).collect();
		let (commitments, mut shares) = vss::share(secret, threshold, &indices, rng);

		let bundle = ShareBundle {
			party_id,
			commitments: commitments.iter().map(primitives::encode_point).collect(),
			shares: shares.iter().map(|share| share.to_bytes()).collect(),
		};

		for share in shares.iter_mut() {
			share.zeroize();
		}

		bundle
	}

	/// Verify and fold the shares of a construct packet.
	///
	/// Checks, per dealer: the commitment vector has length `t` and opens
	/// to the dealer's public point, and the share addressed to this party
	/// verifies against it. Returns the folded secret share and the sum of
	/// the dealers' public points.
	fn fold_shares(
		packet: &ConstructPacket,
		party_index: u16,
		party_id: &str,
	) -> ThresholdResult<(Scalar, EdwardsPoint)> {
		let eval_at = party_index + 1;
		let mut folded = Scalar::ZERO;
		let mut group_point = EdwardsPoint::identity();

		for position in 0..packet.member_indices.len() {
			let dealer_index = packet.member_indices[position];
			let fail = |reason: &str| {
				error!(party = %party_id, offender = dealer_index, reason, "share verification failed");
				ThresholdError::ProtocolFailure { party_index: dealer_index }
			};

			if packet.commitment_vectors[position].len() != packet.threshold as usize {
				return Err(fail("commitment vector length"));
			}

			let dealer_point =
				primitives::decode_point(&packet.points[position], "dealer public point")
					.map_err(|_| fail("public point encoding"))?;

			let commitments: Vec<EdwardsPoint> = packet.commitment_vectors[position]
				.iter()
				.map(|bytes| primitives::decode_point(bytes, "share commitment"))
				.collect::<ThresholdResult<_>>()
				.map_err(|_| fail("commitment encoding"))?;

			// The constant-term commitment must be the dealer's public
			// point, otherwise the dealt secret is not the committed one.
			if commitments[0] != dealer_point {
				return Err(fail("commitment does not open to public point"));
			}

			let mut share = primitives::decode_scalar(&packet.shares[position], "share")
				.map_err(|_| fail("share encoding"))?;
			if !vss::verify_share(&commitments, eval_at, &share) {
				share.zeroize();
				return Err(fail("share does not match commitment vector"));
			}

			folded += share;
			share.zeroize();
			group_point += dealer_point;
		}

		Ok((folded, group_point))
	}

	/// Get the current keygen state name (for error messages).
	fn state_name(&self) -> &'static str {
		match &self.state {
			PartyState::Idle => "Idle",
			PartyState::Registered { .. } => "Registered",
			PartyState::Committed { .. } => "Committed",
			PartyState::Distributed { .. } => "Distributed",
			PartyState::Ready { .. } => "Ready",
		}
	}
}

impl SigningSession {
	fn state_name(&self) -> &'static str {
		match &self.state {
			SessionState::Opened { .. } => "Opened",
			SessionState::Committed { .. } => "Committed",
			SessionState::Distributed { .. } => "Distributed",
			SessionState::Constructed { .. } => "Constructed",
			SessionState::Signed => "Signed",
		}
	}
}

impl Drop for ThresholdParty {
	fn drop(&mut self) {
		self.reset();
	}
}
