//! Session coordinator for the threshold protocol.
//!
//! The coordinator orchestrates one key generation session and any number
//! of signing sessions against its result. It buffers each round's
//! contributions, checks cross-party consistency, builds the packets each
//! party consumes in the next round, and performs the final aggregation
//! and signature verification.
//!
//! The coordinator holds no secret material: everything it sees is public
//! commitments, public points and (encrypted-in-transit) share routing. A
//! compromised coordinator can deny service but cannot forge signatures.
//!
//! # Round ordering
//!
//! Every `collect_*` method consumes the complete contribution set for its
//! round and advances the session. Contributions may be gathered in any
//! order by the transport; the coordinator sorts them by each party's
//! assigned index, so all parties derive identical orderings and Lagrange
//! coefficients. Calling a collection method out of round order is an
//! `InvalidState` error, which is how late arrivals are rejected.
//!
//! # Example
//!
//! ```
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use threshold_ed25519::coordinator::{run_local_keygen, run_local_signing};
//! use threshold_ed25519::verify_signature;
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let (mut coordinator, mut parties) =
//!     run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).unwrap();
//! let group_key = coordinator.group().unwrap().group_public_key();
//!
//! let message = b"Hello, Threshold Signatures!";
//! let signature =
//!     run_local_signing(&mut coordinator, &mut parties[..2], message, &mut rng).unwrap();
//! assert!(verify_signature(&group_key, message, &signature));
//! ```

use std::collections::{BTreeMap, HashMap};

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, error};
use uuid::Uuid;

use crate::broadcast::{
	CommitOpen, ConstructPacket, DistributePacket, LocalSigReport, NonceOpen, ShareBundle,
	SharedKeyReport, Signature,
};
use crate::config::ThresholdConfig;
use crate::error::{ThresholdError, ThresholdResult};
use crate::participants::{ParticipantList, PartyId};
use crate::party::ThresholdParty;
use crate::protocol::{primitives, signing};

/// The durable public output of a completed key generation session.
///
/// This record is all a verifier-side deployment needs to keep: the joint
/// public key, the roster with its index assignment, and the commitment
/// vectors required to verify local signatures in later signing sessions.
/// It contains no secrets and may be freely replicated.
#[derive(Clone, Debug)]
pub struct GroupRecord {
	config: ThresholdConfig,
	roster: ParticipantList,
	public_shares: Vec<[u8; 32]>,
	group_public_key: [u8; 32],
	commitment_vectors: Vec<Vec<[u8; 32]>>,
}

impl GroupRecord {
	/// The threshold configuration the group was generated with.
	pub fn config(&self) -> ThresholdConfig {
		self.config
	}

	/// The roster of parties with their index assignment.
	pub fn roster(&self) -> &ParticipantList {
		&self.roster
	}

	/// The joint public key `Y` all signatures verify under.
	pub fn group_public_key(&self) -> [u8; 32] {
		self.group_public_key
	}

	/// The parties' individual public shares, by protocol index.
	pub fn public_shares(&self) -> &[[u8; 32]] {
		&self.public_shares
	}

	/// The key generation commitment vectors, by protocol index.
	pub fn commitment_vectors(&self) -> &[Vec<[u8; 32]>] {
		&self.commitment_vectors
	}
}

#[cfg(feature = "serde")]
impl serde::Serialize for GroupRecord {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		use serde::ser::SerializeStruct;
		let mut state = serializer.serialize_struct("GroupRecord", 5)?;
		state.serialize_field("config", &self.config)?;
		state.serialize_field("roster", self.roster.as_slice())?;
		state.serialize_field("public_shares", &self.public_shares)?;
		state.serialize_field("group_public_key", &self.group_public_key)?;
		state.serialize_field("commitment_vectors", &self.commitment_vectors)?;
		state.end()
	}
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for GroupRecord {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		#[derive(serde::Deserialize)]
		struct RecordData {
			config: ThresholdConfig,
			roster: Vec<PartyId>,
			public_shares: Vec<[u8; 32]>,
			group_public_key: [u8; 32],
			commitment_vectors: Vec<Vec<[u8; 32]>>,
		}

		let data = RecordData::deserialize(deserializer)?;
		let roster = ParticipantList::new(&data.roster)
			.ok_or_else(|| serde::de::Error::custom("duplicate party IDs in roster"))?;
		Ok(GroupRecord {
			config: data.config,
			roster,
			public_shares: data.public_shares,
			group_public_key: data.group_public_key,
			commitment_vectors: data.commitment_vectors,
		})
	}
}

/// Key generation session state.
enum KeygenState {
	/// No session in progress.
	Idle,
	/// Waiting for all parties to register their public shares.
	Registering {
		config: ThresholdConfig,
		registered: BTreeMap<PartyId, [u8; 32]>,
	},
	/// Roster fixed; waiting for every commitment opening.
	AwaitingCommitments {
		config: ThresholdConfig,
		roster: ParticipantList,
		public_shares: Vec<[u8; 32]>,
	},
	/// Waiting for every share bundle.
	AwaitingShares {
		config: ThresholdConfig,
		roster: ParticipantList,
		public_shares: Vec<[u8; 32]>,
	},
	/// Waiting for every shared-key report.
	AwaitingReports {
		config: ThresholdConfig,
		roster: ParticipantList,
		public_shares: Vec<[u8; 32]>,
		commitment_vectors: Vec<Vec<[u8; 32]>>,
	},
	/// Done; the result lives in `Coordinator::group`.
	Complete,
}

impl Default for KeygenState {
	fn default() -> Self {
		KeygenState::Idle
	}
}

/// One signing session's state.
struct SigningState {
	/// The message being signed.
	message: Vec<u8>,
	/// Sorted protocol indices of the signing subset.
	subset: Vec<u16>,
	/// Current round.
	round: SigningRound,
}

/// Round state of a signing session.
enum SigningRound {
	/// Waiting for every signer's nonce opening.
	AwaitingNonceOpens,
	/// Waiting for every signer's nonce share bundle.
	AwaitingNonceShares { nonce_points: Vec<[u8; 32]> },
	/// Waiting for every signer's local signature.
	AwaitingLocalSigs {
		nonce_points: Vec<[u8; 32]>,
		nonce_commitment_vectors: Vec<Vec<[u8; 32]>>,
	},
	/// Signature produced.
	Complete,
}

impl Default for SigningRound {
	fn default() -> Self {
		SigningRound::Complete
	}
}

/// Stateful orchestrator of one keygen session and its signing sessions.
pub struct Coordinator {
	keygen: KeygenState,
	group: Option<GroupRecord>,
	signing: HashMap<String, SigningState>,
}

impl Default for Coordinator {
	fn default() -> Self {
		Self::new()
	}
}

impl Coordinator {
	/// Create an idle coordinator.
	pub fn new() -> Self {
		Self { keygen: KeygenState::Idle, group: None, signing: HashMap::new() }
	}

	/// The completed group record, if key generation has finished.
	pub fn group(&self) -> Option<&GroupRecord> {
		self.group.as_ref()
	}

	/// Query a party's assigned protocol index.
	///
	/// Available once all parties have registered (the assignment is the
	/// lexicographic order of the registered IDs).
	pub fn index_of(&self, party_id: &str) -> Option<u16> {
		self.roster().and_then(|roster| roster.index_of(party_id))
	}

	// ========================================================================
	// Key generation
	// ========================================================================

	/// Start a key generation session for `n` parties with threshold `t`.
	///
	/// Discards any previous session, group record and signing sessions.
	///
	/// # Errors
	///
	/// `InvalidParameters` unless `2 ≤ t ≤ n`.
	pub fn start_keygen(&mut self, t: u16, n: u16) -> ThresholdResult<()> {
		let config = ThresholdConfig::new(t, n)?;
		debug!(threshold = t, parties = n, "starting key generation session");
		self.keygen = KeygenState::Registering { config, registered: BTreeMap::new() };
		self.group = None;
		self.signing.clear();
		Ok(())
	}

	/// Record one party's registration.
	///
	/// Once the `n`-th party registers, the roster is fixed and protocol
	/// indices are assigned by sorting the party IDs lexicographically.
	///
	/// # Errors
	///
	/// - `DuplicateParty` if the ID registered before
	/// - `InvalidData` if the public share is not a valid point
	/// - `InvalidState` if registration is closed
	pub fn register_party(&mut self, party_id: &str, public_share: [u8; 32]) -> ThresholdResult<()> {
		// Validate the encoding before touching any state
		primitives::decode_point(&public_share, "registered public share")?;

		let (config, mut registered) = match std::mem::take(&mut self.keygen) {
			KeygenState::Registering { config, registered } => (config, registered),
			other => {
				self.keygen = other;
				return Err(ThresholdError::InvalidState {
					current: self.keygen_state_name(),
					expected: "Registering",
				});
			},
		};

		if registered.contains_key(party_id) {
			self.keygen = KeygenState::Registering { config, registered };
			return Err(ThresholdError::DuplicateParty(party_id.to_string()));
		}
		registered.insert(party_id.to_string(), public_share);

		if registered.len() < config.total_parties() as usize {
			self.keygen = KeygenState::Registering { config, registered };
			return Ok(());
		}

		// Roster complete: assign indices by sorted party ID
		let ids: Vec<PartyId> = registered.keys().cloned().collect();
		let roster = ParticipantList::new(&ids).ok_or_else(|| {
			ThresholdError::InvalidData("duplicate party IDs in roster".to_string())
		})?;
		let public_shares: Vec<[u8; 32]> =
			roster.iter().map(|id| registered[id]).collect();

		debug!(parties = roster.len(), "registration complete, roster fixed");
		self.keygen = KeygenState::AwaitingCommitments { config, roster, public_shares };
		Ok(())
	}

	/// Consume the full set of commitment openings and emit each party's
	/// distribute packet.
	///
	/// # Errors
	///
	/// `UnknownParty`, `DuplicateContribution` or `MissingContribution` if
	/// the set does not match the roster exactly; `InvalidState` out of
	/// round order.
	pub fn collect_commitments(
		&mut self,
		openings: Vec<CommitOpen>,
	) -> ThresholdResult<Vec<DistributePacket>> {
		let (config, roster, public_shares) = match std::mem::take(&mut self.keygen) {
			KeygenState::AwaitingCommitments { config, roster, public_shares } => {
				(config, roster, public_shares)
			},
			other => {
				self.keygen = other;
				return Err(ThresholdError::InvalidState {
					current: self.keygen_state_name(),
					expected: "AwaitingCommitments",
				});
			},
		};

		let ordered = arrange(roster.as_slice(), openings, |opening| &opening.party_id)?;
		let commitments: Vec<[u8; 32]> = ordered.iter().map(|o| o.commitment).collect();
		let blinds: Vec<[u8; 32]> = ordered.iter().map(|o| o.blind).collect();
		let member_indices: Vec<u16> = (0..roster.len() as u16).collect();

		let packets = (0..roster.len())
			.map(|position| DistributePacket {
				threshold: config.threshold(),
				member_indices: member_indices.clone(),
				my_position: position,
				points: public_shares.clone(),
				commitments: commitments.clone(),
				blinds: blinds.clone(),
			})
			.collect();

		self.keygen = KeygenState::AwaitingShares { config, roster, public_shares };
		Ok(packets)
	}

	/// Consume the full set of share bundles, rearrange the shares per
	/// recipient and emit each party's construct packet.
	pub fn collect_shares(
		&mut self,
		bundles: Vec<ShareBundle>,
	) -> ThresholdResult<Vec<ConstructPacket>> {
		let (config, roster, public_shares) = match std::mem::take(&mut self.keygen) {
			KeygenState::AwaitingShares { config, roster, public_shares } => {
				(config, roster, public_shares)
			},
			other => {
				self.keygen = other;
				return Err(ThresholdError::InvalidState {
					current: self.keygen_state_name(),
					expected: "AwaitingShares",
				});
			},
		};

		let n = roster.len();
		let ordered = arrange(roster.as_slice(), bundles, |bundle| &bundle.party_id)?;
		check_bundle_shapes(&ordered, config.threshold(), n)?;

		let commitment_vectors: Vec<Vec<[u8; 32]>> =
			ordered.iter().map(|bundle| bundle.commitments.clone()).collect();
		let member_indices: Vec<u16> = (0..n as u16).collect();

		let packets = (0..n)
			.map(|position| ConstructPacket {
				threshold: config.threshold(),
				member_indices: member_indices.clone(),
				my_position: position,
				points: public_shares.clone(),
				commitment_vectors: commitment_vectors.clone(),
				shares: ordered.iter().map(|bundle| bundle.shares[position]).collect(),
			})
			.collect();

		self.keygen =
			KeygenState::AwaitingReports { config, roster, public_shares, commitment_vectors };
		Ok(packets)
	}

	/// Consume the full set of shared-key reports and finalize the group.
	///
	/// Every party must report the joint public key the coordinator itself
	/// derives from the registered shares; disagreement is fatal and names
	/// the dissenting indices.
	///
	/// # Returns
	///
	/// The joint public key `Y`.
	pub fn collect_shared_keys(
		&mut self,
		reports: Vec<SharedKeyReport>,
	) -> ThresholdResult<[u8; 32]> {
		let (config, roster, public_shares, commitment_vectors) =
			match std::mem::take(&mut self.keygen) {
				KeygenState::AwaitingReports {
					config,
					roster,
					public_shares,
					commitment_vectors,
				} => (config, roster, public_shares, commitment_vectors),
				other => {
					self.keygen = other;
					return Err(ThresholdError::InvalidState {
						current: self.keygen_state_name(),
						expected: "AwaitingReports",
					});
				},
			};

		let ordered = arrange(roster.as_slice(), reports, |report| &report.party_id)?;

		let mut group_point = EdwardsPoint::identity();
		for share in &public_shares {
			group_point += primitives::decode_point(share, "registered public share")?;
		}
		let group_public_key = primitives::encode_point(&group_point);

		let disagreeing: Vec<u16> = ordered
			.iter()
			.enumerate()
			.filter(|(position, report)| {
				report.group_public_key != group_public_key
					|| report.public_share != public_shares[*position]
			})
			.map(|(position, _)| position as u16)
			.collect();
		if !disagreeing.is_empty() {
			error!(parties = ?disagreeing, "joint public key disagreement");
			return Err(ThresholdError::InconsistentReports { parties: disagreeing });
		}

		debug!("key generation complete");
		self.group = Some(GroupRecord {
			config,
			roster,
			public_shares,
			group_public_key,
			commitment_vectors,
		});
		self.keygen = KeygenState::Complete;
		Ok(group_public_key)
	}

	/// Abandon the key generation session in progress.
	///
	/// Partial results are unrecoverable; a fresh `start_keygen` is
	/// required. A previously completed group record is left intact.
	pub fn cancel_keygen(&mut self) {
		self.keygen = KeygenState::Idle;
	}

	// ========================================================================
	// Signing
	// ========================================================================

	/// Open a signing session for `message` with the named signers.
	///
	/// The signing subset is the signers' assigned indices, sorted
	/// ascending. Returns the opaque session handle used by the
	/// `collect_*` methods.
	///
	/// # Errors
	///
	/// - `InsufficientSigners` when fewer than `t` distinct signers are
	///   named
	/// - `UnknownParty` / `DuplicateParty` for a bad signer list
	/// - `InvalidState` before key generation has completed
	pub fn start_signing(
		&mut self,
		message: &[u8],
		signer_ids: &[PartyId],
	) -> ThresholdResult<String> {
		let group = self.group.as_ref().ok_or(ThresholdError::InvalidState {
			current: "KeygenIncomplete",
			expected: "Complete",
		})?;

		let mut seen: Vec<&str> = Vec::with_capacity(signer_ids.len());
		for id in signer_ids {
			if !group.roster.contains(id) {
				return Err(ThresholdError::UnknownParty(id.clone()));
			}
			if seen.contains(&id.as_str()) {
				return Err(ThresholdError::DuplicateParty(id.clone()));
			}
			seen.push(id);
		}

		let required = group.config.threshold();
		if signer_ids.len() < required as usize {
			return Err(ThresholdError::InsufficientSigners {
				provided: signer_ids.len(),
				required,
			});
		}

		let subset = group
			.roster
			.subset_indices(signer_ids)
			.ok_or_else(|| ThresholdError::InvalidData("unresolvable signer set".to_string()))?;

		let session_id = Uuid::new_v4().to_string();
		debug!(session = %session_id, signers = signer_ids.len(), "starting signing session");
		self.signing.insert(
			session_id.clone(),
			SigningState {
				message: message.to_vec(),
				subset,
				round: SigningRound::AwaitingNonceOpens,
			},
		);
		Ok(session_id)
	}

	/// The sorted party IDs of a signing session's subset.
	pub fn signers_of(&self, session_id: &str) -> ThresholdResult<Vec<PartyId>> {
		let group = self.group.as_ref().ok_or(ThresholdError::InvalidState {
			current: "KeygenIncomplete",
			expected: "Complete",
		})?;
		let session = self
			.signing
			.get(session_id)
			.ok_or_else(|| ThresholdError::UnknownSession(session_id.to_string()))?;
		Ok(session
			.subset
			.iter()
			.map(|&index| group.roster.get(index).expect("subset index in roster").to_string())
			.collect())
	}

	/// Consume the signers' nonce openings and emit their distribute
	/// packets.
	pub fn collect_nonce_opens(
		&mut self,
		session_id: &str,
		opens: Vec<NonceOpen>,
	) -> ThresholdResult<Vec<DistributePacket>> {
		let group = self.group.as_ref().ok_or(ThresholdError::InvalidState {
			current: "KeygenIncomplete",
			expected: "Complete",
		})?;
		let session = self
			.signing
			.get_mut(session_id)
			.ok_or_else(|| ThresholdError::UnknownSession(session_id.to_string()))?;
		if !matches!(session.round, SigningRound::AwaitingNonceOpens) {
			return Err(ThresholdError::InvalidState {
				current: session.round_name(),
				expected: "AwaitingNonceOpens",
			});
		}

		let signer_ids: Vec<PartyId> = session
			.subset
			.iter()
			.map(|&index| group.roster.get(index).expect("subset index in roster").to_string())
			.collect();
		let ordered = arrange(&signer_ids, opens, |open| &open.party_id)?;

		for open in &ordered {
			primitives::decode_point(&open.nonce_point, "nonce point")?;
		}

		let nonce_points: Vec<[u8; 32]> = ordered.iter().map(|o| o.nonce_point).collect();
		let commitments: Vec<[u8; 32]> = ordered.iter().map(|o| o.commitment).collect();
		let blinds: Vec<[u8; 32]> = ordered.iter().map(|o| o.blind).collect();

		let packets = (0..session.subset.len())
			.map(|position| DistributePacket {
				threshold: group.config.threshold(),
				member_indices: session.subset.clone(),
				my_position: position,
				points: nonce_points.clone(),
				commitments: commitments.clone(),
				blinds: blinds.clone(),
			})
			.collect();

		session.round = SigningRound::AwaitingNonceShares { nonce_points };
		Ok(packets)
	}

	/// Consume the signers' nonce share bundles and emit their construct
	/// packets.
	pub fn collect_nonce_shares(
		&mut self,
		session_id: &str,
		bundles: Vec<ShareBundle>,
	) -> ThresholdResult<Vec<ConstructPacket>> {
		let group = self.group.as_ref().ok_or(ThresholdError::InvalidState {
			current: "KeygenIncomplete",
			expected: "Complete",
		})?;
		let session = self
			.signing
			.get_mut(session_id)
			.ok_or_else(|| ThresholdError::UnknownSession(session_id.to_string()))?;

		let nonce_points = match std::mem::take(&mut session.round) {
			SigningRound::AwaitingNonceShares { nonce_points } => nonce_points,
			other => {
				session.round = other;
				return Err(ThresholdError::InvalidState {
					current: session.round_name(),
					expected: "AwaitingNonceShares",
				});
			},
		};

		let signer_count = session.subset.len();
		let signer_ids: Vec<PartyId> = session
			.subset
			.iter()
			.map(|&index| group.roster.get(index).expect("subset index in roster").to_string())
			.collect();

		let result: ThresholdResult<Vec<ShareBundle>> = (|| {
			let ordered = arrange(&signer_ids, bundles, |bundle| &bundle.party_id)?;
			check_bundle_shapes(&ordered, group.config.threshold(), signer_count)?;
			Ok(ordered)
		})();
		let ordered = match result {
			Ok(ordered) => ordered,
			Err(err) => {
				session.round = SigningRound::AwaitingNonceShares { nonce_points };
				return Err(err);
			},
		};

		let nonce_commitment_vectors: Vec<Vec<[u8; 32]>> =
			ordered.iter().map(|bundle| bundle.commitments.clone()).collect();

		let packets = (0..signer_count)
			.map(|position| ConstructPacket {
				threshold: group.config.threshold(),
				member_indices: session.subset.clone(),
				my_position: position,
				points: nonce_points.clone(),
				commitment_vectors: nonce_commitment_vectors.clone(),
				shares: ordered.iter().map(|bundle| bundle.shares[position]).collect(),
			})
			.collect();

		session.round =
			SigningRound::AwaitingLocalSigs { nonce_points, nonce_commitment_vectors };
		Ok(packets)
	}

	/// Consume the signers' local signatures, verify them, and aggregate
	/// the final signature.
	///
	/// Verification proceeds in three stages, each fatal on failure:
	///
	/// 1. Challenge agreement: every report must carry the challenge the
	///    coordinator derives from `(R, Y, m)` (`InconsistentReports`).
	/// 2. Local signature verification against the public commitment
	///    vectors (`ProtocolFailure` naming the first offender).
	/// 3. The aggregated `(R, s)` must verify under the standard Ed25519
	///    equation; a failure here is `InternalInvariantFailure` and
	///    indicates a bug rather than a misbehaving party.
	pub fn collect_local_sigs(
		&mut self,
		session_id: &str,
		reports: Vec<LocalSigReport>,
	) -> ThresholdResult<Signature> {
		let group = self.group.as_ref().ok_or(ThresholdError::InvalidState {
			current: "KeygenIncomplete",
			expected: "Complete",
		})?;
		let session = self
			.signing
			.get_mut(session_id)
			.ok_or_else(|| ThresholdError::UnknownSession(session_id.to_string()))?;

		let (nonce_points, nonce_commitment_vectors) = match std::mem::take(&mut session.round) {
			SigningRound::AwaitingLocalSigs { nonce_points, nonce_commitment_vectors } => {
				(nonce_points, nonce_commitment_vectors)
			},
			other => {
				session.round = other;
				return Err(ThresholdError::InvalidState {
					current: session.round_name(),
					expected: "AwaitingLocalSigs",
				});
			},
		};

		let signer_ids: Vec<PartyId> = session
			.subset
			.iter()
			.map(|&index| group.roster.get(index).expect("subset index in roster").to_string())
			.collect();
		let ordered = arrange(&signer_ids, reports, |report| &report.party_id)?;

		// Joint nonce point R = Σ R_j
		let mut group_nonce_point = EdwardsPoint::identity();
		for point in &nonce_points {
			group_nonce_point += primitives::decode_point(point, "nonce point")?;
		}
		let group_nonce = primitives::encode_point(&group_nonce_point);

		// Stage 1: challenge agreement
		let challenge = primitives::challenge_scalar(
			&group_nonce,
			&group.group_public_key,
			&session.message,
		);
		let disagreeing: Vec<u16> = ordered
			.iter()
			.enumerate()
			.filter(|(_, report)| report.challenge != challenge.to_bytes())
			.map(|(position, _)| session.subset[position])
			.collect();
		if !disagreeing.is_empty() {
			error!(parties = ?disagreeing, "challenge disagreement");
			return Err(ThresholdError::InconsistentReports { parties: disagreeing });
		}

		// Stage 2: per-party local signature verification
		let mut shares = Vec::with_capacity(ordered.len());
		for (position, report) in ordered.iter().enumerate() {
			let party_index = session.subset[position];
			let gamma = primitives::decode_scalar(&report.signature_share, "local signature")
				.map_err(|_| ThresholdError::ProtocolFailure { party_index })?;
			shares.push((party_index, gamma));
		}

		let key_commitments = decode_commitment_vectors(&group.commitment_vectors)?;
		let nonce_commitments = decode_commitment_vectors(&nonce_commitment_vectors)?;
		signing::verify_local_signatures(
			&challenge,
			&shares,
			&key_commitments,
			&nonce_commitments,
			&session.subset,
		)?;

		// Stage 3: aggregate and verify the final signature
		let gammas: Vec<Scalar> = shares.iter().map(|(_, gamma)| *gamma).collect();
		let s = signing::aggregate(&gammas);
		let signature = Signature::from_parts(&group_nonce, &s.to_bytes());

		if !signing::verify_bytes(
			signature.as_bytes(),
			&session.message,
			&group.group_public_key,
		) {
			error!("aggregated signature failed final verification");
			return Err(ThresholdError::InternalInvariantFailure);
		}

		debug!(session = %session_id, "signature aggregated and verified");
		session.round = SigningRound::Complete;
		Ok(signature)
	}

	/// Cancel a signing session. Unknown handles are ignored (the session
	/// may already have been discarded by a failed round). The group
	/// record and other sessions are unaffected.
	pub fn cancel_signing(&mut self, session_id: &str) {
		self.signing.remove(session_id);
	}

	// ========================================================================
	// Helpers
	// ========================================================================

	fn roster(&self) -> Option<&ParticipantList> {
		if let Some(group) = &self.group {
			return Some(&group.roster);
		}
		match &self.keygen {
			KeygenState::AwaitingCommitments { roster, .. }
			| KeygenState::AwaitingShares { roster, .. }
			| KeygenState::AwaitingReports { roster, .. } => Some(roster),
			_ => None,
		}
	}

	fn keygen_state_name(&self) -> &'static str {
		match &self.keygen {
			KeygenState::Idle => "Idle",
			KeygenState::Registering { .. } => "Registering",
			KeygenState::AwaitingCommitments { .. } => "AwaitingCommitments",
			KeygenState::AwaitingShares { .. } => "AwaitingShares",
			KeygenState::AwaitingReports { .. } => "AwaitingReports",
			KeygenState::Complete => "Complete",
		}
	}
}

impl SigningState {
	fn round_name(&self) -> &'static str {
		match &self.round {
			SigningRound::AwaitingNonceOpens => "AwaitingNonceOpens",
			SigningRound::AwaitingNonceShares { .. } => "AwaitingNonceShares",
			SigningRound::AwaitingLocalSigs { .. } => "AwaitingLocalSigs",
			SigningRound::Complete => "Complete",
		}
	}
}

/// Order a round's contributions by the expected party order.
///
/// Rejects contributions from outside the expected set, duplicates, and
/// incomplete sets, naming the offending party ID.
fn arrange<T>(
	order: &[PartyId],
	items: Vec<T>,
	id_of: impl Fn(&T) -> &PartyId,
) -> ThresholdResult<Vec<T>> {
	let mut by_id: HashMap<PartyId, T> = HashMap::with_capacity(items.len());
	for item in items {
		let id = id_of(&item).clone();
		if !order.contains(&id) {
			return Err(ThresholdError::UnknownParty(id));
		}
		if by_id.insert(id.clone(), item).is_some() {
			return Err(ThresholdError::DuplicateContribution { party_id: id });
		}
	}

	order
		.iter()
		.map(|id| {
			by_id
				.remove(id)
				.ok_or_else(|| ThresholdError::MissingContribution { party_id: id.clone() })
		})
		.collect()
}

/// Check that every bundle carries `t` commitments and one share per
/// recipient.
fn check_bundle_shapes(
	bundles: &[ShareBundle],
	threshold: u16,
	recipients: usize,
) -> ThresholdResult<()> {
	for bundle in bundles {
		if bundle.commitments.len() != threshold as usize {
			return Err(ThresholdError::InvalidData(format!(
				"share bundle from {} has {} commitments, expected {}",
				bundle.party_id,
				bundle.commitments.len(),
				threshold
			)));
		}
		if bundle.shares.len() != recipients {
			return Err(ThresholdError::InvalidData(format!(
				"share bundle from {} has {} shares, expected {}",
				bundle.party_id,
				bundle.shares.len(),
				recipients
			)));
		}
	}
	Ok(())
}

fn decode_commitment_vectors(
	vectors: &[Vec<[u8; 32]>],
) -> ThresholdResult<Vec<Vec<EdwardsPoint>>> {
	vectors
		.iter()
		.map(|vector| {
			vector
				.iter()
				.map(|bytes| primitives::decode_point(bytes, "share commitment"))
				.collect()
		})
		.collect()
}

// ============================================================================
// Local protocol drivers
// ============================================================================

/// Run a complete key generation with all parties in one process.
///
/// This wires a fresh coordinator to one `ThresholdParty` per ID and runs
/// every round locally. It is intended for tests and benchmarks; a real
/// deployment moves the same payloads over its own transport.
///
/// # Returns
///
/// The coordinator (holding the group record) and the parties in protocol
/// index order, each holding its constructed shared key.
pub fn run_local_keygen<R: RngCore + CryptoRng>(
	threshold: u16,
	party_ids: &[&str],
	rng: &mut R,
) -> ThresholdResult<(Coordinator, Vec<ThresholdParty>)> {
	let mut coordinator = Coordinator::new();
	coordinator.start_keygen(threshold, party_ids.len() as u16)?;

	let mut parties: Vec<ThresholdParty> = Vec::with_capacity(party_ids.len());
	for &id in party_ids {
		let mut party = ThresholdParty::new(id);
		let public_share = party.register(rng)?;
		coordinator.register_party(id, public_share)?;
		parties.push(party);
	}

	// The coordinator's packets come out in protocol index order
	parties.sort_by_key(|party| {
		coordinator.index_of(party.party_id()).expect("registered party has an index")
	});

	let openings = parties
		.iter_mut()
		.map(|party| party.commit(rng))
		.collect::<ThresholdResult<Vec<_>>>()?;
	let packets = coordinator.collect_commitments(openings)?;

	let bundles = parties
		.iter_mut()
		.zip(&packets)
		.map(|(party, packet)| party.distribute(packet, rng))
		.collect::<ThresholdResult<Vec<_>>>()?;
	let packets = coordinator.collect_shares(bundles)?;

	let reports = parties
		.iter_mut()
		.zip(&packets)
		.map(|(party, packet)| party.construct(packet))
		.collect::<ThresholdResult<Vec<_>>>()?;
	coordinator.collect_shared_keys(reports)?;

	Ok((coordinator, parties))
}

/// Run a complete signing session with the given parties in one process.
///
/// The parties must have completed key generation against `coordinator`;
/// any subset of at least `t` of them may be passed. The slice is
/// reordered to protocol index order.
pub fn run_local_signing<R: RngCore + CryptoRng>(
	coordinator: &mut Coordinator,
	parties: &mut [ThresholdParty],
	message: &[u8],
	rng: &mut R,
) -> ThresholdResult<Signature> {
	parties.sort_by_key(|party| party.party_index());

	let signer_ids: Vec<PartyId> =
		parties.iter().map(|party| party.party_id().to_string()).collect();
	let session_id = coordinator.start_signing(message, &signer_ids)?;

	let mut handles = Vec::with_capacity(parties.len());
	let mut opens = Vec::with_capacity(parties.len());
	for party in parties.iter_mut() {
		let (handle, _nonce_point) = party.open_signing(message)?;
		let open = party.commit_nonce(&handle, rng)?;
		handles.push(handle);
		opens.push(open);
	}

	let result: ThresholdResult<Signature> = (|| {
		let packets = coordinator.collect_nonce_opens(&session_id, opens)?;

		let bundles = parties
			.iter_mut()
			.zip(&packets)
			.zip(&handles)
			.map(|((party, packet), handle)| party.distribute_nonce(handle, packet, rng))
			.collect::<ThresholdResult<Vec<_>>>()?;
		let packets = coordinator.collect_nonce_shares(&session_id, bundles)?;

		for ((party, packet), handle) in parties.iter_mut().zip(&packets).zip(&handles) {
			party.construct_nonce(handle, packet)?;
		}

		let reports = parties
			.iter_mut()
			.zip(&handles)
			.map(|(party, handle)| party.local_signature(handle))
			.collect::<ThresholdResult<Vec<_>>>()?;
		coordinator.collect_local_sigs(&session_id, reports)
	})();

	for (party, handle) in parties.iter_mut().zip(&handles) {
		party.close_session(handle);
	}
	if result.is_err() {
		coordinator.cancel_signing(&session_id);
	}

	result
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::verify_signature;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	#[test]
	fn test_local_keygen_and_signing_2_of_3() {
		let mut rng = StdRng::seed_from_u64(51);
		let (mut coordinator, mut parties) =
			run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).unwrap();
		let group_key = coordinator.group().unwrap().group_public_key();

		let message = b"coordinator smoke test";
		let signature =
			run_local_signing(&mut coordinator, &mut parties[..2], message, &mut rng).unwrap();
		assert!(verify_signature(&group_key, message, &signature));
	}

	#[test]
	fn test_start_keygen_validates_threshold() {
		let mut coordinator = Coordinator::new();
		assert!(coordinator.start_keygen(1, 3).is_err());
		assert!(coordinator.start_keygen(4, 3).is_err());
		assert!(coordinator.start_keygen(2, 2).is_ok());
	}

	#[test]
	fn test_duplicate_registration_rejected() {
		let mut rng = StdRng::seed_from_u64(52);
		let mut coordinator = Coordinator::new();
		coordinator.start_keygen(2, 3).unwrap();

		let mut party = ThresholdParty::new("p0");
		let share = party.register(&mut rng).unwrap();
		coordinator.register_party("p0", share).unwrap();
		let err = coordinator.register_party("p0", share).unwrap_err();
		assert_eq!(err, ThresholdError::DuplicateParty("p0".to_string()));
	}

	#[test]
	fn test_index_assignment_is_lexicographic() {
		let mut rng = StdRng::seed_from_u64(53);
		// Register out of order; indices follow sorted IDs regardless
		let (coordinator, _parties) =
			run_local_keygen(2, &["zebra", "alpha", "mango"], &mut rng).unwrap();
		assert_eq!(coordinator.index_of("alpha"), Some(0));
		assert_eq!(coordinator.index_of("mango"), Some(1));
		assert_eq!(coordinator.index_of("zebra"), Some(2));
	}

	#[test]
	fn test_insufficient_signers() {
		let mut rng = StdRng::seed_from_u64(54);
		let (mut coordinator, _parties) =
			run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).unwrap();

		let err = coordinator.start_signing(b"m", &["p0".to_string()]).unwrap_err();
		assert_eq!(err, ThresholdError::InsufficientSigners { provided: 1, required: 2 });
	}

	#[test]
	fn test_signing_with_unknown_signer() {
		let mut rng = StdRng::seed_from_u64(55);
		let (mut coordinator, _parties) =
			run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).unwrap();

		let err = coordinator
			.start_signing(b"m", &["p0".to_string(), "p9".to_string()])
			.unwrap_err();
		assert_eq!(err, ThresholdError::UnknownParty("p9".to_string()));
	}

	#[test]
	fn test_collect_out_of_round_order() {
		let mut coordinator = Coordinator::new();
		coordinator.start_keygen(2, 2).unwrap();
		// Still registering: commitments are a later round
		let err = coordinator.collect_commitments(Vec::new()).unwrap_err();
		assert!(matches!(err, ThresholdError::InvalidState { .. }));
	}

	#[test]
	fn test_start_keygen_clears_previous_group() {
		let mut rng = StdRng::seed_from_u64(56);
		let (mut coordinator, _parties) =
			run_local_keygen(2, &["p0", "p1"], &mut rng).unwrap();
		assert!(coordinator.group().is_some());

		coordinator.start_keygen(2, 2).unwrap();
		assert!(coordinator.group().is_none());
	}
}
