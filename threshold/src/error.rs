//! Error types for threshold Ed25519 operations.

use core::fmt;

/// Result type for threshold operations.
pub type ThresholdResult<T> = Result<T, ThresholdError>;

/// Error types for threshold operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
	/// Invalid threshold parameters (t, n).
	InvalidParameters {
		/// Threshold value.
		threshold: u16,
		/// Total number of parties.
		parties: u16,
		/// Description of the validation error.
		reason: &'static str,
	},
	/// Malformed input: bad encoding, wrong length, out-of-range value.
	InvalidData(String),
	/// Operation invoked in an incompatible state.
	InvalidState {
		/// Current state description.
		current: &'static str,
		/// Expected state description.
		expected: &'static str,
	},
	/// A party ID that is not part of the current session.
	UnknownParty(String),
	/// A party ID registered more than once.
	DuplicateParty(String),
	/// A signing-session handle that does not resolve.
	UnknownSession(String),
	/// A round collection is missing a party's contribution.
	MissingContribution {
		/// Party ID whose contribution is missing.
		party_id: String,
	},
	/// A round collection contains two contributions from one party.
	DuplicateContribution {
		/// Party ID that contributed twice.
		party_id: String,
	},
	/// Fewer signers named than the threshold requires.
	InsufficientSigners {
		/// Number of signers provided.
		provided: usize,
		/// Required threshold.
		required: u16,
	},
	/// Cross-party disagreement detected by the coordinator (joint public
	/// key or challenge mismatch).
	InconsistentReports {
		/// Protocol indices of the disagreeing parties.
		parties: Vec<u16>,
	},
	/// A specific party failed a cryptographic check (commitment opening,
	/// secret share, or local signature). Fatal to the current round.
	ProtocolFailure {
		/// Protocol index of the offending party.
		party_index: u16,
	},
	/// Every local check passed but the aggregated signature did not
	/// verify. Must never occur on honest execution.
	InternalInvariantFailure,
}

impl fmt::Display for ThresholdError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ThresholdError::InvalidParameters { threshold, parties, reason } => {
				write!(
					f,
					"Invalid threshold parameters: t={}, n={}, reason: {}",
					threshold, parties, reason
				)
			},
			ThresholdError::InvalidData(msg) => {
				write!(f, "Invalid data: {}", msg)
			},
			ThresholdError::InvalidState { current, expected } => {
				write!(f, "Invalid state: currently {}, expected {}", current, expected)
			},
			ThresholdError::UnknownParty(id) => {
				write!(f, "Unknown party: {}", id)
			},
			ThresholdError::DuplicateParty(id) => {
				write!(f, "Duplicate party: {}", id)
			},
			ThresholdError::UnknownSession(id) => {
				write!(f, "Unknown signing session: {}", id)
			},
			ThresholdError::MissingContribution { party_id } => {
				write!(f, "Missing contribution from party {}", party_id)
			},
			ThresholdError::DuplicateContribution { party_id } => {
				write!(f, "Duplicate contribution from party {}", party_id)
			},
			ThresholdError::InsufficientSigners { provided, required } => {
				write!(f, "Insufficient signers: provided {}, required {}", provided, required)
			},
			ThresholdError::InconsistentReports { parties } => {
				write!(f, "Inconsistent reports from parties {:?}", parties)
			},
			ThresholdError::ProtocolFailure { party_index } => {
				write!(f, "Protocol failure attributed to party {}", party_index)
			},
			ThresholdError::InternalInvariantFailure => {
				write!(f, "Aggregated signature failed verification despite valid local checks")
			},
		}
	}
}

impl std::error::Error for ThresholdError {}

/// Minimum threshold value (at least 2 parties required to sign).
pub const MIN_THRESHOLD: u16 = 2;

/// Validate threshold parameters.
pub fn validate_threshold_params(t: u16, n: u16) -> ThresholdResult<()> {
	if t < MIN_THRESHOLD {
		return Err(ThresholdError::InvalidParameters {
			threshold: t,
			parties: n,
			reason: "threshold must be at least 2",
		});
	}

	if t > n {
		return Err(ThresholdError::InvalidParameters {
			threshold: t,
			parties: n,
			reason: "threshold cannot exceed number of parties",
		});
	}

	Ok(())
}
