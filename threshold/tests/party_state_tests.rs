//! Tests for the `ThresholdParty` state machine behavior.
//!
//! These tests verify the party's state transitions and error handling.
//! End-to-end protocol tests are in `integration_tests.rs`; tampering
//! scenarios are in `failure_tests.rs`.

use rand::rngs::StdRng;
use rand::SeedableRng;

use threshold_ed25519::coordinator::run_local_keygen;
use threshold_ed25519::{
	ConstructPacket, DistributePacket, ThresholdError, ThresholdParty,
};

fn rng(seed: u64) -> StdRng {
	StdRng::seed_from_u64(seed)
}

/// A structurally plausible packet; state checks must fire before any
/// packet validation does.
fn dummy_distribute_packet() -> DistributePacket {
	DistributePacket {
		threshold: 2,
		member_indices: vec![0, 1],
		my_position: 0,
		points: vec![[0u8; 32]; 2],
		commitments: vec![[0u8; 32]; 2],
		blinds: vec![[0u8; 32]; 2],
	}
}

fn dummy_construct_packet() -> ConstructPacket {
	ConstructPacket {
		threshold: 2,
		member_indices: vec![0, 1],
		my_position: 0,
		points: vec![[0u8; 32]; 2],
		commitment_vectors: vec![vec![[0u8; 32]; 2]; 2],
		shares: vec![[0u8; 32]; 2],
	}
}

#[test]
fn test_distribute_before_commit() {
	let mut rng = rng(61);
	let mut party = ThresholdParty::new("p0");
	party.register(&mut rng).unwrap();

	let err = party.distribute(&dummy_distribute_packet(), &mut rng).unwrap_err();
	assert_eq!(
		err,
		ThresholdError::InvalidState { current: "Registered", expected: "Committed" }
	);
}

#[test]
fn test_construct_before_distribute() {
	let mut rng = rng(62);
	let mut party = ThresholdParty::new("p0");
	party.register(&mut rng).unwrap();
	party.commit(&mut rng).unwrap();

	let err = party.construct(&dummy_construct_packet()).unwrap_err();
	assert_eq!(
		err,
		ThresholdError::InvalidState { current: "Committed", expected: "Distributed" }
	);
}

#[test]
fn test_commit_twice() {
	let mut rng = rng(63);
	let mut party = ThresholdParty::new("p0");
	party.register(&mut rng).unwrap();
	party.commit(&mut rng).unwrap();

	let err = party.commit(&mut rng).unwrap_err();
	assert!(matches!(err, ThresholdError::InvalidState { .. }));
}

#[test]
fn test_state_preserved_on_wrong_order() {
	// An out-of-order call must not corrupt the state: the party can
	// continue with the correct operation afterwards.
	let mut rng = rng(64);
	let mut party = ThresholdParty::new("p0");
	party.register(&mut rng).unwrap();

	assert!(party.distribute(&dummy_distribute_packet(), &mut rng).is_err());
	assert!(party.commit(&mut rng).is_ok());
}

#[test]
fn test_signing_session_lifecycle() {
	let mut rng = rng(65);
	let (_coordinator, mut parties) =
		run_local_keygen(2, &["p0", "p1"], &mut rng).expect("key generation");
	let party = &mut parties[0];

	let (handle, nonce_point) = party.open_signing(b"message").unwrap();
	assert_eq!(nonce_point.len(), 32);
	assert_eq!(party.open_sessions(), 1);

	// The session advances only through its own round order
	let err = party.local_signature(&handle).unwrap_err();
	assert!(matches!(err, ThresholdError::InvalidState { .. }));

	party.close_session(&handle);
	assert_eq!(party.open_sessions(), 0);

	// A closed handle no longer resolves
	let err = party.commit_nonce(&handle, &mut rng).unwrap_err();
	assert!(matches!(err, ThresholdError::UnknownSession(_)));
}

#[test]
fn test_concurrent_sessions_are_independent() {
	let mut rng = rng(66);
	let (_coordinator, mut parties) =
		run_local_keygen(2, &["p0", "p1"], &mut rng).expect("key generation");
	let party = &mut parties[0];

	let (handle_a, point_a) = party.open_signing(b"message A").unwrap();
	let (handle_b, point_b) = party.open_signing(b"message B").unwrap();
	assert_ne!(handle_a, handle_b);
	assert_ne!(point_a, point_b);
	assert_eq!(party.open_sessions(), 2);

	party.close_session(&handle_a);
	assert_eq!(party.open_sessions(), 1);

	// Session B is unaffected by closing A
	assert!(party.commit_nonce(&handle_b, &mut rng).is_ok());
}

#[test]
fn test_nonce_rounds_require_session_order() {
	let mut rng = rng(67);
	let (_coordinator, mut parties) =
		run_local_keygen(2, &["p0", "p1"], &mut rng).expect("key generation");
	let party = &mut parties[0];

	let (handle, _point) = party.open_signing(b"message").unwrap();

	// distribute_nonce before commit_nonce
	let err = party.distribute_nonce(&handle, &dummy_distribute_packet(), &mut rng).unwrap_err();
	assert_eq!(
		err,
		ThresholdError::InvalidState { current: "Opened", expected: "Committed" }
	);
}

#[test]
fn test_reset_clears_sessions() {
	let mut rng = rng(68);
	let (_coordinator, mut parties) =
		run_local_keygen(2, &["p0", "p1"], &mut rng).expect("key generation");
	let party = &mut parties[0];

	party.open_signing(b"message").unwrap();
	party.reset();
	assert_eq!(party.open_sessions(), 0);
	assert!(party.shared_key().is_none());

	// After a reset the party can run a fresh key generation
	assert!(party.register(&mut rng).is_ok());
}

#[test]
fn test_public_share_visibility() {
	let mut rng = rng(69);
	let mut party = ThresholdParty::new("p0");
	assert!(party.public_share().is_none());
	assert!(party.party_index().is_none());

	let share = party.register(&mut rng).unwrap();
	assert_eq!(party.public_share(), Some(share));
	// The protocol index is assigned later by the coordinator
	assert!(party.party_index().is_none());
}
