//! Integration tests for the threshold Ed25519 implementation.
//!
//! These tests validate the complete end-to-end protocol (distributed key
//! generation followed by threshold signing) using the local drivers, and
//! check the resulting signatures both with this crate's verifier and with
//! an independent Ed25519 implementation.

use ed25519_dalek::Verifier;
use rand::rngs::StdRng;
use rand::SeedableRng;

use threshold_ed25519::coordinator::{run_local_keygen, run_local_signing};
use threshold_ed25519::{verify_signature, Signature, ThresholdParty};

/// Helper to encode bytes as hex string
fn hex_encode(data: &[u8]) -> String {
	data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Run keygen for `ids` and sign `message` with the parties at the given
/// positions (positions refer to protocol index order). Returns the group
/// public key and the signature; both verifications must pass.
fn run_threshold_protocol(
	threshold: u16,
	ids: &[&str],
	signer_positions: &[usize],
	message: &[u8],
	seed: u64,
) -> ([u8; 32], Signature) {
	let mut rng = StdRng::seed_from_u64(seed);

	let (mut coordinator, parties) =
		run_local_keygen(threshold, ids, &mut rng).expect("key generation");
	let group_key = coordinator.group().expect("group record").group_public_key();

	let mut signers: Vec<ThresholdParty> = Vec::new();
	let mut rest: Vec<ThresholdParty> = Vec::new();
	for (position, party) in parties.into_iter().enumerate() {
		if signer_positions.contains(&position) {
			signers.push(party);
		} else {
			rest.push(party);
		}
	}

	let signature = run_local_signing(&mut coordinator, &mut signers, message, &mut rng)
		.expect("signing");

	assert!(
		verify_signature(&group_key, message, &signature),
		"signature must verify under the joint public key"
	);

	(group_key, signature)
}

/// Cross-check a signature with ed25519-dalek.
fn verify_with_dalek(group_key: &[u8; 32], message: &[u8], signature: &Signature) {
	let verifying_key =
		ed25519_dalek::VerifyingKey::from_bytes(group_key).expect("valid Ed25519 public key");
	let dalek_signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
	verifying_key
		.verify(message, &dalek_signature)
		.expect("independent Ed25519 verifier must accept the signature");
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_2_of_3_signers_p0_p1() {
	let message = b"Hello, Threshold Signatures!";
	let (group_key, signature) =
		run_threshold_protocol(2, &["p0", "p1", "p2"], &[0, 1], message, 1);
	verify_with_dalek(&group_key, message, &signature);
	println!("2-of-3 signature: {}", hex_encode(signature.as_bytes()));
}

#[test]
fn test_2_of_3_other_subset_same_group_key() {
	// Both subsets verify against the same joint key; the signatures differ
	// because the nonce aggregates over different signer sets.
	let message = b"Hello, Threshold Signatures!";
	let mut rng = StdRng::seed_from_u64(2);

	let (mut coordinator, mut parties) =
		run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).expect("key generation");
	let group_key = coordinator.group().unwrap().group_public_key();

	let sig_01 = run_local_signing(&mut coordinator, &mut parties[..2], message, &mut rng)
		.expect("subset {p0, p1}");
	let sig_12 = run_local_signing(&mut coordinator, &mut parties[1..], message, &mut rng)
		.expect("subset {p1, p2}");

	assert!(verify_signature(&group_key, message, &sig_01));
	assert!(verify_signature(&group_key, message, &sig_12));
	assert_ne!(sig_01, sig_12, "different subsets must produce different signatures");
	verify_with_dalek(&group_key, message, &sig_01);
	verify_with_dalek(&group_key, message, &sig_12);
}

#[test]
fn test_3_of_5_non_contiguous_subset() {
	// Signers p0, p2, p4 with a 150-byte payload
	let message = vec![0xA5u8; 150];
	let (group_key, signature) =
		run_threshold_protocol(3, &["p0", "p1", "p2", "p3", "p4"], &[0, 2, 4], &message, 3);
	verify_with_dalek(&group_key, &message, &signature);
}

#[test]
fn test_2_of_2() {
	let (group_key, signature) =
		run_threshold_protocol(2, &["alice", "bob"], &[0, 1], b"two of two", 4);
	verify_with_dalek(&group_key, b"two of two", &signature);
}

#[test]
fn test_t_equals_n() {
	let message = b"all parties required";
	let (group_key, signature) =
		run_threshold_protocol(3, &["p0", "p1", "p2"], &[0, 1, 2], message, 5);
	verify_with_dalek(&group_key, message, &signature);
}

#[test]
fn test_all_parties_sign_above_threshold() {
	// |S| = n > t: every party participates even though two would suffice
	let message = b"full house";
	let (group_key, signature) =
		run_threshold_protocol(2, &["p0", "p1", "p2", "p3"], &[0, 1, 2, 3], message, 6);
	verify_with_dalek(&group_key, message, &signature);
}

#[test]
fn test_empty_message() {
	let (group_key, signature) = run_threshold_protocol(2, &["p0", "p1", "p2"], &[0, 1], b"", 7);
	verify_with_dalek(&group_key, b"", &signature);
}

#[test]
fn test_single_byte_message() {
	let (group_key, signature) =
		run_threshold_protocol(2, &["p0", "p1", "p2"], &[1, 2], b"x", 8);
	verify_with_dalek(&group_key, b"x", &signature);
}

#[test]
fn test_threshold_grid() {
	// Every (t, n) with n up to 5
	let ids = ["p0", "p1", "p2", "p3", "p4"];
	for n in 2..=5usize {
		for t in 2..=n {
			let positions: Vec<usize> = (0..t).collect();
			let message = format!("grid {}-of-{}", t, n);
			let (group_key, signature) = run_threshold_protocol(
				t as u16,
				&ids[..n],
				&positions,
				message.as_bytes(),
				(t * 100 + n) as u64,
			);
			verify_with_dalek(&group_key, message.as_bytes(), &signature);
			println!("✅ {}-of-{} signature created and verified", t, n);
		}
	}
}

#[test]
fn test_two_sessions_same_group() {
	// Two signing sessions against one keygen result: both verify, and
	// their nonce points differ because the messages differ.
	let mut rng = StdRng::seed_from_u64(9);

	let (mut coordinator, mut parties) =
		run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).expect("key generation");
	let group_key = coordinator.group().unwrap().group_public_key();

	let signers = &mut parties[..2];
	let sig_a =
		run_local_signing(&mut coordinator, signers, b"first message", &mut rng).unwrap();
	let sig_b =
		run_local_signing(&mut coordinator, signers, b"second message", &mut rng).unwrap();

	assert!(verify_signature(&group_key, b"first message", &sig_a));
	assert!(verify_signature(&group_key, b"second message", &sig_b));
	assert_ne!(
		sig_a.nonce_bytes(),
		sig_b.nonce_bytes(),
		"different messages must aggregate different nonces"
	);
}

#[test]
fn test_signature_rejects_wrong_inputs() {
	let message = b"the signed message";
	let (group_key, signature) =
		run_threshold_protocol(2, &["p0", "p1", "p2"], &[0, 1], message, 10);

	// Wrong message
	assert!(!verify_signature(&group_key, b"another message", &signature));

	// Corrupted signature
	let mut corrupted = *signature.as_bytes();
	corrupted[10] ^= 0x40;
	let corrupted = Signature::from_bytes(&corrupted).unwrap();
	assert!(!verify_signature(&group_key, message, &corrupted));

	// Wrong key
	let (other_key, _) = run_threshold_protocol(2, &["q0", "q1"], &[0, 1], b"other", 11);
	assert!(!verify_signature(&other_key, message, &signature));
}

#[test]
fn test_parties_hold_consistent_group_key() {
	let mut rng = StdRng::seed_from_u64(12);
	let (coordinator, parties) =
		run_local_keygen(2, &["p0", "p1", "p2"], &mut rng).expect("key generation");
	let group_key = coordinator.group().unwrap().group_public_key();

	for party in &parties {
		let shared = party.shared_key().expect("party is ready");
		assert_eq!(shared.group_public_key(), group_key);
	}
}
