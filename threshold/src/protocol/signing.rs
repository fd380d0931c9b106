//! Local signature computation, cross-verification and aggregation.
//!
//! After the ephemeral nonce round, each signing party holds a share
//! `rho_i` of the joint nonce and its long-lived share `x_i` of the joint
//! key. Both are evaluations of degree-`(t−1)` polynomials at the party's
//! 1-based index, so the Lagrange-weighted combination
//! `gamma_i = λ_i · (rho_i + k · x_i)` makes the plain sum of the local
//! signatures interpolate `r + k · a` at 0, which is the `s` of a standard
//! Ed25519 signature `(R, s)`.
//!
//! Every `gamma_i` is publicly checkable: `rho_i · G` and `x_i · G` are
//! recomputable from the commitment vectors published during the two
//! sharing rounds, which pins any malformed local signature on its sender.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;

use crate::error::{ThresholdError, ThresholdResult};
use crate::protocol::primitives;
use crate::protocol::vss;

/// Compute one party's Lagrange-weighted local signature.
///
/// `gamma_i = λ_i · (rho_i + k · x_i) mod ℓ`.
pub(crate) fn local_signature(
	nonce_share: &Scalar,
	challenge: &Scalar,
	lambda: &Scalar,
	key_share: &Scalar,
) -> Scalar {
	lambda * (nonce_share + challenge * key_share)
}

/// Verify a set of local signatures against public commitment data.
///
/// For each `(party_index, gamma_i)` the expected public image is
/// `λ_i · (rho_i·G + k · x_i·G)`, where `x_i·G` is the sum over all key
/// generation commitment vectors evaluated at `party_index + 1`, and
/// `rho_i·G` the same over the ephemeral commitment vectors of the signing
/// subset.
///
/// # Arguments
///
/// * `challenge` - The agreed challenge scalar `k`
/// * `shares` - `(party_index, gamma_i)` pairs, 0-based global indices
/// * `key_commitments` - Commitment vectors from key generation, one per
///   party, ordered by protocol index
/// * `nonce_commitments` - Ephemeral commitment vectors, one per signing
///   participant, in subset order
/// * `subset` - Sorted 0-based indices of the signing subset
///
/// # Errors
///
/// `ProtocolFailure` naming the first party whose local signature does not
/// match its public image.
pub(crate) fn verify_local_signatures(
	challenge: &Scalar,
	shares: &[(u16, Scalar)],
	key_commitments: &[Vec<EdwardsPoint>],
	nonce_commitments: &[Vec<EdwardsPoint>],
	subset: &[u16],
) -> ThresholdResult<()> {
	let interpolation: Vec<u16> = subset.iter().map(|&index| index + 1).collect();

	for &(party_index, ref gamma) in shares {
		let eval_at = party_index + 1;

		let key_image: EdwardsPoint = key_commitments
			.iter()
			.map(|commitments| vss::evaluate_in_exponent(commitments, eval_at))
			.sum();
		let nonce_image: EdwardsPoint = nonce_commitments
			.iter()
			.map(|commitments| vss::evaluate_in_exponent(commitments, eval_at))
			.sum();

		let lambda = vss::lagrange_coefficient(eval_at, &interpolation)?;
		let expected = (nonce_image + key_image * challenge) * lambda;

		if EdwardsPoint::mul_base(gamma) != expected {
			return Err(ThresholdError::ProtocolFailure { party_index });
		}
	}

	Ok(())
}

/// Sum local signatures into the aggregate `s` scalar.
pub(crate) fn aggregate(shares: &[Scalar]) -> Scalar {
	shares.iter().sum()
}

/// Verify a 64-byte `R ‖ s` signature under the standard Ed25519 equation.
///
/// Performs the RFC 8032 §5.1.7 checks: both points must decode, `s` must
/// be a canonical scalar, and `s·G == R + SHA-512(R ‖ Y ‖ m)·Y` must hold.
pub(crate) fn verify_bytes(signature: &[u8; 64], message: &[u8], public_key: &[u8; 32]) -> bool {
	let mut nonce_bytes = [0u8; 32];
	nonce_bytes.copy_from_slice(&signature[..32]);
	let mut s_bytes = [0u8; 32];
	s_bytes.copy_from_slice(&signature[32..]);

	let group_nonce = match primitives::decode_point(&nonce_bytes, "signature R") {
		Ok(point) => point,
		Err(_) => return false,
	};
	let key_point = match primitives::decode_point(public_key, "public key") {
		Ok(point) => point,
		Err(_) => return false,
	};
	let s = match primitives::decode_scalar(&s_bytes, "signature s") {
		Ok(scalar) => scalar,
		Err(_) => return false,
	};

	let k = primitives::challenge_scalar(&nonce_bytes, public_key, message);

	EdwardsPoint::vartime_double_scalar_mul_basepoint(&-k, &key_point, &s) == group_nonce
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::rngs::StdRng;
	use rand::SeedableRng;

	/// Plain single-key Ed25519 over the same primitives: `(R, s)` with
	/// `r` random, `s = r + k·a`.
	fn sign_single(secret: &Scalar, message: &[u8], rng: &mut StdRng) -> ([u8; 64], [u8; 32]) {
		let nonce = Scalar::random(rng);
		let group_nonce = primitives::encode_point(&EdwardsPoint::mul_base(&nonce));
		let public_key = primitives::encode_point(&EdwardsPoint::mul_base(secret));
		let k = primitives::challenge_scalar(&group_nonce, &public_key, message);
		let s = nonce + k * secret;

		let mut signature = [0u8; 64];
		signature[..32].copy_from_slice(&group_nonce);
		signature[32..].copy_from_slice(&s.to_bytes());
		(signature, public_key)
	}

	#[test]
	fn test_verify_accepts_valid_signature() {
		let mut rng = StdRng::seed_from_u64(21);
		let secret = Scalar::random(&mut rng);
		let (signature, public_key) = sign_single(&secret, b"hello", &mut rng);
		assert!(verify_bytes(&signature, b"hello", &public_key));
	}

	#[test]
	fn test_verify_rejects_wrong_message() {
		let mut rng = StdRng::seed_from_u64(22);
		let secret = Scalar::random(&mut rng);
		let (signature, public_key) = sign_single(&secret, b"hello", &mut rng);
		assert!(!verify_bytes(&signature, b"goodbye", &public_key));
	}

	#[test]
	fn test_verify_rejects_bit_flip() {
		let mut rng = StdRng::seed_from_u64(23);
		let secret = Scalar::random(&mut rng);
		let (mut signature, public_key) = sign_single(&secret, b"hello", &mut rng);
		signature[40] ^= 1;
		assert!(!verify_bytes(&signature, b"hello", &public_key));
	}

	#[test]
	fn test_verify_rejects_unreduced_s() {
		let mut rng = StdRng::seed_from_u64(24);
		let secret = Scalar::random(&mut rng);
		let (mut signature, public_key) = sign_single(&secret, b"hello", &mut rng);
		// Force s ≥ ℓ: the canonical-scalar check must fire before any
		// arithmetic happens.
		signature[32..].copy_from_slice(&[0xFFu8; 32]);
		assert!(!verify_bytes(&signature, b"hello", &public_key));
	}

	#[test]
	fn test_weighted_shares_sum_to_plain_signature() {
		let mut rng = StdRng::seed_from_u64(25);

		// Share a key and a nonce across indices {1, 2, 3} with t = 2,
		// then check Σ γ_i over the subset {1, 3} equals r + k·a.
		let key = Scalar::random(&mut rng);
		let nonce = Scalar::random(&mut rng);
		let indices = [1u16, 2, 3];
		let (_, key_shares) = vss::share(&key, 2, &indices, &mut rng);
		let (_, nonce_shares) = vss::share(&nonce, 2, &indices, &mut rng);

		let k = Scalar::random(&mut rng);
		let quorum = [1u16, 3];
		let mut s = Scalar::ZERO;
		for (&index, pos) in quorum.iter().zip([0usize, 2]) {
			let lambda = vss::lagrange_coefficient(index, &quorum).unwrap();
			s += local_signature(&nonce_shares[pos], &k, &lambda, &key_shares[pos]);
		}

		assert_eq!(s, nonce + k * key);
	}

	#[test]
	fn test_verify_local_signatures_flags_offender() {
		let mut rng = StdRng::seed_from_u64(26);

		let indices = [1u16, 2];
		let subset = [0u16, 1];
		let key_a = Scalar::random(&mut rng);
		let key_b = Scalar::random(&mut rng);
		let nonce_a = Scalar::random(&mut rng);
		let nonce_b = Scalar::random(&mut rng);

		let (key_com_a, key_shares_a) = vss::share(&key_a, 2, &indices, &mut rng);
		let (key_com_b, key_shares_b) = vss::share(&key_b, 2, &indices, &mut rng);
		let (nonce_com_a, nonce_shares_a) = vss::share(&nonce_a, 2, &indices, &mut rng);
		let (nonce_com_b, nonce_shares_b) = vss::share(&nonce_b, 2, &indices, &mut rng);

		let k = Scalar::random(&mut rng);
		let mut gammas = Vec::new();
		for position in 0..2usize {
			let index = indices[position];
			let x_i = key_shares_a[position] + key_shares_b[position];
			let rho_i = nonce_shares_a[position] + nonce_shares_b[position];
			let lambda = vss::lagrange_coefficient(index, &indices).unwrap();
			gammas.push((subset[position], local_signature(&rho_i, &k, &lambda, &x_i)));
		}

		let key_commitments = vec![key_com_a, key_com_b];
		let nonce_commitments = vec![nonce_com_a, nonce_com_b];

		assert!(verify_local_signatures(
			&k,
			&gammas,
			&key_commitments,
			&nonce_commitments,
			&subset
		)
		.is_ok());

		// Corrupt the second party's share
		gammas[1].1 += Scalar::ONE;
		let err = verify_local_signatures(
			&k,
			&gammas,
			&key_commitments,
			&nonce_commitments,
			&subset,
		)
		.unwrap_err();
		assert_eq!(err, ThresholdError::ProtocolFailure { party_index: 1 });
	}

	#[test]
	fn test_aggregate_is_plain_sum() {
		let shares = [Scalar::from(3u64), Scalar::from(4u64)];
		assert_eq!(aggregate(&shares), Scalar::from(7u64));
		assert_eq!(aggregate(&[]), Scalar::ZERO);
	}
}
