//! Feldman verifiable secret sharing over the Ed25519 base-point group.
//!
//! A secret scalar is shared with a random polynomial of degree
//! `threshold - 1`; each party receives the evaluation at its 1-based
//! protocol index. Alongside the shares, the dealer publishes one
//! base-point commitment per polynomial coefficient, which lets every
//! recipient verify its share in the exponent without learning anything
//! about the other shares.
//!
//! Indices passed to this module are always the 1-based points
//! `party_index + 1`; evaluation at 0 would hand out the secret itself.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::{ThresholdError, ThresholdResult};

/// Share a secret across the given 1-based indices.
///
/// Returns the per-coefficient commitment vector (length `threshold`,
/// first entry `secret · G`) and one share per index, in index order.
/// The polynomial coefficients are wiped before returning.
///
/// # Arguments
///
/// * `secret` - The scalar to share (the polynomial's constant term)
/// * `threshold` - Number of shares required to reconstruct
/// * `indices` - Distinct nonzero 1-based evaluation points
pub(crate) fn share<R: RngCore + CryptoRng>(
	secret: &Scalar,
	threshold: u16,
	indices: &[u16],
	rng: &mut R,
) -> (Vec<EdwardsPoint>, Vec<Scalar>) {
	debug_assert!(threshold >= 1);
	debug_assert!(indices.iter().all(|&i| i > 0));

	let mut coefficients = Vec::with_capacity(threshold as usize);
	coefficients.push(*secret);
	for _ in 1..threshold {
		coefficients.push(Scalar::random(rng));
	}

	let commitments = coefficients.iter().map(EdwardsPoint::mul_base).collect();

	let shares = indices
		.iter()
		.map(|&index| evaluate(&coefficients, index))
		.collect();

	for coefficient in coefficients.iter_mut() {
		coefficient.zeroize();
	}

	(commitments, shares)
}

/// Evaluate the polynomial at a 1-based index (Horner form).
fn evaluate(coefficients: &[Scalar], index: u16) -> Scalar {
	let x = Scalar::from(index as u64);
	let mut acc = Scalar::ZERO;
	for coefficient in coefficients.iter().rev() {
		acc = acc * x + coefficient;
	}
	acc
}

/// Evaluate a commitment vector at a 1-based index, in the exponent.
///
/// Returns `Σ_k index^k · C_k`, i.e. `f(index) · G` for the committed
/// polynomial `f`. This is the public image of the share at `index`.
pub(crate) fn evaluate_in_exponent(commitments: &[EdwardsPoint], index: u16) -> EdwardsPoint {
	let x = Scalar::from(index as u64);
	let mut acc = EdwardsPoint::identity();
	for commitment in commitments.iter().rev() {
		acc = acc * x + commitment;
	}
	acc
}

/// Verify a share against the dealer's commitment vector.
///
/// Returns true iff `share · G` equals the commitment vector evaluated at
/// the recipient's 1-based index.
pub(crate) fn verify_share(
	commitments: &[EdwardsPoint],
	index: u16,
	share: &Scalar,
) -> bool {
	EdwardsPoint::mul_base(share) == evaluate_in_exponent(commitments, index)
}

/// Compute the Lagrange coefficient at 0 for `index` within `indices`.
///
/// `λ_i(0) = Π_{j ∈ X, j ≠ i} j · (j − i)^{−1} mod ℓ`, with all values
/// 1-based. Reweighting each share of a degree-`(t−1)` polynomial by its
/// coefficient makes the shares sum to the polynomial's constant term.
///
/// # Errors
///
/// Fails when `index` is not in `indices` or the indices are not distinct
/// and nonzero.
pub(crate) fn lagrange_coefficient(index: u16, indices: &[u16]) -> ThresholdResult<Scalar> {
	if !indices.contains(&index) {
		return Err(ThresholdError::InvalidData(format!(
			"index {} is not part of the interpolation set",
			index
		)));
	}

	let x_i = Scalar::from(index as u64);
	let mut numerator = Scalar::ONE;
	let mut denominator = Scalar::ONE;

	for &other in indices {
		if other == index {
			continue;
		}
		if other == 0 {
			return Err(ThresholdError::InvalidData(
				"interpolation indices must be nonzero".to_string(),
			));
		}
		let x_j = Scalar::from(other as u64);
		numerator *= x_j;
		denominator *= x_j - x_i;
	}

	if denominator == Scalar::ZERO {
		return Err(ThresholdError::InvalidData(
			"interpolation indices must be distinct".to_string(),
		));
	}

	Ok(numerator * denominator.invert())
}

/// Reconstruct the shared secret from shares at the given 1-based indices.
pub(crate) fn reconstruct(indices: &[u16], shares: &[Scalar]) -> ThresholdResult<Scalar> {
	if indices.len() != shares.len() {
		return Err(ThresholdError::InvalidData(
			"share and index counts differ".to_string(),
		));
	}

	let mut secret = Scalar::ZERO;
	for (&index, share) in indices.iter().zip(shares) {
		secret += lagrange_coefficient(index, indices)? * share;
	}
	Ok(secret)
}
