//! Participant management for the threshold protocol.
//!
//! This module provides the `ParticipantList` type which manages the set of
//! party identifiers in a session and provides the ID-to-index mapping. The
//! protocol accepts arbitrary string party IDs while internally using
//! sequential 0-based indices; the secret-sharing layer evaluates its
//! polynomials at `index + 1`.
//!
//! # Design
//!
//! Indices are assigned deterministically by sorting the party IDs
//! lexicographically, so every participant that knows the full roster
//! derives the same assignment (and therefore the same Lagrange
//! coefficients) without any extra coordination.
//!
//! # Example
//!
//! ```
//! use threshold_ed25519::participants::ParticipantList;
//!
//! let ids = ["relay-2".to_string(), "relay-0".to_string(), "relay-1".to_string()];
//! let participants = ParticipantList::new(&ids).unwrap();
//!
//! assert_eq!(participants.index_of("relay-0"), Some(0)); // smallest -> index 0
//! assert_eq!(participants.index_of("relay-2"), Some(2)); // largest -> index 2
//! assert_eq!(participants.get(1), Some("relay-1"));
//! ```

use std::collections::HashMap;

/// Type alias for party identifiers.
///
/// Party IDs are opaque strings chosen by the deployment (host names,
/// account IDs, device serials). They are never interpreted beyond their
/// lexicographic order.
pub type PartyId = String;

/// A sorted list of participants with ID-to-index mapping.
///
/// The sequential indices (0, 1, 2, ...) are used for Lagrange coefficient
/// computation and array indexing, while the original party IDs are
/// preserved for message routing.
///
/// # Invariants
///
/// - Participants are always stored in sorted order
/// - No duplicate party IDs
/// - Index mapping is consistent: `index_of(get(i)) == Some(i)`
#[derive(Debug, Clone)]
pub struct ParticipantList {
	/// Sorted list of party IDs.
	participants: Vec<PartyId>,
	/// Maps party ID to index in the sorted list.
	indices: HashMap<PartyId, u16>,
}

impl ParticipantList {
	/// Create a new participant list from a slice of party IDs.
	///
	/// The participants will be sorted internally. Returns `None` if
	/// there are duplicate party IDs.
	///
	/// # Example
	///
	/// ```
	/// use threshold_ed25519::participants::ParticipantList;
	///
	/// let list = ParticipantList::new(&["c".into(), "a".into(), "b".into()]).unwrap();
	/// assert_eq!(list.len(), 3);
	/// assert_eq!(list.get(0), Some("a")); // sorted order
	/// ```
	pub fn new(participants: &[PartyId]) -> Option<Self> {
		let mut sorted = participants.to_vec();
		sorted.sort();

		let indices: HashMap<_, _> = sorted
			.iter()
			.enumerate()
			.map(|(idx, id)| (id.clone(), idx as u16))
			.collect();

		// HashMap has fewer entries than the list iff duplicates exist
		if indices.len() != sorted.len() {
			return None;
		}

		Some(Self { participants: sorted, indices })
	}

	/// Returns the number of participants.
	#[inline]
	pub fn len(&self) -> usize {
		self.participants.len()
	}

	/// Returns true if the list is empty.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.participants.is_empty()
	}

	/// Check if a party ID is in this list.
	#[inline]
	pub fn contains(&self, id: &str) -> bool {
		self.indices.contains_key(id)
	}

	/// Get the protocol index for a party ID.
	///
	/// Returns `Some(index)` if the party is in the list, `None` otherwise.
	/// The index is guaranteed to be in the range `0..self.len()`.
	#[inline]
	pub fn index_of(&self, id: &str) -> Option<u16> {
		self.indices.get(id).copied()
	}

	/// Get the party ID at a given index.
	#[inline]
	pub fn get(&self, index: u16) -> Option<&str> {
		self.participants.get(index as usize).map(String::as_str)
	}

	/// Iterate over all party IDs in sorted order.
	pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
		self.participants.iter().map(String::as_str)
	}

	/// Get a slice of all party IDs in sorted order.
	#[inline]
	pub fn as_slice(&self) -> &[PartyId] {
		&self.participants
	}

	/// Check if this list contains all the given party IDs.
	pub fn contains_all(&self, ids: &[PartyId]) -> bool {
		ids.iter().all(|id| self.contains(id))
	}

	/// Resolve a set of party IDs to their protocol indices, sorted
	/// ascending.
	///
	/// Returns `None` if any ID is unknown or appears twice. The returned
	/// indices are relative to this (full) roster, which is what keeps
	/// Lagrange coefficients stable across different signer subsets.
	///
	/// # Example
	///
	/// ```
	/// use threshold_ed25519::participants::ParticipantList;
	///
	/// let list = ParticipantList::new(&["a".into(), "b".into(), "c".into()]).unwrap();
	/// let subset = list.subset_indices(&["c".into(), "a".into()]).unwrap();
	/// assert_eq!(subset, vec![0, 2]);
	/// ```
	pub fn subset_indices(&self, ids: &[PartyId]) -> Option<Vec<u16>> {
		let mut indices: Vec<u16> =
			ids.iter().map(|id| self.index_of(id)).collect::<Option<_>>()?;
		indices.sort_unstable();
		indices.dedup();
		if indices.len() != ids.len() {
			return None;
		}
		Some(indices)
	}
}

impl PartialEq for ParticipantList {
	fn eq(&self, other: &Self) -> bool {
		self.participants == other.participants
	}
}

impl Eq for ParticipantList {}

impl From<ParticipantList> for Vec<PartyId> {
	fn from(list: ParticipantList) -> Self {
		list.participants
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ids(names: &[&str]) -> Vec<PartyId> {
		names.iter().map(|s| s.to_string()).collect()
	}

	#[test]
	fn test_new_sorts_participants() {
		let list = ParticipantList::new(&ids(&["p2", "p0", "p1"])).unwrap();
		assert_eq!(list.as_slice(), &ids(&["p0", "p1", "p2"]));
	}

	#[test]
	fn test_new_rejects_duplicates() {
		assert!(ParticipantList::new(&ids(&["p0", "p1", "p0"])).is_none());
	}

	#[test]
	fn test_index_of() {
		let list = ParticipantList::new(&ids(&["zeta", "alpha", "mid"])).unwrap();
		assert_eq!(list.index_of("alpha"), Some(0));
		assert_eq!(list.index_of("mid"), Some(1));
		assert_eq!(list.index_of("zeta"), Some(2));
		assert_eq!(list.index_of("missing"), None);
	}

	#[test]
	fn test_index_get_roundtrip() {
		let list = ParticipantList::new(&ids(&["node-a", "node-b", "node-c"])).unwrap();
		for id in list.as_slice().to_vec() {
			let idx = list.index_of(&id).unwrap();
			assert_eq!(list.get(idx), Some(id.as_str()));
		}
	}

	#[test]
	fn test_lexicographic_not_numeric() {
		// "p10" sorts before "p2" lexicographically; the assignment rule is
		// string order, nothing smarter.
		let list = ParticipantList::new(&ids(&["p2", "p10"])).unwrap();
		assert_eq!(list.index_of("p10"), Some(0));
		assert_eq!(list.index_of("p2"), Some(1));
	}

	#[test]
	fn test_subset_indices_sorted() {
		let list = ParticipantList::new(&ids(&["a", "b", "c", "d"])).unwrap();
		let subset = list.subset_indices(&ids(&["d", "b"])).unwrap();
		assert_eq!(subset, vec![1, 3]);
	}

	#[test]
	fn test_subset_indices_rejects_unknown_and_duplicates() {
		let list = ParticipantList::new(&ids(&["a", "b", "c"])).unwrap();
		assert!(list.subset_indices(&ids(&["a", "x"])).is_none());
		assert!(list.subset_indices(&ids(&["a", "a"])).is_none());
	}

	#[test]
	fn test_contains() {
		let list = ParticipantList::new(&ids(&["a", "b"])).unwrap();
		assert!(list.contains("a"));
		assert!(!list.contains("z"));
		assert!(list.contains_all(&ids(&["a", "b"])));
		assert!(!list.contains_all(&ids(&["a", "z"])));
	}

	#[test]
	fn test_empty_list() {
		let list = ParticipantList::new(&[]).unwrap();
		assert!(list.is_empty());
		assert_eq!(list.get(0), None);
	}
}
