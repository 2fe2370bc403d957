use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::group::GroupCache;

/// Monotonic, non-negative sequence number identifying an ordered group of frames within a track.
pub type GroupSequence = u64;

/// Default ring capacity (number of retained groups) when not overridden by configuration.
pub const DEFAULT_GROUP_CACHE_SIZE: usize = 100;

struct State {
	groups: BTreeMap<GroupSequence, GroupCache>,
	head: GroupSequence,
}

/// A bounded FIFO of group caches, keyed by [`GroupSequence`].
///
/// Invariants (see spec §3/§8):
/// - `head()` is the largest sequence ever admitted.
/// - `earliest_available() == head() - len + 1` (or `1` when empty).
/// - retention never exceeds `capacity`.
pub struct GroupRing {
	capacity: usize,
	state: RwLock<State>,
}

impl GroupRing {
	pub fn new(capacity: usize) -> Self {
		assert!(capacity > 0, "ring capacity must be positive");
		Self {
			capacity,
			state: RwLock::new(State {
				groups: BTreeMap::new(),
				head: 0,
			}),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Admit a new group at `seq`, evicting the lowest-sequence group if the ring is full.
	///
	/// Returns `None` if `seq` falls below the retention window (already evicted). Re-issuing
	/// a `seq` that still has a complete cache is a no-op that returns the existing cache;
	/// re-issuing over an incomplete cache replaces it.
	pub fn create(&self, seq: GroupSequence) -> Option<GroupCache> {
		let mut state = self.state.write();

		if state.head != 0 && seq + self.capacity as GroupSequence <= state.head {
			// Already outside the retention window; drop the late arrival.
			return None;
		}

		if let Some(existing) = state.groups.get(&seq) {
			if existing.is_complete() {
				return Some(existing.clone());
			}
		}

		let cache = GroupCache::new(seq);
		state.groups.insert(seq, cache.clone());
		if seq > state.head {
			state.head = seq;
		}

		while state.groups.len() > self.capacity {
			if let Some(&lowest) = state.groups.keys().next() {
				state.groups.remove(&lowest);
			}
		}

		Some(cache)
	}

	/// O(1) lookup; `None` when evicted or never admitted.
	pub fn get(&self, seq: GroupSequence) -> Option<GroupCache> {
		self.state.read().groups.get(&seq).cloned()
	}

	/// The largest sequence ever admitted, or `0` if the ring is empty.
	pub fn head(&self) -> GroupSequence {
		self.state.read().head
	}

	/// The smallest sequence still retained, or `1` if the ring is empty.
	pub fn earliest_available(&self) -> GroupSequence {
		let state = self.state.read();
		let len = state.groups.len() as GroupSequence;
		if len == 0 {
			1
		} else {
			state.head + 1 - len
		}
	}

	pub fn len(&self) -> usize {
		self.state.read().groups.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn monotone_head() {
		let ring = GroupRing::new(4);
		ring.create(3);
		ring.create(1); // arrives late but still within window
		ring.create(5);
		assert_eq!(ring.head(), 5);
	}

	#[test]
	fn bounded_retention() {
		let ring = GroupRing::new(3);
		for seq in 0..10 {
			ring.create(seq);
			assert!(ring.head() - ring.earliest_available() + 1 <= ring.capacity() as u64);
		}
		assert_eq!(ring.len(), 3);
		assert_eq!(ring.head(), 9);
		assert_eq!(ring.earliest_available(), 7);
		assert!(ring.get(6).is_none(), "seq 6 should have been evicted");
		assert!(ring.get(7).is_some());
	}

	#[test]
	fn empty_ring_defaults() {
		let ring = GroupRing::new(10);
		assert_eq!(ring.head(), 0);
		assert_eq!(ring.earliest_available(), 1);
		assert!(ring.get(0).is_none());
	}

	#[test]
	fn late_arrival_outside_window_is_dropped() {
		let ring = GroupRing::new(2);
		ring.create(10);
		ring.create(11);
		assert!(ring.create(5).is_none(), "seq 5 is far below the retention window");
	}

	#[test]
	fn tie_break_replaces_only_incomplete() {
		let ring = GroupRing::new(4);
		let first = ring.create(1).unwrap();
		first.append(bytes::Bytes::from_static(b"a"));

		// Re-issuing while incomplete replaces the entry.
		let second = ring.create(1).unwrap();
		assert!(!second.is_same(&first));

		second.set_complete();

		// Re-issuing a complete group is a no-op; the same handle comes back.
		let third = ring.create(1).unwrap();
		assert!(third.is_same(&second));
	}
}
