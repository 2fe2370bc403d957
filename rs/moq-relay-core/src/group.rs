use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::Notify;

use crate::ring::GroupSequence;

struct Inner {
	seq: GroupSequence,
	frames: RwLock<Vec<Bytes>>,
	complete: AtomicBool,
	notify: Notify,
}

/// An append-only ordered sequence of frames belonging to one group.
///
/// Cheap to clone; clones share the same underlying frame list and notifier, so the ingest
/// loop's writer handle and every subscriber's reader handle observe the same state.
#[derive(Clone)]
pub struct GroupCache(Arc<Inner>);

impl GroupCache {
	pub fn new(seq: GroupSequence) -> Self {
		Self(Arc::new(Inner {
			seq,
			frames: RwLock::new(Vec::new()),
			complete: AtomicBool::new(false),
			notify: Notify::new(),
		}))
	}

	pub fn seq(&self) -> GroupSequence {
		self.0.seq
	}

	/// Append a frame and wake everyone currently waiting on this group.
	///
	/// Panics if called after [`Self::set_complete`]; the ingest loop is the sole writer and
	/// must not append past its own `complete` marker.
	pub fn append(&self, frame: Bytes) {
		debug_assert!(!self.is_complete(), "append after set_complete");
		self.0.frames.write().push(frame);
		self.0.notify.notify_waiters();
	}

	/// Return frame `i`, or `None` if it hasn't arrived yet.
	pub fn next(&self, i: usize) -> Option<Bytes> {
		self.0.frames.read().get(i).cloned()
	}

	pub fn len(&self) -> usize {
		self.0.frames.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Mark the group terminal; no further frames will be appended.
	pub fn set_complete(&self) {
		self.0.complete.store(true, Ordering::Release);
		self.0.notify.notify_waiters();
	}

	pub fn is_complete(&self) -> bool {
		self.0.complete.load(Ordering::Acquire)
	}

	/// Wait for the next `append` or `set_complete` call.
	///
	/// Built on `notify_waiters`, which only wakes tasks already registered at the time it
	/// fires: a notification landing between a caller's condition check and this call is
	/// missed. Callers must pair this with a short poll timeout (see `track::NOTIFY_TIMEOUT`)
	/// to bound the resulting latency rather than relying on this alone.
	pub async fn notified(&self) {
		self.0.notify.notified().await
	}

	/// True if both caches back the same group (used by tests and ring eviction bookkeeping).
	pub fn is_same(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.0, &other.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn append_then_next() {
		let cache = GroupCache::new(7);
		assert_eq!(cache.seq(), 7);
		assert!(cache.next(0).is_none());

		cache.append(Bytes::from_static(b"a"));
		cache.append(Bytes::from_static(b"b"));

		assert_eq!(cache.next(0), Some(Bytes::from_static(b"a")));
		assert_eq!(cache.next(1), Some(Bytes::from_static(b"b")));
		assert!(cache.next(2).is_none());
		assert!(!cache.is_complete());
	}

	#[test]
	fn set_complete_is_terminal() {
		let cache = GroupCache::new(0);
		cache.append(Bytes::from_static(b"x"));
		cache.set_complete();
		assert!(cache.is_complete());
		assert_eq!(cache.len(), 1);
	}

	#[tokio::test]
	async fn notified_wakes_on_append() {
		let cache = GroupCache::new(0);
		let cache2 = cache.clone();

		let waiter = tokio::spawn(async move {
			cache2.notified().await;
			cache2.next(0)
		});

		tokio::task::yield_now().await;
		cache.append(Bytes::from_static(b"hi"));

		let frame = waiter.await.unwrap();
		assert_eq!(frame, Some(Bytes::from_static(b"hi")));
	}
}
