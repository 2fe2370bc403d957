use std::{
	collections::HashMap,
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
	group::GroupCache,
	ring::{GroupRing, GroupSequence},
	session::{GroupReader, TrackReader, TrackWriter},
};

/// Worst-case latency of a missed wakeup; see [`crate::group::GroupCache::notified`].
pub const NOTIFY_TIMEOUT: Duration = Duration::from_millis(1);

/// A handle returned by [`TrackDistributor::subscribe`]. Dropping it does not unsubscribe;
/// callers must call [`TrackDistributor::unsubscribe`] explicitly (the egress loop does this
/// on every exit path).
pub struct Subscription {
	id: u64,
	notify_rx: mpsc::Receiver<()>,
}

/// One-producer / many-consumer fan-out over a single track's groups.
///
/// The producer is the ingest loop started by [`Self::ingest`]; consumers are the egress loops
/// started by [`Self::egress`], one per downstream subscriber. Subscribers communicate with the
/// distributor only through a buffered size-1 notification channel: the channel never carries
/// data, it is strictly an edge-triggered "look again" signal. The actual frames live in the
/// shared [`GroupRing`], read without taking the subscriber-set lock.
pub struct TrackDistributor {
	ring: GroupRing,
	subscribers: RwLock<HashMap<u64, mpsc::Sender<()>>>,
	next_id: AtomicU64,
}

impl TrackDistributor {
	pub fn new(cache_capacity: usize) -> Self {
		Self {
			ring: GroupRing::new(cache_capacity),
			subscribers: RwLock::new(HashMap::new()),
			next_id: AtomicU64::new(0),
		}
	}

	pub fn subscriber_count(&self) -> usize {
		self.subscribers.read().len()
	}

	/// Register a new subscriber; safe to call concurrently with broadcasts and other
	/// subscribe/unsubscribe calls.
	pub fn subscribe(&self) -> Subscription {
		let (tx, rx) = mpsc::channel(1);
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		self.subscribers.write().insert(id, tx);
		Subscription { id, notify_rx: rx }
	}

	/// Idempotent; unsubscribing an unknown or already-removed id is a no-op.
	pub fn unsubscribe(&self, id: u64) {
		self.subscribers.write().remove(&id);
	}

	/// Non-blocking wakeup of every registered subscriber. Holds only a read lock on the
	/// subscriber set for the duration of the loop; a full channel means the subscriber already
	/// has a pending wakeup, so dropping the send is correct.
	fn broadcast(&self) {
		for tx in self.subscribers.read().values() {
			let _ = tx.try_send(());
		}
	}

	/// Single-producer ingest loop: pulls groups (and their frames) from `source` and appends
	/// them to the ring, broadcasting after every frame. Runs until `source` yields an error or
	/// `cancel` fires, then invokes `on_close` exactly once.
	pub async fn ingest(
		&self,
		cancel: CancellationToken,
		mut source: Box<dyn TrackReader>,
		on_close: impl FnOnce(),
	) {
		loop {
			let group = match source.accept_group(&cancel).await {
				Ok(Some(group)) => group,
				Ok(None) => break,
				Err(err) => {
					tracing::debug!(%err, "track ingest: source closed");
					break;
				}
			};

			if let Err(err) = self.ingest_group(group).await {
				tracing::debug!(%err, "track ingest: group read failed");
				break;
			}
		}

		on_close();
	}

	async fn ingest_group(&self, mut group: Box<dyn GroupReader>) -> crate::error::Result<()> {
		let seq = group.sequence();
		let Some(cache) = self.ring.create(seq) else {
			// Already outside the retention window; drain and drop without publishing.
			while group.read_frame().await?.is_some() {}
			return Ok(());
		};

		loop {
			match group.read_frame().await? {
				Some(frame) => {
					cache.append(frame);
					self.broadcast();
				}
				None => {
					cache.set_complete();
					self.broadcast();
					return Ok(());
				}
			}
		}
	}

	/// Drive one downstream subscriber until `writer`'s context is cancelled or the distributor
	/// has no more data for it (the distributor itself never "closes" independent of ingest
	/// ending, since the ring persists after `ingest` returns).
	pub async fn egress(&self, writer: &mut dyn TrackWriter, sub: &mut Subscription) {
		let ctx = writer.context();
		let mut last = self.ring.head().saturating_sub(1);

		loop {
			let latest = self.ring.head();

			if last < latest {
				last += 1;

				if last < self.ring.earliest_available() {
					// Catch-up rule: skip the groups we can no longer serve.
					last = latest.saturating_sub(1);
					continue;
				}

				let cache = match self.ring.get(last) {
					Some(cache) => cache,
					None => {
						last = last.saturating_sub(1);
						continue;
					}
				};

				let mut group_writer = match writer.open_group_at(cache.seq()) {
					Ok(group_writer) => group_writer,
					Err(err) => {
						tracing::debug!(%err, "egress: open_group_at failed, terminating subscriber");
						return;
					}
				};

				let mut i = 0usize;
				loop {
					match cache.next(i) {
						Some(frame) => {
							i += 1;
							if let Err(err) = group_writer.write_frame(frame) {
								tracing::debug!(%err, "egress: write_frame failed, terminating subscriber");
								return;
							}
						}
						None => {
							if cache.is_complete() {
								break;
							}
							tokio::select! {
								_ = cache.notified() => {}
								_ = tokio::time::sleep(NOTIFY_TIMEOUT) => {}
								_ = ctx.cancelled() => {
									group_writer.close();
									return;
								}
							}
						}
					}
				}

				group_writer.close();
			} else {
				tokio::select! {
					_ = sub.notify_rx.recv() => {}
					_ = tokio::time::sleep(NOTIFY_TIMEOUT) => {}
					_ = ctx.cancelled() => return,
				}
			}
		}
	}
}

impl Subscription {
	pub fn id(&self) -> u64 {
		self.id
	}
}

#[cfg(test)]
mod tests {
	use std::sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering},
		Arc,
	};

	use bytes::Bytes;

	use super::*;
	use crate::error::Result;

	struct FakeGroupReader {
		seq: GroupSequence,
		frames: Vec<Bytes>,
	}

	#[async_trait::async_trait]
	impl GroupReader for FakeGroupReader {
		fn sequence(&self) -> GroupSequence {
			self.seq
		}

		async fn read_frame(&mut self) -> Result<Option<Bytes>> {
			Ok(if self.frames.is_empty() { None } else { Some(self.frames.remove(0)) })
		}
	}

	struct FakeTrackReader {
		groups: Vec<FakeGroupReader>,
	}

	#[async_trait::async_trait]
	impl TrackReader for FakeTrackReader {
		async fn accept_group(
			&mut self,
			_cancel: &CancellationToken,
		) -> Result<Option<Box<dyn GroupReader>>> {
			if self.groups.is_empty() {
				Ok(None)
			} else {
				Ok(Some(Box::new(self.groups.remove(0))))
			}
		}
	}

	struct FakeGroupWriter {
		seq: GroupSequence,
		received: Arc<parking_lot::Mutex<Vec<(GroupSequence, Vec<Bytes>)>>>,
		idx: usize,
	}

	impl crate::session::GroupWriter for FakeGroupWriter {
		fn write_frame(&mut self, frame: Bytes) -> Result<()> {
			self.received.lock()[self.idx].1.push(frame);
			Ok(())
		}

		fn close(&mut self) {
			let _ = self.seq;
		}
	}

	struct FakeTrackWriter {
		ctx: CancellationToken,
		received: Arc<parking_lot::Mutex<Vec<(GroupSequence, Vec<Bytes>)>>>,
	}

	impl TrackWriter for FakeTrackWriter {
		fn open_group_at(&mut self, seq: GroupSequence) -> Result<Box<dyn crate::session::GroupWriter>> {
			let mut received = self.received.lock();
			received.push((seq, Vec::new()));
			let idx = received.len() - 1;
			drop(received);
			Ok(Box::new(FakeGroupWriter {
				seq,
				received: self.received.clone(),
				idx,
			}))
		}

		fn close_with_error(&mut self, _code: u32) {}

		fn context(&self) -> CancellationToken {
			self.ctx.clone()
		}
	}

	#[tokio::test]
	async fn subscribe_unsubscribe_balance() {
		let dist = TrackDistributor::new(10);
		let a = dist.subscribe();
		let b = dist.subscribe();
		assert_eq!(dist.subscriber_count(), 2);
		dist.unsubscribe(a.id());
		assert_eq!(dist.subscriber_count(), 1);
		dist.unsubscribe(a.id()); // double-unsubscribe is a no-op
		assert_eq!(dist.subscriber_count(), 1);
		dist.unsubscribe(b.id());
		assert_eq!(dist.subscriber_count(), 0);
	}

	#[tokio::test]
	async fn ingest_then_egress_delivers_all_frames_in_order() {
		let dist = Arc::new(TrackDistributor::new(10));
		let closed = Arc::new(AtomicBool::new(false));

		let source = Box::new(FakeTrackReader {
			groups: vec![FakeGroupReader {
				seq: 0,
				frames: vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")],
			}],
		});

		let dist_ingest = dist.clone();
		let closed_ingest = closed.clone();
		let ingest_task = tokio::spawn(async move {
			dist_ingest
				.ingest(CancellationToken::new(), source, || {
					closed_ingest.store(true, AtomicOrdering::Release);
				})
				.await;
		});

		ingest_task.await.unwrap();
		assert!(closed.load(AtomicOrdering::Acquire));

		let mut sub = dist.subscribe();
		let ctx = CancellationToken::new();
		let received = Arc::new(parking_lot::Mutex::new(Vec::new()));
		let mut writer = FakeTrackWriter {
			ctx: ctx.clone(),
			received: received.clone(),
		};

		let egress_dist = dist.clone();
		let egress_ctx = ctx.clone();
		let egress_task = tokio::spawn(async move {
			egress_dist.egress(&mut writer, &mut sub).await;
		});

		// The single group is already complete; give egress a moment to drain it, then cancel.
		tokio::time::sleep(Duration::from_millis(20)).await;
		egress_ctx.cancel();
		egress_task.await.unwrap();

		let received = received.lock();
		assert_eq!(received.len(), 1);
		assert_eq!(received[0].0, 0);
		assert_eq!(
			received[0].1,
			vec![Bytes::from_static(b"a"), Bytes::from_static(b"b"), Bytes::from_static(b"c")]
		);
	}

	#[tokio::test]
	async fn broadcast_is_non_blocking_under_many_subscribers() {
		let dist = TrackDistributor::new(10);
		let subs: Vec<_> = (0..100).map(|_| dist.subscribe()).collect();
		assert_eq!(dist.subscriber_count(), 100);
		dist.broadcast();
		let woken = AtomicUsize::new(0);
		for mut sub in subs {
			if sub.notify_rx.try_recv().is_ok() {
				woken.fetch_add(1, AtomicOrdering::Relaxed);
			}
		}
		assert_eq!(woken.load(AtomicOrdering::Relaxed), 100);
	}
}
