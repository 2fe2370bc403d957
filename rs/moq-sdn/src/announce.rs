//! TTL'd multimap from broadcast-path to the relays holding it (spec §4.8).

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::time::{self, Clock};

#[derive(Debug, Clone, Serialize)]
pub struct AnnounceEntry {
	pub relay: String,
	pub broadcast_path: String,
	pub expires_at: i64,
}

impl AnnounceEntry {
	fn is_live(&self, now: i64) -> bool {
		self.expires_at == 0 || self.expires_at > now
	}
}

/// Registrations are idempotent on `(relay, broadcast_path)`: re-registering renews
/// `expires_at` in place rather than appending a duplicate entry.
pub struct AnnounceTable {
	ttl: Duration,
	entries: RwLock<HashMap<String, Vec<AnnounceEntry>>>,
	clock: Clock,
}

impl AnnounceTable {
	/// `ttl = Duration::ZERO` means entries never expire.
	pub fn new(ttl: Duration) -> Self {
		Self {
			ttl,
			entries: RwLock::new(HashMap::new()),
			clock: time::system_clock(),
		}
	}

	#[cfg(test)]
	fn with_clock(ttl: Duration, clock: Clock) -> Self {
		Self {
			ttl,
			entries: RwLock::new(HashMap::new()),
			clock,
		}
	}

	pub fn register(&self, relay: &str, broadcast_path: &str) {
		let now = (self.clock)();
		let expires_at = if self.ttl.is_zero() { 0 } else { now + self.ttl.as_millis() as i64 };

		let mut entries = self.entries.write();
		let list = entries.entry(broadcast_path.to_string()).or_default();
		match list.iter_mut().find(|entry| entry.relay == relay) {
			Some(existing) => existing.expires_at = expires_at,
			None => list.push(AnnounceEntry {
				relay: relay.to_string(),
				broadcast_path: broadcast_path.to_string(),
				expires_at,
			}),
		}
	}

	/// Returns whether an entry was actually removed.
	pub fn deregister(&self, relay: &str, broadcast_path: &str) -> bool {
		let mut entries = self.entries.write();
		let Some(list) = entries.get_mut(broadcast_path) else {
			return false;
		};
		let before = list.len();
		list.retain(|entry| entry.relay != relay);
		let removed = list.len() != before;
		if list.is_empty() {
			entries.remove(broadcast_path);
		}
		removed
	}

	/// Remove every entry belonging to `relay`, across all paths. Returns the count removed.
	/// Intended to be invoked when a relay is evicted from the topology (spec §9 open question,
	/// resolved: TTL-sweep of a node cascades into this).
	pub fn deregister_relay(&self, relay: &str) -> usize {
		let mut entries = self.entries.write();
		let mut removed = 0;
		entries.retain(|_path, list| {
			let before = list.len();
			list.retain(|entry| entry.relay != relay);
			removed += before - list.len();
			!list.is_empty()
		});
		removed
	}

	/// Non-expired entries for `broadcast_path`. Expired entries are filtered here but not
	/// removed; [`Self::sweep`] owns removal.
	pub fn lookup(&self, broadcast_path: &str) -> Vec<AnnounceEntry> {
		let now = (self.clock)();
		self.entries
			.read()
			.get(broadcast_path)
			.into_iter()
			.flatten()
			.filter(|entry| entry.is_live(now))
			.cloned()
			.collect()
	}

	/// All non-expired entries across every path.
	pub fn all(&self) -> Vec<AnnounceEntry> {
		let now = (self.clock)();
		self.entries.read().values().flatten().filter(|entry| entry.is_live(now)).cloned().collect()
	}

	/// Remove every expired entry; returns the count removed.
	pub fn sweep(&self) -> usize {
		let now = (self.clock)();
		let mut entries = self.entries.write();
		let mut removed = 0;
		entries.retain(|_path, list| {
			let before = list.len();
			list.retain(|entry| entry.is_live(now));
			removed += before - list.len();
			!list.is_empty()
		});
		removed
	}

	pub fn start_sweeper(self: &Arc<Self>, cancel: CancellationToken, interval: Duration) -> tokio::task::JoinHandle<()> {
		let this = self.clone();
		tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let removed = this.sweep();
						if removed > 0 {
							tracing::debug!(removed, "announce table sweep");
						}
					}
					_ = cancel.cancelled() => return,
				}
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_is_idempotent_and_renews_expiry() {
		let table = AnnounceTable::new(Duration::from_secs(60));
		table.register("relay-a", "/live/s1");
		let first = table.lookup("/live/s1");
		assert_eq!(first.len(), 1);

		table.register("relay-a", "/live/s1");
		let second = table.lookup("/live/s1");
		assert_eq!(second.len(), 1);
		assert!(second[0].expires_at >= first[0].expires_at);
	}

	#[test]
	fn lookup_aggregates_multiple_relays() {
		let table = AnnounceTable::new(Duration::from_secs(60));
		table.register("relay-a", "/live/s1");
		table.register("relay-b", "/live/s1");
		let relays: std::collections::HashSet<_> = table.lookup("/live/s1").into_iter().map(|e| e.relay).collect();
		assert_eq!(relays, ["relay-a".to_string(), "relay-b".to_string()].into_iter().collect());
	}

	#[test]
	fn sweep_removes_expired_entries() {
		let (clock, now) = crate::time::fake_clock(1_000);
		let table = AnnounceTable::with_clock(Duration::from_millis(50), clock);
		table.register("relay-a", "/live/s1");
		assert_eq!(table.lookup("/live/s1").len(), 1);

		now.fetch_add(60, std::sync::atomic::Ordering::Relaxed);
		assert_eq!(table.lookup("/live/s1").len(), 0, "expired entries are filtered from lookup");
		assert_eq!(table.sweep(), 1);
		assert!(table.all().is_empty());
	}

	#[test]
	fn deregister_relay_removes_only_that_relays_entries() {
		let table = AnnounceTable::new(Duration::ZERO);
		table.register("relay-a", "/live/s1");
		table.register("relay-b", "/live/s1");
		table.register("relay-a", "/live/s2");

		let removed = table.deregister_relay("relay-a");
		assert_eq!(removed, 2);
		assert_eq!(table.lookup("/live/s1").len(), 1);
		assert!(table.lookup("/live/s2").is_empty());
	}

	#[test]
	fn zero_ttl_never_expires() {
		let table = AnnounceTable::new(Duration::ZERO);
		table.register("relay-a", "/live/s1");
		assert_eq!(table.sweep(), 0);
		assert_eq!(table.lookup("/live/s1").len(), 1);
	}
}
