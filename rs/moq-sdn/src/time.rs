use std::{
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};

use crate::graph::Timestamp;

/// Source of the current time, in milliseconds since the Unix epoch. Boxed so TTL tests can
/// swap in a fake that advances deterministically instead of sleeping for real.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Milliseconds since the Unix epoch, used for `Node::last_seen` and `AnnounceEntry::expires_at`.
/// Millisecond (not second) resolution so unit tests can use sub-second TTLs.
pub fn now_millis() -> Timestamp {
	SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as Timestamp
}

/// The real wall clock. Default for every [`Clock`]-holding type.
pub fn system_clock() -> Clock {
	Arc::new(now_millis)
}

#[cfg(test)]
pub fn fake_clock(start: Timestamp) -> (Clock, Arc<std::sync::atomic::AtomicI64>) {
	use std::sync::atomic::Ordering;

	let now = Arc::new(std::sync::atomic::AtomicI64::new(start));
	let reader = now.clone();
	let clock: Clock = Arc::new(move || reader.load(Ordering::Relaxed));
	(clock, now)
}
