use bytes::BytesMut;
use parking_lot::Mutex;

/// Default capacity used when a [`FramePool`] is constructed without an explicit override.
pub const DEFAULT_NEW_FRAME_CAPACITY: usize = 1500;

/// A process-wide slab allocator for byte buffers of a fixed capacity.
///
/// `get()` hands out a zero-length buffer with at least `capacity` bytes of backing storage;
/// `put()` returns it to the pool once the caller is done. Buffers that shrank below `capacity`
/// while in use (e.g. `split_to`) are discarded rather than pooled, since they'd just force a
/// reallocation on the next `get()` anyway.
pub struct FramePool {
	capacity: usize,
	free: Mutex<Vec<BytesMut>>,
}

impl FramePool {
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			free: Mutex::new(Vec::new()),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Borrow a buffer with `len() == 0` and `capacity() >= self.capacity`.
	pub fn get(&self) -> BytesMut {
		let mut free = self.free.lock();
		match free.pop() {
			Some(mut buf) => {
				buf.clear();
				buf
			}
			None => BytesMut::with_capacity(self.capacity),
		}
	}

	/// Return a buffer to the pool. Buffers smaller than `self.capacity` are dropped instead.
	pub fn put(&self, buf: BytesMut) {
		if buf.capacity() >= self.capacity {
			self.free.lock().push(buf);
		}
	}
}

impl Default for FramePool {
	fn default() -> Self {
		Self::new(DEFAULT_NEW_FRAME_CAPACITY)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reuses_returned_buffers() {
		let pool = FramePool::new(16);
		let buf = pool.get();
		assert_eq!(buf.len(), 0);
		assert!(buf.capacity() >= 16);
		let ptr = buf.as_ptr();
		pool.put(buf);

		let buf2 = pool.get();
		assert_eq!(buf2.as_ptr(), ptr, "expected the same backing allocation to be reused");
	}

	#[test]
	fn discards_undersized_buffers() {
		let pool = FramePool::new(16);
		let tiny = BytesMut::with_capacity(4);
		pool.put(tiny);
		assert!(pool.free.lock().is_empty());
	}
}
