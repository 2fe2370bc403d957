use std::sync::Arc;

/// Errors produced by the relay's transport-model core.
///
/// Cloneable so that a single terminal state (e.g. a closed [`crate::track::TrackDistributor`])
/// can be observed by an arbitrary number of waiters.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
	#[error("transport error: {0}")]
	Transport(Arc<dyn std::error::Error + Send + Sync>),

	#[error("not found")]
	NotFound,

	#[error("duplicate")]
	Duplicate,

	#[error("cancelled")]
	Cancel,

	#[error("closed")]
	Closed,

	#[error("old group sequence")]
	Old,
}

impl Error {
	pub fn transport<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
		Self::Transport(Arc::new(err))
	}
}

pub type Result<T> = std::result::Result<T, Error>;
