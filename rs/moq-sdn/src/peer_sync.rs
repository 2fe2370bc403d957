//! Pulls topology snapshots from a configured peer SDN on a timer (spec §4.9).
//!
//! No quorum, no conflict resolution: the peer's snapshot is authoritative on pull, the local
//! snapshot is authoritative on push. This mirrors `moq-relay`'s [`crate::announce::AnnounceClient`]
//! in the sibling crate — a thin `reqwest` client wrapped around a ticking loop.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{dto::GraphResponse, topology::Topology};

pub struct PeerSyncer {
	http: reqwest::Client,
	peer_url: url::Url,
	topology: Arc<Topology>,
	interval: Duration,
}

impl PeerSyncer {
	pub fn new(peer_url: url::Url, topology: Arc<Topology>, interval: Duration) -> Self {
		Self {
			http: reqwest::Client::new(),
			peer_url,
			topology,
			interval,
		}
	}

	/// `GET peer_url/sync`, decode, and `Topology::restore`. Transport or decode errors are
	/// logged and the loop continues — an unreachable peer degrades sync, not the local SDN.
	pub async fn run(&self, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = cancel.cancelled() => return,
			}

			if let Err(err) = self.pull().await {
				tracing::warn!(%err, peer = %self.peer_url, "peer topology sync failed");
			}
		}
	}

	async fn pull(&self) -> anyhow::Result<()> {
		let url = self.peer_url.join("sync")?;
		let response: GraphResponse = self.http.get(url).send().await?.error_for_status()?.json().await?;
		self.topology.restore(response.into_graph());
		Ok(())
	}

	/// One-shot `PUT peer_url/sync` with the local snapshot.
	pub async fn push(&self) -> anyhow::Result<()> {
		let url = self.peer_url.join("sync")?;
		let body = GraphResponse::from_graph(&self.topology.snapshot());
		self.http.put(url).json(&body).send().await?.error_for_status()?;
		Ok(())
	}
}
