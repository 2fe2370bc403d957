use std::{
	collections::HashSet,
	time::Duration,
};

use moq_relay_core::path::PathOwned;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::dto::{AnnounceEntryDto, AnnounceListResponse, AnnounceLookupResponse, RouteResult};

const HEARTBEAT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);

/// Registers locally-observed broadcast paths with the SDN's announce directory and keeps them
/// alive with periodic heartbeats; also the relay's read path into the directory and router.
pub struct AnnounceClient {
	http: reqwest::Client,
	base_url: url::Url,
	relay_name: String,
	heartbeat_interval: Duration,
	paths: RwLock<HashSet<PathOwned>>,
}

impl AnnounceClient {
	pub fn new(base_url: url::Url, relay_name: String, heartbeat_interval: Duration) -> Self {
		Self {
			http: reqwest::Client::new(),
			base_url,
			relay_name,
			heartbeat_interval,
			paths: RwLock::new(HashSet::new()),
		}
	}

	fn announce_url(&self, path: &str) -> url::Url {
		let trimmed = path.trim_start_matches('/');
		self.base_url
			.join(&format!("announce/{}/{}", self.relay_name, trimmed))
			.expect("relay_name and broadcast path form a valid URL segment")
	}

	/// Add `path` to the locally-tracked set and fire-and-forget a PUT to the SDN.
	pub async fn register(&self, path: PathOwned) {
		self.paths.write().insert(path.clone());
		if let Err(err) = self.put(&path).await {
			tracing::warn!(%err, %path, "announce registration failed");
		}
	}

	/// Remove `path` from the tracked set and fire-and-forget a DELETE; a 404 from the SDN is
	/// treated as success (already gone).
	pub async fn deregister(&self, path: &PathOwned) {
		self.paths.write().remove(path);
		if let Err(err) = self.delete(path).await {
			tracing::warn!(%err, %path, "announce deregistration failed");
		}
	}

	async fn put(&self, path: &PathOwned) -> anyhow::Result<()> {
		let resp = self
			.http
			.put(self.announce_url(path.as_str()))
			.timeout(HEARTBEAT_REQUEST_TIMEOUT)
			.send()
			.await?;
		resp.error_for_status()?;
		Ok(())
	}

	async fn delete(&self, path: &PathOwned) -> anyhow::Result<()> {
		let resp = self
			.http
			.delete(self.announce_url(path.as_str()))
			.timeout(HEARTBEAT_REQUEST_TIMEOUT)
			.send()
			.await?;
		match resp.error_for_status_ref() {
			Ok(_) => Ok(()),
			Err(err) if resp.status() == reqwest::StatusCode::NOT_FOUND => {
				let _ = err;
				Ok(())
			}
			Err(err) => Err(err.into()),
		}
	}

	/// Re-announce every tracked path every `heartbeat_interval`, until `cancel` fires.
	pub async fn heartbeat_loop(&self, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval(self.heartbeat_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = cancel.cancelled() => return,
			}

			let paths: Vec<_> = self.paths.read().iter().cloned().collect();
			for path in paths {
				if let Err(err) = self.put(&path).await {
					tracing::warn!(%err, %path, "announce heartbeat failed");
				}
			}
		}
	}

	/// Best-effort deregister of every tracked path, bounded by a fixed overall budget.
	pub async fn shutdown(&self) {
		let paths: Vec<_> = self.paths.read().iter().cloned().collect();
		let _ = tokio::time::timeout(SHUTDOWN_BUDGET, async {
			for path in paths {
				let _ = self.delete(&path).await;
			}
		})
		.await;
	}

	pub async fn lookup(&self, broadcast_path: &str) -> anyhow::Result<Vec<String>> {
		let mut url = self.base_url.join("announce/lookup")?;
		url.query_pairs_mut().append_pair("broadcast_path", broadcast_path);
		let resp: AnnounceLookupResponse = self.http.get(url).send().await?.error_for_status()?.json().await?;
		Ok(resp.relays)
	}

	pub async fn route(&self, from: &str, to: &str) -> anyhow::Result<RouteResult> {
		let mut url = self.base_url.join("route")?;
		url.query_pairs_mut().append_pair("from", from).append_pair("to", to);
		let result = self.http.get(url).send().await?.error_for_status()?.json().await?;
		Ok(result)
	}

	pub async fn list_all(&self) -> anyhow::Result<Vec<AnnounceEntryDto>> {
		let url = self.base_url.join("announce")?;
		let resp: AnnounceListResponse = self.http.get(url).send().await?.error_for_status()?.json().await?;
		Ok(resp.entries)
	}
}

#[cfg(test)]
mod tests {
	use wiremock::{
		matchers::{method, path},
		Mock, MockServer, ResponseTemplate,
	};

	use super::*;

	#[tokio::test]
	async fn register_puts_to_sdn_announce_endpoint() {
		let server = MockServer::start().await;
		Mock::given(method("PUT"))
			.and(path("/announce/relay-a/live/s1"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "registered"})))
			.expect(1)
			.mount(&server)
			.await;

		let client = AnnounceClient::new(server.uri().parse().unwrap(), "relay-a".to_string(), Duration::from_secs(30));
		client.register(PathOwned::new("/live/s1")).await;
	}

	#[tokio::test]
	async fn deregister_treats_404_as_success() {
		let server = MockServer::start().await;
		Mock::given(method("DELETE"))
			.and(path("/announce/relay-a/live/s1"))
			.respond_with(ResponseTemplate::new(404))
			.mount(&server)
			.await;

		let client = AnnounceClient::new(server.uri().parse().unwrap(), "relay-a".to_string(), Duration::from_secs(30));
		// Must not panic or log as an error path the caller needs to handle; a 404 on delete
		// means "already gone", which is the desired end state.
		client.deregister(&PathOwned::new("/live/s1")).await;
	}

	#[tokio::test]
	async fn lookup_parses_relay_list() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/announce/lookup"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"broadcast_path": "/live/s1",
				"relays": ["relay-a", "relay-b"],
			})))
			.mount(&server)
			.await;

		let client = AnnounceClient::new(server.uri().parse().unwrap(), "relay-a".to_string(), Duration::from_secs(30));
		let relays = client.lookup("/live/s1").await.unwrap();
		assert_eq!(relays, vec!["relay-a".to_string(), "relay-b".to_string()]);
	}

	#[tokio::test]
	async fn heartbeat_loop_re_puts_every_tracked_path_on_each_tick() {
		let server = MockServer::start().await;
		Mock::given(method("PUT"))
			.and(path("/announce/relay-a/live/s1"))
			.respond_with(ResponseTemplate::new(200))
			.mount(&server)
			.await;

		let client = AnnounceClient::new(server.uri().parse().unwrap(), "relay-a".to_string(), Duration::from_millis(10));
		client.register(PathOwned::new("/live/s1")).await;

		let cancel = CancellationToken::new();
		let loop_cancel = cancel.clone();
		let handle = tokio::spawn(async move { client.heartbeat_loop(loop_cancel).await });

		tokio::time::sleep(Duration::from_millis(50)).await;
		cancel.cancel();
		handle.await.unwrap();

		let requests = server.received_requests().await.unwrap();
		assert!(requests.len() >= 2, "expected at least the initial register plus one heartbeat tick");
	}
}
