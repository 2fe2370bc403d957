//! Self-registering adjacency-list graph with TTL expiry (spec §4.6).

use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::{
	graph::{Edge, Graph, Node},
	router::{self, RouterError},
	store::Store,
	time::{self, Clock},
};

/// Request body for [`Topology::register`] (mirrors `PUT /relay/<name>`, spec §6.2).
#[derive(Debug, Clone, Default)]
pub struct NodeRegistration {
	pub region: Option<String>,
	pub address: Option<String>,
	pub neighbors: HashMap<String, i64>,
}

/// [`router::Route`] plus the next hop's advertised address, filled in by [`Topology::route`]
/// (the router itself only knows node ids, not addresses).
#[derive(Debug, Clone, Serialize)]
pub struct RouteResult {
	pub from: String,
	pub to: String,
	pub next_hop: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_hop_address: Option<String>,
	pub full_path: Vec<String>,
	pub cost: i64,
}

/// Owns the graph exclusively; every mutator takes the write lock, every reader (`route`,
/// `snapshot`) takes the read lock and only ever hands out deep copies (spec §5).
pub struct Topology {
	graph: RwLock<Graph>,
	store: Option<Arc<dyn Store>>,
	node_ttl: Duration,
	clock: Clock,
}

impl Topology {
	pub fn new(node_ttl: Duration) -> Self {
		Self {
			graph: RwLock::new(Graph::new()),
			store: None,
			node_ttl,
			clock: time::system_clock(),
		}
	}

	pub fn with_store(store: Arc<dyn Store>, node_ttl: Duration) -> anyhow::Result<Self> {
		let graph = store.load()?;
		Ok(Self {
			graph: RwLock::new(graph),
			store: Some(store),
			node_ttl,
			clock: time::system_clock(),
		})
	}

	#[cfg(test)]
	fn with_clock(node_ttl: Duration, clock: Clock) -> Self {
		Self {
			graph: RwLock::new(Graph::new()),
			store: None,
			node_ttl,
			clock,
		}
	}

	fn persist(&self, graph: &Graph) {
		if let Some(store) = &self.store {
			if let Err(err) = store.save(graph) {
				tracing::warn!(%err, "failed to persist topology snapshot");
			}
		}
	}

	/// Create-or-update a node: bump `last_seen`, apply `region`/`address` only if non-empty,
	/// and wholesale-replace its neighbor set. Any neighbor not already in the graph is created
	/// as a stub. Non-positive neighbor costs are coerced to 1.
	pub fn register(&self, name: &str, registration: NodeRegistration) {
		let mut graph = self.graph.write();
		let now = (self.clock)();

		let edges: Vec<Edge> = registration
			.neighbors
			.into_iter()
			.map(|(to, cost)| Edge { to, cost: if cost <= 0 { 1 } else { cost } })
			.collect();

		for edge in &edges {
			graph.entry(edge.to.clone()).or_insert_with(|| Node::stub(edge.to.clone()));
		}

		let node = graph.entry(name.to_string()).or_insert_with(|| Node::stub(name));
		node.last_seen = now;
		if let Some(region) = registration.region.filter(|s| !s.is_empty()) {
			node.region = Some(region);
		}
		if let Some(address) = registration.address.filter(|s| !s.is_empty()) {
			node.address = Some(address);
		}
		node.edges = edges;

		self.persist(&graph);
	}

	/// Remove `name` and every dangling edge pointing to it. Returns whether anything existed.
	pub fn deregister(&self, name: &str) -> bool {
		let mut graph = self.graph.write();
		let removed = graph.remove(name).is_some();
		if removed {
			for node in graph.values_mut() {
				node.edges.retain(|edge| edge.to != name);
			}
			self.persist(&graph);
		}
		removed
	}

	pub fn route(&self, from: &str, to: &str) -> Result<RouteResult, RouterError> {
		let graph = self.graph.read();
		let route = router::route(&graph, from, to)?;
		let next_hop_address = graph.get(&route.next_hop).and_then(|node| node.address.clone());
		Ok(RouteResult {
			from: route.from,
			to: route.to,
			next_hop: route.next_hop,
			next_hop_address,
			full_path: route.full_path,
			cost: route.cost,
		})
	}

	/// Deep copy of the current graph.
	pub fn snapshot(&self) -> Graph {
		self.graph.read().clone()
	}

	/// Atomic whole-graph replacement, used by the peer syncer.
	pub fn restore(&self, graph: Graph) {
		let mut current = self.graph.write();
		*current = graph;
		self.persist(&current);
	}

	/// Remove every node whose `last_seen` is non-zero and older than `node_ttl`; stub nodes
	/// (`last_seen == 0`) are preserved. Returns the removed node ids. No-op when
	/// `node_ttl == Duration::ZERO` (never expire).
	pub fn sweep_stale_nodes(&self) -> Vec<String> {
		if self.node_ttl.is_zero() {
			return Vec::new();
		}

		let mut graph = self.graph.write();
		let now = (self.clock)();
		let ttl_millis = self.node_ttl.as_millis() as i64;

		let stale: Vec<String> = graph
			.values()
			.filter(|node| node.last_seen != 0 && now - node.last_seen > ttl_millis)
			.map(|node| node.id.clone())
			.collect();

		for id in &stale {
			graph.remove(id);
		}
		for node in graph.values_mut() {
			node.edges.retain(|edge| !stale.contains(&edge.to));
		}

		if !stale.is_empty() {
			self.persist(&graph);
		}

		stale
	}

	/// Background ticker; no-op when `node_ttl == Duration::ZERO`. `on_removed` is invoked with
	/// the ids swept on each tick that actually removed something — the caller (see `moq-sdn`'s
	/// `main`) uses this to cascade into `AnnounceTable::deregister_relay` (spec §9 open
	/// question, resolved: yes, cascade).
	pub fn start_sweeper(
		self: &Arc<Self>,
		cancel: CancellationToken,
		interval: Duration,
		on_removed: impl Fn(Vec<String>) + Send + Sync + 'static,
	) -> tokio::task::JoinHandle<()> {
		let this = self.clone();
		tokio::spawn(async move {
			if this.node_ttl.is_zero() {
				return;
			}
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let removed = this.sweep_stale_nodes();
						if !removed.is_empty() {
							on_removed(removed);
						}
					}
					_ = cancel.cancelled() => return,
				}
			}
		})
	}
}
