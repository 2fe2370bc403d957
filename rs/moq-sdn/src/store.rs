//! Pluggable persistence for the topology graph (spec §4.6, §6.4).
//!
//! `save`/`load` are synchronous: [`crate::topology::Topology`] calls `save` while still holding
//! its write lock ("write-through"), so an async trait here would just force every mutator to be
//! async for no benefit — the graph is small control-plane state, not a hot data path.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Graph, Node};

pub trait Store: Send + Sync {
	fn save(&self, graph: &Graph) -> anyhow::Result<()>;

	/// A missing file is not an error: the caller starts with an empty graph (spec §6.4).
	fn load(&self) -> anyhow::Result<Graph>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEdge {
	to: String,
	cost: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedNode {
	id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	region: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	address: Option<String>,
	#[serde(default)]
	edges: Vec<PersistedEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedGraph {
	nodes: Vec<PersistedNode>,
}

/// JSON-on-disk [`Store`], written atomically (`path.tmp` then rename).
///
/// `last_seen` is deliberately not part of the on-disk shape (spec §6.4's documented layout
/// omits it): every node loaded from disk comes back as a stub (`last_seen == 0`), exempt from
/// TTL sweeping until it re-registers. This matches how a freshly-booted SDN treats any node it
/// only knows about as someone else's neighbor.
pub struct JsonFileStore {
	path: PathBuf,
}

impl JsonFileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

impl Store for JsonFileStore {
	fn save(&self, graph: &Graph) -> anyhow::Result<()> {
		let mut nodes: Vec<PersistedNode> = graph
			.values()
			.map(|node| PersistedNode {
				id: node.id.clone(),
				region: node.region.clone(),
				address: node.address.clone(),
				edges: node.edges.iter().map(|edge| PersistedEdge { to: edge.to.clone(), cost: edge.cost }).collect(),
			})
			.collect();
		nodes.sort_by(|a, b| a.id.cmp(&b.id));

		let json = serde_json::to_vec_pretty(&PersistedGraph { nodes })?;

		let tmp = self.path.with_extension("tmp");
		if let Some(parent) = self.path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(&tmp, &json)?;
		std::fs::rename(&tmp, &self.path)?;
		Ok(())
	}

	fn load(&self) -> anyhow::Result<Graph> {
		let bytes = match std::fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Graph::new()),
			Err(err) => return Err(err.into()),
		};

		let persisted: PersistedGraph = serde_json::from_slice(&bytes)?;
		Ok(persisted
			.nodes
			.into_iter()
			.map(|node| {
				(
					node.id.clone(),
					Node {
						id: node.id,
						region: node.region,
						address: node.address,
						edges: node.edges.into_iter().map(|edge| Edge { to: edge.to, cost: edge.cost }).collect(),
						last_seen: 0,
					},
				)
			})
			.collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_file_loads_empty() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("topology.json"));
		assert!(store.load().unwrap().is_empty());
	}

	#[test]
	fn round_trips_nodes_and_edges() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("topology.json"));

		let mut graph = Graph::new();
		graph.insert(
			"A".to_string(),
			Node {
				id: "A".to_string(),
				region: Some("us-east".to_string()),
				address: Some("https://a.example:4443".to_string()),
				edges: vec![Edge { to: "B".to_string(), cost: 5 }],
				last_seen: 123,
			},
		);
		graph.insert("B".to_string(), Node::stub("B"));

		store.save(&graph).unwrap();
		let loaded = store.load().unwrap();

		assert_eq!(loaded.len(), 2);
		let a = &loaded["A"];
		assert_eq!(a.region.as_deref(), Some("us-east"));
		assert_eq!(a.address.as_deref(), Some("https://a.example:4443"));
		assert_eq!(a.edges, vec![Edge { to: "B".to_string(), cost: 5 }]);
		assert_eq!(a.last_seen, 0, "last_seen is not persisted; reloaded nodes start as stubs");
	}

	#[test]
	fn save_is_atomic_no_tmp_left_behind() {
		let dir = tempfile::tempdir().unwrap();
		let store = JsonFileStore::new(dir.path().join("topology.json"));
		store.save(&Graph::new()).unwrap();
		assert!(!dir.path().join("topology.tmp").exists());
		assert!(dir.path().join("topology.json").exists());
	}
}
