use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch. Millisecond resolution (rather than seconds) so tests can
/// exercise sub-second TTLs without waiting a full second.
pub type Timestamp = i64;

/// A directed edge to another node, with a strictly-positive cost (spec §3: "0 and negative
/// values are replaced with 1").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
	pub to: String,
	pub cost: i64,
}

/// One relay in the topology.
///
/// A node named only as another node's neighbor — never itself the subject of a `Register` — is
/// a "stub": `last_seen == 0`, no edges of its own, exempt from TTL sweeping (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	#[serde(default)]
	pub edges: Vec<Edge>,
	#[serde(default)]
	pub last_seen: Timestamp,
}

impl Node {
	pub fn stub(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			region: None,
			address: None,
			edges: Vec::new(),
			last_seen: 0,
		}
	}

	pub fn is_stub(&self) -> bool {
		self.last_seen == 0
	}
}

/// In-memory directed adjacency-list graph, keyed by node id. Cloning a `Graph` is always a deep
/// copy: every field on [`Node`] and [`Edge`] is owned, so there is nothing to share.
pub type Graph = HashMap<String, Node>;
