//! JSON shapes for the SDN HTTP API (spec §6.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Graph, Node};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RelayRegistrationRequest {
	#[serde(default)]
	pub region: Option<String>,
	#[serde(default)]
	pub address: Option<String>,
	#[serde(default)]
	pub neighbors: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayRegistrationResponse {
	pub status: &'static str,
	pub relay: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
	pub status: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
}

/// `{nodes:[{id, region, address?}], adjacency:{src:{dst:cost}}}` (spec §6.2). Doubles as the
/// `GET /sync` / `PUT /sync` wire format: [`Self::into_graph`] reconstructs a [`Graph`] from it,
/// with every node coming back as a stub (`last_seen == 0`) since `last_seen` isn't part of this
/// shape — matching how [`crate::store::JsonFileStore`] treats its own on-disk format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GraphResponse {
	pub nodes: Vec<GraphNode>,
	pub adjacency: HashMap<String, HashMap<String, i64>>,
}

impl GraphResponse {
	pub fn from_graph(graph: &Graph) -> Self {
		let mut nodes: Vec<GraphNode> = graph
			.values()
			.map(|node| GraphNode {
				id: node.id.clone(),
				region: node.region.clone(),
				address: node.address.clone(),
			})
			.collect();
		nodes.sort_by(|a, b| a.id.cmp(&b.id));

		let adjacency = graph
			.values()
			.map(|node| (node.id.clone(), node.edges.iter().map(|edge| (edge.to.clone(), edge.cost)).collect()))
			.collect();

		Self { nodes, adjacency }
	}

	pub fn into_graph(self) -> Graph {
		let mut graph: Graph = self
			.nodes
			.into_iter()
			.map(|node| {
				(
					node.id.clone(),
					Node {
						id: node.id,
						region: node.region,
						address: node.address,
						edges: Vec::new(),
						last_seen: 0,
					},
				)
			})
			.collect();

		for (src, dsts) in self.adjacency {
			let edges: Vec<Edge> = dsts.into_iter().map(|(to, cost)| Edge { to, cost }).collect();
			graph.entry(src.clone()).or_insert_with(|| Node::stub(src)).edges = edges;
		}

		graph
	}
}

/// `GET /graph/matrix`: sorted node ids plus a dense cost matrix (`0` = no edge).
#[derive(Debug, Clone, Serialize)]
pub struct MatrixResponse {
	pub node_ids: Vec<String>,
	pub costs: Vec<Vec<i64>>,
}

impl MatrixResponse {
	pub fn from_graph(graph: &Graph) -> Self {
		let mut node_ids: Vec<String> = graph.keys().cloned().collect();
		node_ids.sort();

		let costs = node_ids
			.iter()
			.map(|from| {
				node_ids
					.iter()
					.map(|to| {
						graph
							.get(from)
							.and_then(|node| node.edges.iter().find(|edge| &edge.to == to))
							.map(|edge| edge.cost)
							.unwrap_or(0)
					})
					.collect()
			})
			.collect();

		Self { node_ids, costs }
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnounceEntryDto {
	pub relay: String,
	pub broadcast_path: String,
	pub expires_at: i64,
}

impl From<crate::announce::AnnounceEntry> for AnnounceEntryDto {
	fn from(entry: crate::announce::AnnounceEntry) -> Self {
		Self {
			relay: entry.relay,
			broadcast_path: entry.broadcast_path,
			expires_at: entry.expires_at,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnounceListResponse {
	pub entries: Vec<AnnounceEntryDto>,
	pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnounceLookupResponse {
	pub broadcast_path: String,
	pub relays: Vec<String>,
}

#[cfg(test)]
mod tests {
	use crate::graph::{Edge, Node};

	use super::*;

	#[test]
	fn graph_round_trips_through_response() {
		let mut graph = Graph::new();
		graph.insert(
			"A".to_string(),
			Node {
				id: "A".to_string(),
				region: Some("us".to_string()),
				address: Some("https://a:4443".to_string()),
				edges: vec![Edge { to: "B".to_string(), cost: 3 }],
				last_seen: 999,
			},
		);
		graph.insert("B".to_string(), Node::stub("B"));

		let response = GraphResponse::from_graph(&graph);
		assert_eq!(response.adjacency["A"]["B"], 3);

		let restored = response.into_graph();
		assert_eq!(restored["A"].region.as_deref(), Some("us"));
		assert_eq!(restored["A"].edges, vec![Edge { to: "B".to_string(), cost: 3 }]);
		assert_eq!(restored["A"].last_seen, 0);
	}

	#[test]
	fn matrix_is_dense_and_zero_for_missing_edges() {
		let mut graph = Graph::new();
		graph.insert("A".to_string(), Node { edges: vec![Edge { to: "B".to_string(), cost: 7 }], ..Node::stub("A") });
		graph.insert("B".to_string(), Node::stub("B"));

		let matrix = MatrixResponse::from_graph(&graph);
		assert_eq!(matrix.node_ids, vec!["A".to_string(), "B".to_string()]);
		assert_eq!(matrix.costs, vec![vec![0, 7], vec![0, 0]]);
	}
}
