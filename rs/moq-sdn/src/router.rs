//! Dijkstra shortest-path routing over a [`Graph`] snapshot (spec §4.7).

use std::{
	cmp::Ordering,
	collections::{BinaryHeap, HashMap},
};

use serde::Serialize;

use crate::graph::Graph;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
	#[error("node not found: {0}")]
	NodeNotFound(String),
	#[error("no path from {from} to {to}")]
	NoPath { from: String, to: String },
}

/// `next_hop = full_path[1]` when `full_path.len() >= 2`, else `from` (a self-route).
#[derive(Debug, Clone, Serialize)]
pub struct Route {
	pub from: String,
	pub to: String,
	pub next_hop: String,
	pub full_path: Vec<String>,
	pub cost: i64,
}

/// Min-heap entry. Ties on cost are broken lexicographically on node id (smaller id wins),
/// which makes the algorithm deterministic across repeated calls on an unchanged graph — see
/// spec §9, "Tie-breaking in Dijkstra".
#[derive(Debug, PartialEq, Eq)]
struct HeapEntry {
	cost: i64,
	node: String,
}

impl Ord for HeapEntry {
	fn cmp(&self, other: &Self) -> Ordering {
		other.cost.cmp(&self.cost).then_with(|| other.node.cmp(&self.node))
	}
}

impl PartialOrd for HeapEntry {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

/// Shortest path from `from` to `to` over `graph`. `route(a, a)` is the trivial zero-cost path.
pub fn route(graph: &Graph, from: &str, to: &str) -> Result<Route, RouterError> {
	if !graph.contains_key(from) {
		return Err(RouterError::NodeNotFound(from.to_string()));
	}
	if !graph.contains_key(to) {
		return Err(RouterError::NodeNotFound(to.to_string()));
	}

	if from == to {
		return Ok(Route {
			from: from.to_string(),
			to: to.to_string(),
			next_hop: from.to_string(),
			full_path: vec![from.to_string()],
			cost: 0,
		});
	}

	let mut dist: HashMap<String, i64> = HashMap::new();
	let mut prev: HashMap<String, String> = HashMap::new();
	let mut heap = BinaryHeap::new();

	dist.insert(from.to_string(), 0);
	heap.push(HeapEntry { cost: 0, node: from.to_string() });

	while let Some(HeapEntry { cost, node }) = heap.pop() {
		if node == to {
			break;
		}
		if cost > *dist.get(&node).unwrap_or(&i64::MAX) {
			continue; // stale heap entry, a cheaper path to `node` was already settled
		}

		let Some(current) = graph.get(&node) else { continue };
		for edge in &current.edges {
			let next_cost = cost + edge.cost;
			let is_better = dist.get(&edge.to).map_or(true, |&known| next_cost < known);
			if is_better {
				dist.insert(edge.to.clone(), next_cost);
				prev.insert(edge.to.clone(), node.clone());
				heap.push(HeapEntry { cost: next_cost, node: edge.to.clone() });
			}
		}
	}

	let Some(&total_cost) = dist.get(to) else {
		return Err(RouterError::NoPath { from: from.to_string(), to: to.to_string() });
	};

	let mut full_path = vec![to.to_string()];
	let mut cursor = to.to_string();
	while cursor != from {
		let parent = prev.get(&cursor).expect("settled node must have a predecessor back to `from`");
		full_path.push(parent.clone());
		cursor = parent.clone();
	}
	full_path.reverse();

	let next_hop = if full_path.len() >= 2 { full_path[1].clone() } else { from.to_string() };

	Ok(Route {
		from: from.to_string(),
		to: to.to_string(),
		next_hop,
		full_path,
		cost: total_cost,
	})
}

#[cfg(test)]
mod tests {
	use crate::graph::{Edge, Node};

	use super::*;

	fn node(id: &str, edges: &[(&str, i64)]) -> (String, Node) {
		(
			id.to_string(),
			Node {
				id: id.to_string(),
				region: None,
				address: None,
				edges: edges.iter().map(|(to, cost)| Edge { to: to.to_string(), cost: *cost }).collect(),
				last_seen: 1,
			},
		)
	}

	#[test]
	fn linear_route() {
		let graph: Graph = [node("A", &[("B", 1)]), node("B", &[("C", 1)]), node("C", &[])].into_iter().collect();

		let route = route(&graph, "A", "C").unwrap();
		assert_eq!(route.next_hop, "B");
		assert_eq!(route.full_path, vec!["A", "B", "C"]);
		assert_eq!(route.cost, 2);
	}

	#[test]
	fn weighted_prefers_cheaper_path() {
		let graph: Graph = [node("A", &[("B", 10), ("C", 3)]), node("C", &[("B", 2)]), node("B", &[])]
			.into_iter()
			.collect();

		let route = route(&graph, "A", "B").unwrap();
		assert_eq!(route.next_hop, "C");
		assert_eq!(route.full_path, vec!["A", "C", "B"]);
		assert_eq!(route.cost, 5);
	}

	#[test]
	fn unreachable_is_no_path() {
		let graph: Graph = [node("A", &[]), node("B", &[])].into_iter().collect();
		assert!(matches!(route(&graph, "A", "B"), Err(RouterError::NoPath { .. })));
	}

	#[test]
	fn unknown_endpoint_is_node_not_found() {
		let graph: Graph = [node("A", &[])].into_iter().collect();
		assert!(matches!(route(&graph, "A", "Z"), Err(RouterError::NodeNotFound(_))));
		assert!(matches!(route(&graph, "Z", "A"), Err(RouterError::NodeNotFound(_))));
	}

	#[test]
	fn self_route_is_trivial() {
		let graph: Graph = [node("A", &[])].into_iter().collect();
		let route = route(&graph, "A", "A").unwrap();
		assert_eq!(route.full_path, vec!["A"]);
		assert_eq!(route.cost, 0);
		assert_eq!(route.next_hop, "A");
	}

	#[test]
	fn diamond_tie_break_is_deterministic_across_repeated_calls() {
		// A -> B (cost 1), A -> C (cost 1), B -> D (cost 1), C -> D (cost 1): symmetric diamond,
		// either B or C is an equally valid next hop. We pick the lexicographically smaller id.
		let graph: Graph = [
			node("A", &[("B", 1), ("C", 1)]),
			node("B", &[("D", 1)]),
			node("C", &[("D", 1)]),
			node("D", &[]),
		]
		.into_iter()
		.collect();

		let first = route(&graph, "A", "D").unwrap();
		let second = route(&graph, "A", "D").unwrap();
		assert_eq!(first.next_hop, second.next_hop);
		assert_eq!(first.next_hop, "B");
		assert_eq!(first.cost, 2);
	}

	#[test]
	fn round_trip_cost_matches_path_sum() {
		let graph: Graph = [
			node("A", &[("B", 4), ("C", 1)]),
			node("C", &[("B", 1), ("D", 5)]),
			node("B", &[("D", 1)]),
			node("D", &[]),
		]
		.into_iter()
		.collect();

		let route = route(&graph, "A", "D").unwrap();
		assert_eq!(route.full_path.first().unwrap(), "A");
		assert_eq!(route.full_path.last().unwrap(), "D");

		let mut sum = 0;
		for window in route.full_path.windows(2) {
			let from = graph.get(&window[0]).unwrap();
			let edge = from.edges.iter().find(|e| e.to == window[1]).unwrap();
			sum += edge.cost;
		}
		assert_eq!(sum, route.cost);
	}
}
