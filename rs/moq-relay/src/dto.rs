//! JSON shapes mirroring the SDN's HTTP API (spec section "SDN HTTP API"). Kept local to the
//! relay crate rather than shared with `moq-sdn`, since the two services only ever talk over
//! the wire, never share Rust types directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RelayRegistration {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub region: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	pub neighbors: HashMap<String, i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteResult {
	pub from: String,
	pub to: String,
	pub next_hop: String,
	#[serde(default)]
	pub next_hop_address: Option<String>,
	pub full_path: Vec<String>,
	pub cost: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnounceEntryDto {
	pub relay: String,
	pub broadcast_path: String,
	pub expires_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnounceListResponse {
	pub entries: Vec<AnnounceEntryDto>,
	#[allow(dead_code)]
	pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnounceLookupResponse {
	#[allow(dead_code)]
	pub broadcast_path: String,
	pub relays: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
	#[allow(dead_code)]
	pub status: String,
}
