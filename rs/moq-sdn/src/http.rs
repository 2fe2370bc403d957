//! The SDN's RESTful surface (spec §6.2): relay registration, routing queries, announce CRUD,
//! and active/standby graph sync.

use std::sync::Arc;

use axum::{
	extract::{Path, Query, State},
	http::StatusCode,
	response::IntoResponse,
	routing::{get, put},
	Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
	announce::AnnounceTable,
	dto::{
		AnnounceEntryDto, AnnounceListResponse, AnnounceLookupResponse, GraphResponse, MatrixResponse,
		RelayRegistrationRequest, RelayRegistrationResponse, StatusMessage,
	},
	router::RouterError,
	topology::{NodeRegistration, Topology},
};

#[derive(Clone)]
pub struct AppState {
	pub topology: Arc<Topology>,
	pub announces: Arc<AnnounceTable>,
}

pub enum ApiError {
	BadRequest(String),
	NotFound(String),
}

impl IntoResponse for ApiError {
	fn into_response(self) -> axum::response::Response {
		let (status, message) = match self {
			ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
			ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
		};
		(status, Json(serde_json::json!({ "error": message }))).into_response()
	}
}

impl From<RouterError> for ApiError {
	fn from(err: RouterError) -> Self {
		match err {
			RouterError::NodeNotFound(node) => ApiError::NotFound(format!("node not found: {node}")),
			RouterError::NoPath { from, to } => ApiError::NotFound(format!("no path from {from} to {to}")),
		}
	}
}

async fn put_relay(
	State(state): State<AppState>,
	Path(name): Path<String>,
	body: axum::body::Bytes,
) -> Result<Json<RelayRegistrationResponse>, ApiError> {
	if name.trim().is_empty() {
		return Err(ApiError::BadRequest("relay name must be non-empty".to_string()));
	}
	let request: RelayRegistrationRequest = if body.is_empty() {
		RelayRegistrationRequest::default()
	} else {
		serde_json::from_slice(&body).map_err(|err| ApiError::BadRequest(format!("invalid JSON body: {err}")))?
	};

	state.topology.register(
		&name,
		NodeRegistration {
			region: request.region,
			address: request.address,
			neighbors: request.neighbors,
		},
	);

	Ok(Json(RelayRegistrationResponse { status: "registered", relay: name }))
}

async fn delete_relay(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<StatusMessage>, ApiError> {
	if state.topology.deregister(&name) {
		state.announces.deregister_relay(&name);
		Ok(Json(StatusMessage { status: "deregistered" }))
	} else {
		Err(ApiError::NotFound(format!("relay not found: {name}")))
	}
}

#[derive(Debug, Deserialize)]
struct RouteQuery {
	from: Option<String>,
	to: Option<String>,
}

async fn get_route(
	State(state): State<AppState>,
	Query(query): Query<RouteQuery>,
) -> Result<Json<crate::topology::RouteResult>, ApiError> {
	let (from, to) = match (query.from, query.to) {
		(Some(from), Some(to)) => (from, to),
		_ => return Err(ApiError::BadRequest("missing `from` and/or `to` query parameter".to_string())),
	};
	let route = state.topology.route(&from, &to)?;
	Ok(Json(route))
}

async fn get_graph(State(state): State<AppState>) -> Json<GraphResponse> {
	Json(GraphResponse::from_graph(&state.topology.snapshot()))
}

async fn get_graph_matrix(State(state): State<AppState>) -> Json<MatrixResponse> {
	Json(MatrixResponse::from_graph(&state.topology.snapshot()))
}

/// Reassemble the `/*broadcast_path` wildcard capture into a leading-`/` broadcast path.
fn normalize_broadcast_path(captured: &str) -> String {
	format!("/{}", captured.trim_start_matches('/'))
}

async fn put_announce(
	State(state): State<AppState>,
	Path((relay, broadcast_path)): Path<(String, String)>,
	_body: Option<Json<serde_json::Value>>,
) -> Result<Json<StatusMessage>, ApiError> {
	if relay.trim().is_empty() || broadcast_path.trim().is_empty() {
		return Err(ApiError::BadRequest("relay and broadcast_path must be non-empty".to_string()));
	}
	state.announces.register(&relay, &normalize_broadcast_path(&broadcast_path));
	Ok(Json(StatusMessage { status: "registered" }))
}

async fn delete_announce(
	State(state): State<AppState>,
	Path((relay, broadcast_path)): Path<(String, String)>,
) -> Result<Json<StatusMessage>, ApiError> {
	let path = normalize_broadcast_path(&broadcast_path);
	if state.announces.deregister(&relay, &path) {
		Ok(Json(StatusMessage { status: "deregistered" }))
	} else {
		Err(ApiError::NotFound(format!("no announce entry for {relay} / {path}")))
	}
}

#[derive(Debug, Deserialize)]
struct LookupQuery {
	broadcast_path: Option<String>,
}

async fn lookup_announce(
	State(state): State<AppState>,
	Query(query): Query<LookupQuery>,
) -> Result<Json<AnnounceLookupResponse>, ApiError> {
	let Some(broadcast_path) = query.broadcast_path else {
		return Err(ApiError::BadRequest("missing `broadcast_path` query parameter".to_string()));
	};
	let relays = state.announces.lookup(&broadcast_path).into_iter().map(|entry| entry.relay).collect();
	Ok(Json(AnnounceLookupResponse { broadcast_path, relays }))
}

async fn list_announce(State(state): State<AppState>) -> Json<AnnounceListResponse> {
	let entries: Vec<AnnounceEntryDto> = state.announces.all().into_iter().map(Into::into).collect();
	let count = entries.len();
	Json(AnnounceListResponse { entries, count })
}

async fn get_sync(State(state): State<AppState>) -> Json<GraphResponse> {
	Json(GraphResponse::from_graph(&state.topology.snapshot()))
}

#[derive(Debug, Serialize)]
struct SyncResponse {
	status: &'static str,
	nodes: usize,
}

async fn put_sync(State(state): State<AppState>, Json(body): Json<GraphResponse>) -> Json<SyncResponse> {
	let graph = body.into_graph();
	let nodes = graph.len();
	state.topology.restore(graph);
	Json(SyncResponse { status: "synced", nodes })
}

async fn health() -> Json<StatusMessage> {
	Json(StatusMessage { status: "ok" })
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/relay/{name}", put(put_relay).delete(delete_relay))
		.route("/route", get(get_route))
		.route("/graph", get(get_graph))
		.route("/graph/matrix", get(get_graph_matrix))
		.route("/announce/{relay}/{*broadcast_path}", put(put_announce).delete(delete_announce))
		.route("/announce/lookup", get(lookup_announce))
		.route("/announce", get(list_announce))
		.route("/sync", get(get_sync).put(put_sync))
		.route("/health", get(health))
		.with_state(state)
}
