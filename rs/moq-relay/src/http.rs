//! Relay HTTP surface (spec §6.3): a small observability endpoint alongside the media
//! transport. Served over the same TLS materials as the relay itself via `axum-server`.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::server::{Health, RelayServer};

#[derive(Debug, Default, Deserialize)]
pub struct HealthQuery {
	probe: Option<String>,
}

#[derive(Debug, Serialize)]
struct LiveResponse {
	status: &'static str,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
	ready: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	reason: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
	active_connections: i64,
	uptime_secs: u64,
	status: &'static str,
}

fn health_name(health: Health) -> &'static str {
	match health {
		Health::Healthy => "healthy",
		Health::Degraded => "degraded",
		Health::Unhealthy => "unhealthy",
	}
}

/// `GET /health` (and, transparently, `HEAD /health`): `probe=live` is a liveness check that
/// never fails, `probe=ready` additionally checks internal invariants, and no probe returns the
/// full status snapshot.
async fn health(State(server): State<Arc<RelayServer>>, query: axum::extract::Query<HealthQuery>) -> impl IntoResponse {
	match query.0.probe.as_deref() {
		Some("live") => (StatusCode::OK, Json(LiveResponse { status: "alive" })).into_response(),
		Some("ready") => {
			let status = server.status();
			if status.active_connections < 0 {
				(
					StatusCode::SERVICE_UNAVAILABLE,
					Json(ReadyResponse {
						ready: false,
						reason: Some("invalid_connection_state"),
					}),
				)
					.into_response()
			} else {
				(StatusCode::OK, Json(ReadyResponse { ready: true, reason: None })).into_response()
			}
		}
		_ => {
			let status = server.status();
			(
				StatusCode::OK,
				Json(StatusResponse {
					active_connections: status.active_connections,
					uptime_secs: status.uptime.as_secs(),
					status: health_name(status.health),
				}),
			)
				.into_response()
		}
	}
}

/// Build the relay's observability router; `get` handlers transparently answer `HEAD` too, and
/// any other method on `/health` falls through to axum's default `405 Method Not Allowed`.
pub fn router(server: Arc<RelayServer>) -> Router {
	Router::new().route("/health", get(health)).with_state(server)
}
