use std::{collections::HashMap, sync::Arc, time::Duration};

use clap::Parser;
use moq_relay::{
	announce::AnnounceClient,
	config::{Cli, Config},
	dto::RelayRegistration,
	fetcher::RemoteFetcher,
	http,
	server::RelayServer,
	transport::Unconfigured,
};
use moq_relay_core::{mux::TrackMux, pool::FramePool};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let config = Config::from_file(&cli.config)?;
	config.log.init();

	let tls = moq_native::Tls {
		cert: config.tls.cert.clone(),
		key: config.tls.key.clone(),
	};
	// Starting the relay with unusable TLS material is a configuration error, not a runtime one.
	let rustls_config = tls.load().await.expect("loading TLS material for relay listener");

	let frame_pool = Arc::new(FramePool::new(config.frame_capacity));
	let mux = Arc::new(TrackMux::new());
	let cancel = CancellationToken::new();

	let announce_client = match &config.sdn {
		Some(sdn) => {
			let client = Arc::new(AnnounceClient::new(
				sdn.url.clone(),
				config.relay_name().to_string(),
				Duration::from_secs(sdn.heartbeat_interval_sec),
			));

			register_with_sdn(&config).await;

			let heartbeat_client = client.clone();
			let heartbeat_cancel = cancel.clone();
			tokio::spawn(async move { heartbeat_client.heartbeat_loop(heartbeat_cancel).await });

			Some(client)
		}
		None => None,
	};

	let server = Arc::new(RelayServer::new(
		mux.clone(),
		announce_client.clone(),
		frame_pool.clone(),
		config.group_cache_size,
	));

	if let Some(announce_client) = announce_client.clone() {
		let fetcher = Arc::new(RemoteFetcher::new(
			announce_client,
			mux.clone(),
			Arc::new(Unconfigured),
			config.relay_name().to_string(),
			config.group_cache_size,
			frame_pool.clone(),
		));
		let fetcher_cancel = cancel.clone();
		tokio::spawn(async move { fetcher.run(fetcher_cancel).await });
	}

	let health_router = http::router(server.clone());

	tracing::info!(addr = %config.address, node_id = %config.node_id, "moq-relay starting");
	notify_systemd_ready();

	tokio::select! {
		result = axum_server::bind_rustls(config.address, rustls_config).serve(health_router.into_make_service()) => {
			if let Err(err) = result {
				tracing::error!(%err, "relay HTTP surface exited");
			}
		}
		_ = server.clone().listen_and_serve(Unconfigured, cancel.clone()) => {}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutdown signal received");
		}
	}

	notify_systemd_stopping();
	cancel.cancel();
	if let Some(announce_client) = &announce_client {
		announce_client.shutdown().await;
	}
	server.shutdown(Duration::from_secs(5)).await;

	Ok(())
}

/// Tell systemd (if we were started as a `Type=notify` unit) that startup finished. A no-op
/// outside systemd, since `sd_notify` only sends when `$NOTIFY_SOCKET` is set.
#[cfg(unix)]
fn notify_systemd_ready() {
	if let Err(err) = sd_notify::notify(false, &[sd_notify::NotifyState::Ready]) {
		tracing::debug!(%err, "sd_notify READY failed (not running under systemd?)");
	}
}

#[cfg(not(unix))]
fn notify_systemd_ready() {}

#[cfg(unix)]
fn notify_systemd_stopping() {
	if let Err(err) = sd_notify::notify(false, &[sd_notify::NotifyState::Stopping]) {
		tracing::debug!(%err, "sd_notify STOPPING failed (not running under systemd?)");
	}
}

#[cfg(not(unix))]
fn notify_systemd_stopping() {}

/// One-shot `PUT /relay/<name>` against the configured SDN, advertising this relay's
/// reachability and neighbor costs before the heartbeat loop takes over.
async fn register_with_sdn(config: &Config) {
	let Some(sdn) = &config.sdn else { return };

	let registration = RelayRegistration {
		region: config.region.clone(),
		address: sdn.address.clone(),
		neighbors: sdn.neighbors.iter().map(|(name, cost)| (name.clone(), *cost)).collect::<HashMap<_, _>>(),
	};

	let url = match sdn.url.join(&format!("relay/{}", config.relay_name())) {
		Ok(url) => url,
		Err(err) => {
			tracing::warn!(%err, "could not build SDN relay registration URL");
			return;
		}
	};

	let client = reqwest::Client::new();
	if let Err(err) = client.put(url).json(&registration).send().await {
		tracing::warn!(%err, "initial SDN relay registration failed");
	}
}
