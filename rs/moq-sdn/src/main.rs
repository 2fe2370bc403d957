use std::{sync::Arc, time::Duration};

use clap::Parser;
use moq_sdn::{
	announce::AnnounceTable,
	config::{Cli, Config},
	http::{self, AppState},
	peer_sync::PeerSyncer,
	store::JsonFileStore,
	topology::Topology,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();
	let config = Config::from_file(&cli.config)?;
	config.log.init();

	let node_ttl = Duration::from_secs(config.node_ttl_sec);
	let topology = match &config.data_dir {
		Some(dir) => {
			let store = Arc::new(JsonFileStore::new(dir.join("topology.json")));
			Arc::new(Topology::with_store(store, node_ttl)?)
		}
		None => Arc::new(Topology::new(node_ttl)),
	};

	let announces = Arc::new(AnnounceTable::new(Duration::from_secs(config.announce_ttl_sec)));

	let cancel = CancellationToken::new();

	let sweep_announces = announces.clone();
	topology.start_sweeper(cancel.clone(), Duration::from_secs(5), move |removed| {
		for relay in removed {
			let deregistered = sweep_announces.deregister_relay(&relay);
			if deregistered > 0 {
				tracing::info!(relay, deregistered, "cascaded stale relay eviction into announce table");
			}
		}
	});
	announces.start_sweeper(cancel.clone(), Duration::from_secs(5));

	if let Some(peer_url) = config.peer_url.clone() {
		let syncer = Arc::new(PeerSyncer::new(peer_url, topology.clone(), Duration::from_secs(config.sync_interval_sec)));
		let sync_cancel = cancel.clone();
		tokio::spawn(async move { syncer.run(sync_cancel).await });
	}

	let state = AppState { topology, announces };
	let router = http::router(state);

	tracing::info!(addr = %config.listen_addr, "moq-sdn starting");

	let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
	axum::serve(listener, router.into_make_service())
		.with_graceful_shutdown(shutdown_signal(cancel.clone()))
		.await?;

	Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("shutdown signal received");
		}
		_ = cancel.cancelled() => {}
	}
	cancel.cancel();
}
