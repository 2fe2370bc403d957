use std::{fs, net::SocketAddr, path::Path, path::PathBuf};

use serde::Deserialize;

/// On-disk configuration for the SDN binary (TOML). See [`Cli`] for the command-line overlay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Address the SDN's plain-HTTP listener binds to. No TLS: the SDN is expected to sit on a
	/// private control-plane network, unlike the relay's public-facing listener.
	#[serde(default = "default_listen_addr")]
	pub listen_addr: SocketAddr,

	/// Where to persist the topology graph as JSON. Omit to run in-memory only.
	#[serde(default)]
	pub data_dir: Option<PathBuf>,

	/// Base URL of a peer SDN to pull topology snapshots from (active/standby sync, spec §4.9).
	#[serde(default)]
	pub peer_url: Option<url::Url>,

	#[serde(default = "default_sync_interval_sec")]
	pub sync_interval_sec: u64,

	#[serde(default = "default_node_ttl_sec")]
	pub node_ttl_sec: u64,

	/// TTL applied to announce-table entries. Defaults to [`default_node_ttl_sec`]'s value: an
	/// announce entry shouldn't outlive the relay that made it by much more than the relay's own
	/// heartbeat window.
	#[serde(default = "default_announce_ttl_sec")]
	pub announce_ttl_sec: u64,

	#[serde(default)]
	pub log: moq_native::log::Log,
}

fn default_listen_addr() -> SocketAddr {
	"0.0.0.0:8090".parse().expect("valid default listen address")
}

fn default_sync_interval_sec() -> u64 {
	10
}

fn default_node_ttl_sec() -> u64 {
	90
}

fn default_announce_ttl_sec() -> u64 {
	90
}

impl Config {
	pub fn from_file(path: &Path) -> anyhow::Result<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| anyhow::anyhow!("reading config file {}: {err}", path.display()))?;
		let config: Config = toml::from_str(&raw)
			.map_err(|err| anyhow::anyhow!("parsing config file {}: {err}", path.display()))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> anyhow::Result<()> {
		if self.sync_interval_sec == 0 {
			anyhow::bail!("sync_interval_sec must be > 0");
		}
		Ok(())
	}
}

impl Default for Config {
	fn default() -> Self {
		Self {
			listen_addr: default_listen_addr(),
			data_dir: None,
			peer_url: None,
			sync_interval_sec: default_sync_interval_sec(),
			node_ttl_sec: default_node_ttl_sec(),
			announce_ttl_sec: default_announce_ttl_sec(),
			log: moq_native::log::Log::default(),
		}
	}
}

/// Command-line overlay: always names a config file; every other flag is an override applied
/// on top of it.
#[derive(clap::Parser, Debug)]
#[command(name = "moq-sdn")]
pub struct Cli {
	/// Path to the SDN's TOML configuration file.
	#[arg(long, default_value = "moq-sdn.toml")]
	pub config: PathBuf,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_sane() {
		let config = Config::default();
		assert_eq!(config.listen_addr.port(), 8090);
		assert_eq!(config.sync_interval_sec, 10);
		assert_eq!(config.node_ttl_sec, 90);
		assert!(config.data_dir.is_none());
		assert!(config.peer_url.is_none());
	}

	#[test]
	fn zero_sync_interval_fails_validation() {
		let config = Config { sync_interval_sec: 0, ..Config::default() };
		assert!(config.validate().is_err());
	}
}
