use std::{collections::HashMap, fs, net::SocketAddr, path::Path};

use moq_relay_core::{pool::DEFAULT_NEW_FRAME_CAPACITY, ring::DEFAULT_GROUP_CACHE_SIZE};
use serde::Deserialize;

/// On-disk configuration for the relay binary (TOML). See [`crate::config::Cli`] for the
/// command-line overlay.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	/// Address the relay's HTTPS listener binds to.
	pub address: SocketAddr,

	pub tls: Tls,

	/// Name this relay is known by, both locally (logs) and to the SDN.
	pub node_id: String,

	#[serde(default)]
	pub region: Option<String>,

	#[serde(default = "default_group_cache_size")]
	pub group_cache_size: usize,

	#[serde(default = "default_frame_capacity")]
	pub frame_capacity: usize,

	#[serde(default)]
	pub sdn: Option<Sdn>,

	#[serde(default)]
	pub log: moq_native::log::Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tls {
	pub cert: std::path::PathBuf,
	pub key: std::path::PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sdn {
	/// Base URL of the SDN controller, e.g. `http://sdn.internal:8090`.
	pub url: url::Url,

	/// Name this relay registers itself under (defaults to `node_id` if omitted).
	#[serde(default)]
	pub relay_name: Option<String>,

	#[serde(default = "default_heartbeat_interval_sec")]
	pub heartbeat_interval_sec: u64,

	/// MoQ endpoint address advertised to other relays as this node's reachable address.
	#[serde(default)]
	pub address: Option<String>,

	#[serde(default)]
	pub neighbors: HashMap<String, i64>,

	#[serde(default)]
	pub tls_client: Option<SdnTlsClient>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SdnTlsClient {
	#[serde(default)]
	pub ca: Option<std::path::PathBuf>,
}

fn default_group_cache_size() -> usize {
	DEFAULT_GROUP_CACHE_SIZE
}

fn default_frame_capacity() -> usize {
	DEFAULT_NEW_FRAME_CAPACITY
}

fn default_heartbeat_interval_sec() -> u64 {
	30
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
		if self.node_id.trim().is_empty() {
			anyhow::bail!("node_id must be non-empty");
		}
		if self.group_cache_size == 0 {
			anyhow::bail!("group_cache_size must be > 0");
		}
		if self.frame_capacity == 0 {
			anyhow::bail!("frame_capacity must be > 0");
		}
		if let Some(sdn) = &self.sdn {
			if sdn.heartbeat_interval_sec == 0 {
				anyhow::bail!("sdn.heartbeat_interval_sec must be > 0");
			}
		}
		Ok(())
	}

	pub fn relay_name(&self) -> &str {
		self.sdn
			.as_ref()
			.and_then(|sdn| sdn.relay_name.as_deref())
			.unwrap_or(&self.node_id)
	}
}

/// Command-line overlay: always names a config file; every other flag is an override applied
/// on top of it.
#[derive(clap::Parser, Debug)]
#[command(name = "moq-relay")]
pub struct Cli {
	/// Path to the relay's TOML configuration file.
	#[arg(long, default_value = "moq-relay.toml")]
	pub config: std::path::PathBuf,
}
