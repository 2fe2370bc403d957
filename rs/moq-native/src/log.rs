use tracing_subscriber::EnvFilter;

/// Logging configuration shared by every binary in this workspace.
///
/// `level` is only a fallback: if `RUST_LOG` is set in the environment, it always wins, matching
/// `tracing_subscriber`'s usual precedence.
#[derive(clap::Args, Clone, Debug, serde::Deserialize)]
pub struct Log {
	/// Default filter directive used when `RUST_LOG` is unset.
	#[arg(long, default_value = "info")]
	#[serde(default = "default_level")]
	pub level: String,
}

fn default_level() -> String {
	"info".to_string()
}

impl Default for Log {
	fn default() -> Self {
		Self { level: default_level() }
	}
}

impl Log {
	/// Install the global `tracing` subscriber. Must be called at most once per process; the
	/// relay and SDN binaries each call this from `main` before doing anything else.
	pub fn init(&self) {
		let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.clone()));

		tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
	}
}
