use std::{
	fs::File,
	io::BufReader,
	path::{Path, PathBuf},
	sync::Once,
};

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;

static INSTALL_CRYPTO_PROVIDER: Once = Once::new();

/// Install `aws-lc-rs` as the process-wide default crypto provider.
///
/// `rustls` 0.23 requires one to be installed before any TLS connection is established; with
/// more than one provider feature reachable through the dependency graph, skipping this causes a
/// panic the first time a `ServerConfig` is built. Safe to call more than once.
pub fn install_default_crypto_provider() {
	INSTALL_CRYPTO_PROVIDER.call_once(|| {
		let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
	});
}

/// TLS material for one binary, as configured by the operator.
#[derive(clap::Args, Clone, Debug, serde::Deserialize)]
pub struct Tls {
	/// PEM-encoded certificate chain.
	#[arg(long)]
	pub cert: PathBuf,

	/// PEM-encoded private key.
	#[arg(long)]
	pub key: PathBuf,
}

impl Tls {
	/// Load the certificate and key into an `axum-server` Rustls config.
	///
	/// Starting the relay without usable TLS material is a configuration error, not a runtime
	/// one: callers are expected to `.expect()` or otherwise abort startup on failure.
	pub async fn load(&self) -> anyhow::Result<RustlsConfig> {
		install_default_crypto_provider();

		RustlsConfig::from_pem_file(&self.cert, &self.key)
			.await
			.with_context(|| format!("loading TLS material from {} / {}", self.cert.display(), self.key.display()))
	}
}

/// Parse a PEM certificate chain without building a full `ServerConfig`; used by collaborators
/// (e.g. a future client-auth path) that need the raw chain rather than an `axum-server` config.
pub fn load_cert_chain(path: &Path) -> anyhow::Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
	let file = File::open(path).with_context(|| format!("opening certificate file {}", path.display()))?;
	let mut reader = BufReader::new(file);
	rustls_pemfile::certs(&mut reader)
		.collect::<Result<Vec<_>, _>>()
		.with_context(|| format!("parsing certificate file {}", path.display()))
}
