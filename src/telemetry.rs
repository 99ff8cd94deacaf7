//! Logging helpers shared by the binaries.

use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Short, stable, non-reversible id for a text. Logs carry this instead of
/// the comment itself.
pub fn anon_hash(text: &str) -> String {
    let mut id = sha256_hex(text.as_bytes());
    id.truncate(12);
    id
}

/// Install a compact fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
