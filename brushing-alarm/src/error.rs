//! Crate-level error type for wiring code.
//!
//! Components define their own error enums; this type collects the
//! failures that can stop the daemon from starting or serving.

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind API server to {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("alarm service task failed: {0}")]
    Service(#[from] tokio::task::JoinError),
}
