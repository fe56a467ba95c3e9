/*!
 * Error types for ota-beacon
 */

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BeaconError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum BeaconError {
    /// Build metadata file missing or unreadable
    #[error("build metadata unavailable at {path}: {source}")]
    MetadataUnavailable { path: PathBuf, source: io::Error },

    /// Build metadata present but not parseable as expected
    #[error("build metadata malformed at {path}: {reason}")]
    MetadataMalformed { path: PathBuf, reason: String },

    /// Static route miss
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// Request path tried to escape the serve root
    #[error("request path rejected: {0}")]
    PathRejected(String),

    /// Listener could not bind (port in use, permission denied)
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// No usable network address, or the mDNS responder refused the record
    #[error("mDNS advertisement failed: {0}")]
    Advertise(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BeaconError {
    /// Check if this error must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BeaconError::Bind { .. } | BeaconError::Advertise(_) | BeaconError::Config(_)
        )
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        EXIT_FATAL
    }
}
