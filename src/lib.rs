/*!
 * ota-beacon - Local-network firmware distribution endpoint
 *
 * Serves an OTA update manifest and the firmware binaries it references,
 * and advertises itself over multicast-DNS so devices on the local network
 * can find the endpoint without a configured address:
 * - Manifest recomputed from the build metadata on every request
 * - Static file serving rooted at the build output tree
 * - mDNS record registered after bind, withdrawn at shutdown
 */

pub mod advertise;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod server;

// Re-export commonly used types
pub use advertise::Advertisement;
pub use config::BeaconConfig;
pub use error::{BeaconError, Result};
pub use manifest::{produce_manifest, Importance, Manifest, PackageType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
