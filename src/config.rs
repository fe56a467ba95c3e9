/*!
 * Configuration types for ota-beacon
 */

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::{BeaconError, Result};
use crate::manifest::{Importance, PackageType};

/// Default release note, shown by the update client before flashing
pub const DEFAULT_NOTE: &str =
    "This version fixes several stability issues, including the screen shattering, \
     lagging and tearing.";

/// Runtime configuration, constructed once at startup from the CLI and
/// shared read-only across all request handlers.
#[derive(Debug, Clone)]
pub struct BeaconConfig {
    /// Address to bind on
    pub host: IpAddr,

    /// Port the HTTP server listens on
    pub port: u16,

    /// mDNS hostname label, advertised as `<hostname>.local`
    pub hostname: String,

    /// Static serve root (the directory containing the build output)
    pub root: PathBuf,

    /// Build output subdirectory under the serve root
    pub build_subdir: String,

    /// Route serving the update manifest
    pub manifest_route: String,

    /// Release note text included in the manifest
    pub note: String,

    /// Tell clients to apply the update regardless of their current version
    pub ignore_version: bool,

    /// Update urgency advertised in the manifest
    pub importance: Importance,

    /// Artifact kind advertised in the manifest
    pub package_type: PackageType,

    /// Advertise this fixed version string instead of the metadata's
    /// `project_version`
    pub version_override: Option<String>,

    /// Enable verbose (debug) logging
    pub verbose: bool,

    /// Write JSON logs to this file instead of stdout
    pub log_file: Option<PathBuf>,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        BeaconConfig {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            hostname: "owmc_update".to_string(),
            root: PathBuf::from("."),
            build_subdir: "build".to_string(),
            manifest_route: "/p1/manifest.json".to_string(),
            note: DEFAULT_NOTE.to_string(),
            ignore_version: true,
            importance: Importance::Critical,
            package_type: PackageType::Firmware,
            version_override: None,
            verbose: false,
            log_file: None,
        }
    }
}

impl BeaconConfig {
    /// Socket address the listener binds to
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Well-known location of the build metadata, relative to the serve root
    pub fn metadata_path(&self) -> PathBuf {
        self.root
            .join(&self.build_subdir)
            .join("project_description.json")
    }

    /// Validate the configuration before any listener or advertisement is
    /// created. Failures here abort startup.
    pub fn validate(&self) -> Result<()> {
        if !self.manifest_route.starts_with('/') || self.manifest_route.len() < 2 {
            return Err(BeaconError::Config(format!(
                "manifest route must be an absolute path, got {:?}",
                self.manifest_route
            )));
        }
        if self.hostname.is_empty() || self.hostname.contains('.') {
            return Err(BeaconError::Config(format!(
                "hostname must be a bare mDNS label (no dots), got {:?}",
                self.hostname
            )));
        }
        if self.build_subdir.is_empty() || self.build_subdir.contains('/') {
            return Err(BeaconError::Config(format!(
                "build subdir must be a single directory name, got {:?}",
                self.build_subdir
            )));
        }
        if !self.root.is_dir() {
            return Err(BeaconError::Config(format!(
                "serve root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}
