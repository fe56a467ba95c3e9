/*!
 * ota-beacon CLI - firmware distribution endpoint
 */

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;

use ota_beacon::{
    config::BeaconConfig,
    error::{EXIT_FATAL, EXIT_SUCCESS},
    logging,
    manifest::{Importance, PackageType},
    server,
};

#[derive(Parser)]
#[command(name = "ota-beacon")]
#[command(version, about = "Serve OTA update manifests and firmware binaries, discoverable over mDNS", long_about = None)]
struct Cli {
    /// Address to bind on
    #[arg(long, default_value = "0.0.0.0", env = "OTA_BEACON_HOST")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080, env = "OTA_BEACON_PORT")]
    port: u16,

    /// mDNS hostname to advertise, without the .local suffix
    #[arg(long, default_value = "owmc_update", env = "OTA_BEACON_HOSTNAME")]
    hostname: String,

    /// Static serve root (the directory containing the build output)
    #[arg(long, default_value = ".", env = "OTA_BEACON_ROOT", value_name = "DIR")]
    root: PathBuf,

    /// Build output subdirectory under the serve root
    #[arg(long, default_value = "build", value_name = "NAME")]
    build_dir: String,

    /// Route serving the update manifest
    #[arg(long, default_value = "/p1/manifest.json", value_name = "PATH")]
    manifest_route: String,

    /// Release note text included in the manifest
    #[arg(long, value_name = "TEXT")]
    note: Option<String>,

    /// Advertise this fixed version instead of the build metadata's version
    #[arg(long, value_name = "VERSION")]
    version_override: Option<String>,

    /// Let clients skip the update when already on the advertised version
    #[arg(long)]
    respect_version: bool,

    /// Update urgency advertised in the manifest
    #[arg(long, value_enum, default_value = "critical")]
    importance: ImportanceArg,

    /// Artifact kind advertised in the manifest
    #[arg(long = "type", value_enum, default_value = "firmware")]
    package_type: PackageTypeArg,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,

    /// Write JSON logs to a file instead of stdout
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImportanceArg {
    Normal,
    Critical,
}

impl From<ImportanceArg> for Importance {
    fn from(arg: ImportanceArg) -> Self {
        match arg {
            ImportanceArg::Normal => Importance::Normal,
            ImportanceArg::Critical => Importance::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PackageTypeArg {
    Firmware,
    Data,
    PartitionTable,
    Bootloader,
}

impl From<PackageTypeArg> for PackageType {
    fn from(arg: PackageTypeArg) -> Self {
        match arg {
            PackageTypeArg::Firmware => PackageType::Firmware,
            PackageTypeArg::Data => PackageType::Data,
            PackageTypeArg::PartitionTable => PackageType::PartitionTable,
            PackageTypeArg::Bootloader => PackageType::Bootloader,
        }
    }
}

impl Cli {
    fn into_config(self) -> BeaconConfig {
        let defaults = BeaconConfig::default();
        BeaconConfig {
            host: self.host,
            port: self.port,
            // Tolerate a copy-pasted FQDN on the command line.
            hostname: self.hostname.trim_end_matches(".local").to_string(),
            root: self.root,
            build_subdir: self.build_dir,
            manifest_route: self.manifest_route,
            note: self.note.unwrap_or(defaults.note),
            ignore_version: !self.respect_version,
            importance: self.importance.into(),
            package_type: self.package_type.into(),
            version_override: self.version_override,
            verbose: self.verbose,
            log_file: self.log_file,
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Cli::parse().into_config();

    if let Err(err) = logging::init_logging(&config) {
        eprintln!("error: {}", err);
        process::exit(EXIT_FATAL);
    }

    if let Err(err) = server::run(config).await {
        tracing::error!("fatal: {}", err);
        process::exit(err.exit_code());
    }

    process::exit(EXIT_SUCCESS);
}
