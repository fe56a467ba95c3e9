/*!
 * Update manifest production
 *
 * The manifest is recomputed from the build metadata on every request so it
 * always reflects what is currently on disk. Nothing here is cached.
 */

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;

use crate::config::BeaconConfig;
use crate::error::{BeaconError, Result};

/// Schema version of the manifest format
pub const MANIFEST_VERSION: u32 = 1;

/// Artifact kind advertised in the manifest.
///
/// Serialized as the integer values update clients parse; the set is closed
/// and unknown integers fail deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PackageType {
    Firmware = 0,
    Data = 1,
    PartitionTable = 2,
    Bootloader = 3,
}

impl PackageType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(PackageType::Firmware),
            1 => Some(PackageType::Data),
            2 => Some(PackageType::PartitionTable),
            3 => Some(PackageType::Bootloader),
            _ => None,
        }
    }
}

impl Serialize for PackageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for PackageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        PackageType::from_u8(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid package type: {}", raw)))
    }
}

/// Update urgency advertised in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Importance {
    Normal = 0,
    Critical = 1,
}

impl Importance {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Importance::Normal),
            1 => Some(Importance::Critical),
            _ => None,
        }
    }
}

impl Serialize for Importance {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Importance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Importance::from_u8(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid importance: {}", raw)))
    }
}

/// The JSON descriptor served to update clients.
///
/// Field names and enum integer values are a wire contract; clients parse by
/// field name and numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub manifest_version: u32,
    pub version: String,
    pub path: String,
    pub note: String,
    pub port: u16,
    pub ignore_version: bool,
    #[serde(rename = "type")]
    pub package_type: PackageType,
    pub importance: Importance,
}

/// Subset of ESP-IDF's `project_description.json` this server reads.
///
/// Owned by the build pipeline; read fresh on every manifest request.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildMetadata {
    pub project_version: String,
    pub app_bin: String,
}

/// Read the build metadata and produce the current manifest.
///
/// Fails with `MetadataUnavailable` when the metadata file cannot be read and
/// `MetadataMalformed` when required fields are missing or unusable. Both are
/// per-request errors; the server keeps running.
pub fn produce_manifest(config: &BeaconConfig) -> Result<Manifest> {
    let metadata_path = config.metadata_path();
    let raw = fs::read_to_string(&metadata_path).map_err(|source| {
        BeaconError::MetadataUnavailable {
            path: metadata_path.clone(),
            source,
        }
    })?;

    let metadata: BuildMetadata =
        serde_json::from_str(&raw).map_err(|e| BeaconError::MetadataMalformed {
            path: metadata_path.clone(),
            reason: e.to_string(),
        })?;

    // A binary name with path separators would let the manifest point outside
    // the build directory.
    if metadata.app_bin.is_empty()
        || metadata.app_bin.contains('/')
        || metadata.app_bin.contains('\\')
        || metadata.app_bin.contains("..")
    {
        return Err(BeaconError::MetadataMalformed {
            path: metadata_path,
            reason: format!("app_bin is not a bare filename: {:?}", metadata.app_bin),
        });
    }

    if metadata.project_version.is_empty() && config.version_override.is_none() {
        return Err(BeaconError::MetadataMalformed {
            path: metadata_path,
            reason: "project_version is empty".into(),
        });
    }

    let version = config
        .version_override
        .clone()
        .unwrap_or(metadata.project_version);

    Ok(Manifest {
        manifest_version: MANIFEST_VERSION,
        version,
        path: format!("/{}/{}", config.build_subdir, metadata.app_bin),
        note: config.note.clone(),
        port: config.port,
        ignore_version: config.ignore_version,
        package_type: config.package_type,
        importance: config.importance,
    })
}
