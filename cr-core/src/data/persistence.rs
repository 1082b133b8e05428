//! JSON/YAML persistence for rig configurations
//!
//! The on-disk document keys bindings by role name and never carries a
//! session assignment: `active_id` is written as null and ignored on read.
//! Writes are atomic (temp file in the same directory, then rename).

use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{config::TEMP_SUFFIX, limits};
use crate::data::config::{
    Configuration, DisplayConfig, HardwareConfig, LoggingConfig, ProcessingConfig,
    TransportConfig,
};
use crate::data::types::{DeviceDescriptor, Role, RoleBinding};
use crate::error::{CamrigError, Result};

// ============================================================================
// Format
// ============================================================================

/// Serialization format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` select YAML, everything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }

    pub fn to_string_pretty<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            ConfigFormat::Json => Ok(serde_json::to_string_pretty(value)?),
            ConfigFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }

    pub fn parse<T: DeserializeOwned>(&self, contents: &str) -> Result<T> {
        match self {
            ConfigFormat::Json => Ok(serde_json::from_str(contents)?),
            ConfigFormat::Yaml => Ok(serde_yaml::from_str(contents)?),
        }
    }
}

// ============================================================================
// Document
// ============================================================================

/// Persisted form of one binding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRecord {
    /// Always null on disk
    #[serde(default)]
    pub active_id: Option<String>,
    #[serde(default)]
    pub last_active_id: Option<String>,
    #[serde(default)]
    pub historical_ids: Vec<String>,
}

/// Role-name keyed binding map that keeps document order and duplicate keys
///
/// Order is binding order; duplicates are kept so validation can report them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMap(pub Vec<(String, BindingRecord)>);

impl Serialize for RoleMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (role, record) in &self.0 {
            map.serialize_entry(role, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoleMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RoleMapVisitor;

        impl<'de> Visitor<'de> for RoleMapVisitor {
            type Value = RoleMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of role name to binding")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<RoleMap, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((role, record)) = access.next_entry::<String, BindingRecord>()? {
                    entries.push((role, record));
                }
                Ok(RoleMap(entries))
            }
        }

        deserializer.deserialize_map(RoleMapVisitor)
    }
}

/// On-disk configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub version: String,
    pub bindings: RoleMap,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceDescriptor>,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConfigDocument {
    /// Document for a configuration, with session assignments dropped
    pub fn from_config(config: &Configuration) -> Self {
        let bindings = config
            .bindings
            .iter()
            .map(|b| {
                (
                    b.role.as_str().to_string(),
                    BindingRecord {
                        active_id: None,
                        last_active_id: b.last_active_id.clone(),
                        historical_ids: b.historical_ids.clone(),
                    },
                )
            })
            .collect();

        Self {
            version: config.version.clone(),
            bindings: RoleMap(bindings),
            devices: config.devices.clone(),
            hardware: config.hardware.clone(),
            display: config.display.clone(),
            transport: config.transport.clone(),
            processing: config.processing.clone(),
            logging: config.logging.clone(),
        }
    }

    /// Resolve role names into a configuration
    ///
    /// Role names outside the closed role set cannot be represented and fail
    /// with a validation error naming each of them. Any `active_id` present in
    /// the document is discarded.
    pub fn into_config(self) -> Result<Configuration> {
        let mut unexpected = Vec::new();
        let mut bindings = Vec::with_capacity(self.bindings.0.len());

        for (name, record) in self.bindings.0 {
            match Role::ALL.iter().find(|r| r.as_str() == name) {
                Some(role) => {
                    if record.active_id.is_some() {
                        debug!(role = %role, "Ignoring persisted active_id");
                    }
                    bindings.push(RoleBinding {
                        role: *role,
                        active_id: None,
                        last_active_id: record.last_active_id,
                        historical_ids: record.historical_ids,
                    });
                }
                None => unexpected.push(format!("unexpected role '{}'", name)),
            }
        }

        if !unexpected.is_empty() {
            return Err(CamrigError::Validation(unexpected));
        }

        Ok(Configuration {
            version: self.version,
            bindings,
            devices: self.devices,
            hardware: self.hardware,
            display: self.display,
            transport: self.transport,
            processing: self.processing,
            logging: self.logging,
        })
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Read and parse a document, enforcing a size limit
pub fn read_document<T: DeserializeOwned>(path: &Path, max_size: u64) -> Result<T> {
    if !path.exists() {
        return Err(CamrigError::FileNotFound(path.to_path_buf()));
    }

    let metadata = fs::metadata(path).map_err(|e| CamrigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    if metadata.len() > max_size {
        return Err(CamrigError::FileTooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            max_size,
        });
    }

    let contents = fs::read_to_string(path).map_err(|e| CamrigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    ConfigFormat::from_path(path).parse(&contents)
}

/// Load a configuration from disk
pub fn read_config(path: &Path) -> Result<Configuration> {
    let document: ConfigDocument = read_document(path, limits::MAX_CONFIG_SIZE)?;
    let config = document.into_config()?;
    debug!(
        path = ?path,
        bindings = config.bindings.len(),
        devices = config.devices.len(),
        "Read configuration"
    );
    Ok(config)
}

// ============================================================================
// Writing
// ============================================================================

/// Render a configuration in the given format
pub fn render_config(config: &Configuration, format: ConfigFormat) -> Result<String> {
    format.to_string_pretty(&ConfigDocument::from_config(config))
}

/// Write a configuration to disk atomically
pub fn write_config(path: &Path, config: &Configuration) -> Result<()> {
    let contents = render_config(config, ConfigFormat::from_path(path))?;
    write_atomic(path, contents.as_bytes())?;
    debug!(path = ?path, "Saved configuration");
    Ok(())
}

/// Sibling temporary path used during atomic writes
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("config"));
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Write to a sibling temp file, sync, then rename over the target
///
/// The temp file is removed if any step fails, so the previous file is
/// either fully replaced or left untouched.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| CamrigError::FileWrite {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }

    let temp_path = temp_path_for(path);

    let result = (|| {
        let mut file = fs::File::create(&temp_path).map_err(|e| CamrigError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents).map_err(|e| CamrigError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;

        file.sync_all().map_err(|e| CamrigError::FileWrite {
            path: temp_path.clone(),
            source: e,
        })?;

        drop(file);

        fs::rename(&temp_path, path).map_err(|e| CamrigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    })();

    if result.is_err() && temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!(path = ?temp_path, error = %e, "Failed to remove temporary file");
        }
    }

    result
}
