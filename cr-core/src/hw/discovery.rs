//! Camera discovery
//!
//! Discovery is an opaque, possibly slow call made by the caller before
//! matching. An empty result is not an error; only genuine I/O failures are.
//!
//! - **Linux**: walks `/sys/class/video4linux` and reads the USB serial of
//!   each capture node
//! - **Static**: a fixed list, in code or from a JSON/YAML device file

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

use crate::constants::{limits, paths};
use crate::data::{
    current_timestamp_ms, is_valid_device_id, read_document, ConnectionState, DeviceDescriptor,
};
use crate::error::{CamrigError, Result};

/// Parent directories searched for a USB `serial` attribute
const MAX_SERIAL_DEPTH: usize = 6;

/// Source of the currently online devices
#[cfg_attr(test, mockall::automock)]
pub trait DeviceDiscovery {
    fn discover(&self) -> Result<Vec<DeviceDescriptor>>;
}

/// Run discovery and keep only usable, connected devices
///
/// Duplicate ids keep their first occurrence; malformed ids are dropped.
pub fn online_devices(discovery: &dyn DeviceDiscovery) -> Result<Vec<DeviceDescriptor>> {
    let found = discovery.discover()?;
    let total = found.len();

    let mut seen = HashSet::new();
    let mut online = Vec::with_capacity(total);
    for dev in found {
        if !dev.is_connected() {
            trace!(device = %dev.id, "Skipping device that is not connected");
            continue;
        }
        if !is_valid_device_id(&dev.id) {
            warn!(device = %dev.id, "Skipping device with malformed id");
            continue;
        }
        if !seen.insert(dev.id.clone()) {
            debug!(device = %dev.id, "Skipping duplicate device");
            continue;
        }
        online.push(dev);
    }

    info!(found = total, online = online.len(), "Device discovery complete");
    Ok(online)
}

// ============================================================================
// Static Discovery
// ============================================================================

/// Entry in a device file: a bare id or a full descriptor
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DeviceEntry {
    Id(String),
    Descriptor(DeviceDescriptor),
}

/// Fixed device list
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    devices: Vec<DeviceDescriptor>,
}

impl StaticDiscovery {
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self { devices }
    }

    /// Connected devices with the given ids
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ids.into_iter().map(DeviceDescriptor::new).collect())
    }

    /// Load a device list file
    ///
    /// The file holds an array of ids or descriptors. Bare ids are connected;
    /// descriptors keep the state they declare.
    pub fn from_file(path: &Path) -> Result<Self> {
        let entries: Vec<DeviceEntry> = read_document(path, limits::MAX_DEVICE_LIST_SIZE)?;
        let now = current_timestamp_ms();

        let devices = entries
            .into_iter()
            .map(|entry| match entry {
                DeviceEntry::Id(id) => DeviceDescriptor::new(id),
                DeviceEntry::Descriptor(mut dev) => {
                    if dev.first_seen == 0 {
                        dev.first_seen = now;
                    }
                    if dev.last_seen == 0 {
                        dev.last_seen = now;
                    }
                    dev
                }
            })
            .collect::<Vec<_>>();

        debug!(path = ?path, devices = devices.len(), "Loaded device list");
        Ok(Self::new(devices))
    }
}

impl DeviceDiscovery for StaticDiscovery {
    fn discover(&self) -> Result<Vec<DeviceDescriptor>> {
        Ok(self.devices.clone())
    }
}

// ============================================================================
// sysfs Discovery
// ============================================================================

/// V4L2 capture devices identified by USB serial
#[derive(Debug, Clone)]
pub struct SysfsDiscovery {
    root: PathBuf,
}

impl Default for SysfsDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsDiscovery {
    pub fn new() -> Self {
        Self::with_root(paths::VIDEO4LINUX_BASE)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DeviceDiscovery for SysfsDiscovery {
    fn discover(&self) -> Result<Vec<DeviceDescriptor>> {
        if !self.root.is_dir() {
            debug!(root = ?self.root, "No video4linux class directory");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| {
            CamrigError::discovery(format!("cannot read {}: {}", self.root.display(), e))
        })?;

        let mut nodes: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("video"))
            })
            .collect();
        nodes.sort_by_key(|path| node_index(path));

        let mut seen = HashSet::new();
        let mut devices = Vec::new();
        for node in nodes {
            trace!("Checking video node: {:?}", node);
            let Some(dev) = read_video_node(&node) else {
                trace!("Skipped {:?} (no USB serial)", node);
                continue;
            };
            // Metadata nodes share the serial of their capture node
            if seen.insert(dev.id.clone()) {
                info!(device = %dev.id, name = ?dev.product_name, "Found camera");
                devices.push(dev);
            }
        }

        Ok(devices)
    }
}

/// Numeric suffix of `videoN`, for discovery order
fn node_index(path: &Path) -> (u32, String) {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let index = name
        .trim_start_matches("video")
        .parse::<u32>()
        .unwrap_or(u32::MAX);
    (index, name)
}

fn read_attr(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn read_video_node(node: &Path) -> Option<DeviceDescriptor> {
    let device_dir = fs::canonicalize(node.join("device")).ok()?;

    let mut dir = Some(device_dir.as_path());
    for _ in 0..MAX_SERIAL_DEPTH {
        let current = dir?;
        if let Some(serial) = read_attr(&current.join("serial")) {
            if !is_valid_device_id(&serial) {
                warn!(node = ?node, serial = %serial, "Ignoring malformed USB serial");
                return None;
            }
            let product =
                read_attr(&current.join("product")).or_else(|| read_attr(&node.join("name")));
            let mut dev = DeviceDescriptor::new(serial);
            dev.product_name = product;
            dev.state = ConnectionState::Connected;
            return Some(dev);
        }
        dir = current.parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    /// Build `<tmp>/class/videoN -> device` with a USB parent holding `serial`
    fn fake_camera(
        tmp: &TempDir,
        node: &str,
        usb: &str,
        serial: Option<&str>,
        product: Option<&str>,
    ) {
        let usb_dir = tmp.path().join("devices").join(usb);
        let iface_dir = usb_dir.join(format!("{}:1.0", usb));
        fs::create_dir_all(&iface_dir).unwrap();
        if let Some(serial) = serial {
            fs::write(usb_dir.join("serial"), format!("{}\n", serial)).unwrap();
        }
        if let Some(product) = product {
            fs::write(usb_dir.join("product"), product).unwrap();
        }

        let node_dir = tmp.path().join("class").join(node);
        fs::create_dir_all(&node_dir).unwrap();
        fs::write(node_dir.join("name"), "UVC Camera\n").unwrap();
        symlink(&iface_dir, node_dir.join("device")).unwrap();
    }

    #[test]
    fn test_sysfs_discovery_reads_serials() {
        let tmp = TempDir::new().unwrap();
        fake_camera(&tmp, "video2", "1-2", Some("SN-B"), None);
        fake_camera(&tmp, "video0", "1-1", Some("SN-A"), Some("StereoCam L"));
        fake_camera(&tmp, "video1", "1-1", Some("SN-A"), Some("StereoCam L"));
        fake_camera(&tmp, "video3", "1-3", None, None);

        let devices = SysfsDiscovery::with_root(tmp.path().join("class"))
            .discover()
            .unwrap();

        let ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["SN-A", "SN-B"]);
        assert_eq!(devices[0].product_name.as_deref(), Some("StereoCam L"));
        assert_eq!(devices[1].product_name.as_deref(), Some("UVC Camera"));
        assert!(devices.iter().all(|d| d.is_connected()));
    }

    #[test]
    fn test_sysfs_discovery_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let devices = SysfsDiscovery::with_root(tmp.path().join("nope"))
            .discover()
            .unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_node_index_orders_numerically() {
        assert!(node_index(Path::new("video2")) < node_index(Path::new("video10")));
    }

    #[test]
    fn test_static_from_file_mixed_entries() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("devices.json");
        fs::write(
            &path,
            r#"["SN1", {"id": "SN2", "product_name": "Cam", "state": "connected"}, {"id": "SN3"}]"#,
        )
        .unwrap();

        let devices = StaticDiscovery::from_file(&path).unwrap().discover().unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices[0].is_connected());
        assert_eq!(devices[1].product_name.as_deref(), Some("Cam"));
        assert_eq!(devices[2].state, ConnectionState::Unknown);
        assert!(devices[2].first_seen > 0);
    }

    #[test]
    fn test_static_from_yaml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("devices.yaml");
        fs::write(&path, "- SN1\n- SN2\n").unwrap();

        let devices = StaticDiscovery::from_file(&path).unwrap().discover().unwrap();
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn test_online_devices_filters() {
        let mut offline = DeviceDescriptor::new("SN2");
        offline.state = ConnectionState::Unknown;
        let found = vec![
            DeviceDescriptor::new("SN1"),
            offline,
            DeviceDescriptor::new("bad id"),
            DeviceDescriptor::new("SN1"),
            DeviceDescriptor::new("SN3"),
        ];

        let mut mock = MockDeviceDiscovery::new();
        mock.expect_discover().times(1).return_once(move || Ok(found));

        let online = online_devices(&mock).unwrap();
        let ids: Vec<&str> = online.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["SN1", "SN3"]);
    }

    #[test]
    fn test_online_devices_propagates_failure() {
        let mut mock = MockDeviceDiscovery::new();
        mock.expect_discover()
            .returning(|| Err(CamrigError::discovery("bus reset")));

        let err = online_devices(&mock).unwrap_err();
        assert!(err.to_string().contains("bus reset"));
    }

    #[test]
    fn test_online_devices_empty_is_ok() {
        let mut mock = MockDeviceDiscovery::new();
        mock.expect_discover().returning(|| Ok(Vec::new()));
        assert!(online_devices(&mock).unwrap().is_empty());
    }
}
