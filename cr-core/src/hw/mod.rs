//! Hardware interaction modules
//!
//! Camera discovery. Matching and configuration never call into this module
//! themselves; the caller discovers first and passes the device list in.

mod discovery;

pub use discovery::{online_devices, DeviceDiscovery, StaticDiscovery, SysfsDiscovery};
