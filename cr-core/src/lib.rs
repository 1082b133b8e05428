//! camrig Core Library
//!
//! Camera role binding for multi-camera rigs.
//!
//! # Features
//!
//! - **Role Bindings**: Each logical camera slot remembers the devices it has
//!   used, so a reconnected camera lands back in its role
//! - **Matching**: Last-active, then history, then optional auto-bind, with
//!   every device claimed by at most one role
//! - **Validation**: Structural, cross-field and opt-in runtime checks that
//!   report every violated rule
//! - **Lifecycle**: Draft/runnable configuration slots with atomic persistence
//!
//! # Module Structure
//!
//! - `data/` - Data types, configuration, persistence, validation
//! - `engine/` - Role matching engine
//! - `hw/` - Camera discovery
//!
//! # Example
//!
//! ```no_run
//! use cr_core::{online_devices, ConfigLifecycle, SysfsDiscovery};
//! use std::path::Path;
//!
//! let online = online_devices(&SysfsDiscovery::new()).unwrap();
//! let mut lifecycle = ConfigLifecycle::default();
//! lifecycle.load(Path::new("rig.json"), &online).unwrap();
//! let result = lifecycle.reconcile(&online).unwrap();
//! println!("match status: {}", result.status);
//! ```

// Grouped modules
pub mod data;
pub mod engine;
pub mod hw;

// Standalone modules
pub mod constants;
pub mod error;
pub mod lifecycle;

// Re-export primary types from data/
pub use data::{
    Configuration, ConnectionState, DeviceDescriptor, DisplayConfig, HardwareConfig,
    LoggingConfig, ProcessingConfig, Role, RoleBinding, Transform, TransportConfig, TriggerMode,
    EXPECTED_ROLES,
};

// Re-export persistence functions from data/
pub use data::{read_config, render_config, write_atomic, write_config, ConfigFormat};

// Re-export validation functions from data/
pub use data::{check_roles, validate_configuration, validate_structure, ValidationReport};

// Re-export error types
pub use error::{CamrigError, Result};

// Re-export engine types
pub use engine::{
    InvalidOperation, MatchEngine, MatchResult, MatchSnapshot, MatchStatus, StartReadiness,
};

// Re-export discovery
pub use hw::{online_devices, DeviceDiscovery, StaticDiscovery, SysfsDiscovery};

pub use lifecycle::{ConfigLifecycle, LifecycleOptions};
