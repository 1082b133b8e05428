//! Data types, configuration, persistence, and validation modules
//!
//! Contains the rig configuration model and everything that reads, writes,
//! or checks it.

mod config;
mod persistence;
mod types;
pub mod validation;

pub use config::{
    Configuration, DisplayConfig, HardwareConfig, LoggingConfig, ProcessingConfig, Transform,
    TransportConfig, TriggerMode,
};
pub use persistence::{
    read_config, read_document, render_config, temp_path_for, write_atomic, write_config,
    BindingRecord, ConfigDocument, ConfigFormat, RoleMap,
};
pub use types::{ConnectionState, DeviceDescriptor, Role, RoleBinding, EXPECTED_ROLES};
pub use validation::{
    check_active_id_uniqueness, check_active_ids_online, check_cross_fields, check_device_table,
    check_history, check_reference_integrity, check_role_names, check_roles,
    is_valid_device_id, validate_configuration, validate_structure, ValidationReport,
};

pub(crate) use types::current_timestamp_ms;
