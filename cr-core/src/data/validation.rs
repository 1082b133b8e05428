//! Binding and configuration validation
//!
//! Pure checks over role bindings and whole configurations. Every check
//! returns a `ValidationReport` carrying one message per violated rule so
//! callers can surface the complete list at once.
//!
//! Checks fall into three groups:
//!
//! - **Structural**: role completeness/uniqueness, reference integrity,
//!   history bounds, device id format, version. Always run.
//! - **Cross-field**: sub-configurations that reference roles must cover the
//!   binding role set exactly; sub-config value ranges.
//! - **Runtime**: active-id uniqueness and online references. Only run when
//!   requested, since offline authoring has no session assignments.

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::constants::binding::{MAX_DEVICE_ID_LEN, MAX_HISTORY};
use crate::data::config::Configuration;
use crate::data::types::{DeviceDescriptor, Role, RoleBinding};
use crate::error::{CamrigError, Result};

const DEVICE_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._:\-]*$";

static DEVICE_ID_RE: OnceLock<Option<Regex>> = OnceLock::new();

/// Outcome of one or more checks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Append another report's errors
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    /// `Ok(())` when clean, otherwise a validation error with every message
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(CamrigError::Validation(self.errors))
        }
    }
}

// ============================================================================
// Structural Checks
// ============================================================================

/// Role completeness and uniqueness over raw role names
///
/// The names must equal the expected set exactly. Duplicates, missing roles,
/// and unexpected names are each reported by name.
pub fn check_role_names<'a, I>(names: I, expected: &[Role]) -> ValidationReport
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = ValidationReport::new();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    let mut order: Vec<&str> = Vec::new();

    for name in names {
        let count = counts.entry(name).or_insert(0);
        if *count == 0 {
            order.push(name);
        }
        *count += 1;
    }

    let expected_names: BTreeSet<&str> = expected.iter().map(|r| r.as_str()).collect();

    for name in &order {
        let count = counts[name];
        if count > 1 {
            report.push(format!("duplicate role '{}' ({} bindings)", name, count));
        }
        if !expected_names.contains(name) {
            report.push(format!("unexpected role '{}'", name));
        }
    }

    for role in expected {
        if !counts.contains_key(role.as_str()) {
            report.push(format!("missing role '{}'", role));
        }
    }

    report
}

/// Role completeness and uniqueness over a binding set
pub fn check_roles(bindings: &[RoleBinding], expected: &[Role]) -> ValidationReport {
    check_role_names(bindings.iter().map(|b| b.role.as_str()), expected)
}

/// Every active id must exist in the device metadata table
pub fn check_reference_integrity(config: &Configuration) -> ValidationReport {
    let mut report = ValidationReport::new();
    for binding in &config.bindings {
        if let Some(id) = &binding.active_id {
            if !config.devices.contains_key(id) {
                report.push(format!(
                    "role '{}' references unknown device '{}'",
                    binding.role, id
                ));
            }
        }
    }
    report
}

/// History length, duplicates, and id format
pub fn check_history(bindings: &[RoleBinding]) -> ValidationReport {
    let mut report = ValidationReport::new();
    for binding in bindings {
        if binding.historical_ids.len() > MAX_HISTORY {
            report.push(format!(
                "role '{}' has {} history entries (max {})",
                binding.role,
                binding.historical_ids.len(),
                MAX_HISTORY
            ));
        }

        let mut seen = BTreeSet::new();
        for id in &binding.historical_ids {
            if !seen.insert(id.as_str()) {
                report.push(format!(
                    "role '{}' history contains '{}' more than once",
                    binding.role, id
                ));
            }
        }

        let ids = binding
            .active_id
            .iter()
            .chain(binding.last_active_id.iter())
            .chain(binding.historical_ids.iter());
        for id in ids {
            if !is_valid_device_id(id) {
                report.push(format!(
                    "role '{}' references malformed device id '{}'",
                    binding.role, id
                ));
            }
        }
    }
    report
}

/// Device table keys must be well-formed and match their descriptors
pub fn check_device_table(config: &Configuration) -> ValidationReport {
    let mut report = ValidationReport::new();
    for (key, device) in &config.devices {
        if !is_valid_device_id(key) {
            report.push(format!("malformed device id '{}'", key));
        }
        if &device.id != key {
            report.push(format!(
                "device entry '{}' describes a different device '{}'",
                key, device.id
            ));
        }
    }
    report
}

/// All structural checks
pub fn validate_structure(config: &Configuration, expected: &[Role]) -> ValidationReport {
    let mut report = ValidationReport::new();
    if config.version.trim().is_empty() {
        report.push("configuration version is empty");
    }
    report.merge(check_roles(&config.bindings, expected));
    report.merge(check_reference_integrity(config));
    report.merge(check_history(&config.bindings));
    report.merge(check_device_table(config));
    report
}

// ============================================================================
// Cross-field Checks
// ============================================================================

/// Sub-configurations must agree with the binding role set
///
/// Per-role transforms must cover exactly the bound roles. Sub-config values
/// are range checked here as well.
pub fn check_cross_fields(config: &Configuration) -> ValidationReport {
    let mut report = ValidationReport::new();

    let binding_roles: BTreeSet<&str> = config.bindings.iter().map(|b| b.role.as_str()).collect();
    let transform_roles: BTreeSet<&str> = config
        .processing
        .transforms
        .keys()
        .map(String::as_str)
        .collect();

    for role in binding_roles.difference(&transform_roles) {
        report.push(format!("processing.transforms is missing role '{}'", role));
    }
    for role in transform_roles.difference(&binding_roles) {
        report.push(format!("processing.transforms has unknown role '{}'", role));
    }

    for (role, transform) in &config.processing.transforms {
        let finite = transform
            .translation
            .iter()
            .chain(transform.rotation_rpy.iter())
            .all(|v| v.is_finite());
        if !finite {
            report.push(format!("processing.transforms.{} contains a non-finite value", role));
        }
    }

    let hw = &config.hardware;
    if hw.width == 0 || hw.height == 0 {
        report.push(format!("hardware resolution {}x{} is invalid", hw.width, hw.height));
    }
    if hw.frame_rate == 0 {
        report.push("hardware.frame_rate must be positive");
    }
    if hw.exposure_us == Some(0) {
        report.push("hardware.exposure_us must be positive when set");
    }
    if !hw.gain_db.is_finite() {
        report.push("hardware.gain_db must be finite");
    }

    if !(config.display.scale.is_finite() && config.display.scale > 0.0) {
        report.push(format!("display.scale {} must be positive", config.display.scale));
    }

    if config.transport.interface.trim().is_empty() {
        report.push("transport.interface is empty");
    }
    if config.transport.bitrate == 0 {
        report.push("transport.bitrate must be positive");
    }

    let threshold = config.processing.detection_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        report.push(format!(
            "processing.detection_threshold {} must be within 0..=1",
            threshold
        ));
    }

    report
}

// ============================================================================
// Runtime Checks
// ============================================================================

/// No two bindings may share an active id
pub fn check_active_id_uniqueness(bindings: &[RoleBinding]) -> ValidationReport {
    let mut report = ValidationReport::new();
    let mut owners: BTreeMap<&str, Role> = BTreeMap::new();
    for binding in bindings {
        if let Some(id) = &binding.active_id {
            if let Some(owner) = owners.get(id.as_str()) {
                report.push(format!(
                    "device '{}' is bound to both '{}' and '{}'",
                    id, owner, binding.role
                ));
            } else {
                owners.insert(id.as_str(), binding.role);
            }
        }
    }
    report
}

/// Every active id must be online
pub fn check_active_ids_online(
    bindings: &[RoleBinding],
    online: &[DeviceDescriptor],
) -> ValidationReport {
    let mut report = ValidationReport::new();
    for binding in bindings {
        if let Some(id) = &binding.active_id {
            if !online.iter().any(|dev| &dev.id == id) {
                report.push(format!(
                    "role '{}' is bound to offline device '{}'",
                    binding.role, id
                ));
            }
        }
    }
    report
}

// ============================================================================
// Aggregate
// ============================================================================

/// Run every check
///
/// Structural and cross-field checks always run. Runtime checks run only when
/// `runtime` carries the current online device list.
pub fn validate_configuration(
    config: &Configuration,
    expected: &[Role],
    runtime: Option<&[DeviceDescriptor]>,
) -> ValidationReport {
    let mut report = validate_structure(config, expected);
    report.merge(check_cross_fields(config));

    if let Some(online) = runtime {
        report.merge(check_active_id_uniqueness(&config.bindings));
        report.merge(check_active_ids_online(&config.bindings, online));
    }

    report
}

/// Validates a device identifier
pub fn is_valid_device_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_DEVICE_ID_LEN {
        return false;
    }
    match DEVICE_ID_RE.get_or_init(|| Regex::new(DEVICE_ID_PATTERN).ok()) {
        Some(re) => re.is_match(id),
        None => !id.chars().any(|c| c.is_whitespace() || c.is_control()),
    }
}
