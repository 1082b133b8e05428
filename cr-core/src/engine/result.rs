//! Match results and readiness reporting

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::data::{check_roles, DeviceDescriptor, Role, RoleBinding};
use crate::error::CamrigError;

/// Classification of a binding set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Every role bound
    Full,
    /// Some roles bound
    Partial,
    /// No role bound
    None,
    /// The binding set itself is structurally broken
    Invalid,
}

impl MatchStatus {
    /// `partial` and `full` meet the threshold to start capture
    pub fn can_start(&self) -> bool {
        matches!(self, MatchStatus::Full | MatchStatus::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Full => "full",
            MatchStatus::Partial => "partial",
            MatchStatus::None => "none",
            MatchStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projection of a binding set against the online devices
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub status: MatchStatus,
    /// Bindings with an active device
    pub matched: Vec<RoleBinding>,
    /// Bindings without an active device
    pub unmatched: Vec<RoleBinding>,
    /// Online devices not assigned to any role, in discovery order
    pub available: Vec<DeviceDescriptor>,
    /// Role-set violations, only for `Invalid`
    pub errors: Vec<String>,
}

impl MatchResult {
    /// Derive the result from binding state
    ///
    /// A binding set that fails role completeness is `Invalid` regardless of
    /// its assignments.
    pub fn project(
        bindings: &[RoleBinding],
        expected: &[Role],
        online: &[DeviceDescriptor],
    ) -> Self {
        let report = check_roles(bindings, expected);
        let active: HashSet<&str> = bindings
            .iter()
            .filter_map(|b| b.active_id.as_deref())
            .collect();
        let available: Vec<DeviceDescriptor> = online
            .iter()
            .filter(|dev| !active.contains(dev.id.as_str()))
            .cloned()
            .collect();

        if !report.is_ok() {
            return Self {
                status: MatchStatus::Invalid,
                matched: Vec::new(),
                unmatched: bindings.to_vec(),
                available,
                errors: report.errors,
            };
        }

        let (matched, unmatched): (Vec<RoleBinding>, Vec<RoleBinding>) =
            bindings.iter().cloned().partition(|b| b.is_bound());

        let status = if unmatched.is_empty() && !matched.is_empty() {
            MatchStatus::Full
        } else if !matched.is_empty() {
            MatchStatus::Partial
        } else {
            MatchStatus::None
        };

        Self {
            status,
            matched,
            unmatched,
            available,
            errors: Vec::new(),
        }
    }

    /// Device bound to a role, if any
    pub fn device_for(&self, role: Role) -> Option<&str> {
        self.matched
            .iter()
            .find(|b| b.role == role)
            .and_then(|b| b.active_id.as_deref())
    }

    pub fn unmatched_roles(&self) -> Vec<Role> {
        self.unmatched.iter().map(|b| b.role).collect()
    }

    pub fn available_ids(&self) -> Vec<String> {
        self.available.iter().map(|d| d.id.clone()).collect()
    }
}

/// Whether a result may start capture, and why not
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartReadiness {
    pub can_start: bool,
    /// Blocking errors when `can_start` is false, warnings otherwise
    pub issues: Vec<String>,
}

impl StartReadiness {
    /// Assess a result
    ///
    /// `invalid` and `none` block; `partial` starts with one warning per
    /// unmatched role.
    pub fn assess(result: &MatchResult) -> Self {
        match result.status {
            MatchStatus::Invalid => Self {
                can_start: false,
                issues: result
                    .errors
                    .iter()
                    .map(|e| format!("invalid configuration: {}", e))
                    .collect(),
            },
            MatchStatus::None => Self {
                can_start: false,
                issues: vec!["no device is bound to any role".to_string()],
            },
            MatchStatus::Partial => Self {
                can_start: true,
                issues: result
                    .unmatched
                    .iter()
                    .map(|b| format!("role '{}' has no matched device", b.role))
                    .collect(),
            },
            MatchStatus::Full => Self {
                can_start: true,
                issues: Vec::new(),
            },
        }
    }
}

/// Machine-readable status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSnapshot {
    pub status: MatchStatus,
    pub can_start: bool,
    /// Role name to active device id
    pub roles: BTreeMap<String, Option<String>>,
    pub unmatched_roles: Vec<String>,
    pub available_devices: Vec<String>,
    pub issues: Vec<String>,
}

impl MatchSnapshot {
    pub fn new(bindings: &[RoleBinding], result: &MatchResult) -> Self {
        let readiness = StartReadiness::assess(result);
        Self {
            status: result.status,
            can_start: readiness.can_start,
            roles: bindings
                .iter()
                .map(|b| (b.role.to_string(), b.active_id.clone()))
                .collect(),
            unmatched_roles: result
                .unmatched
                .iter()
                .map(|b| b.role.to_string())
                .collect(),
            available_devices: result.available_ids(),
            issues: readiness.issues,
        }
    }
}

/// Rejected manual binding operation
///
/// These are expected outcomes of interactive use, returned as values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidOperation {
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("device '{0}' is not online")]
    DeviceOffline(String),

    #[error("role '{0}' has no bound device")]
    RoleUnbound(Role),

    #[error("cannot swap role '{0}' with itself")]
    SameRole(Role),
}

impl From<InvalidOperation> for CamrigError {
    fn from(op: InvalidOperation) -> Self {
        CamrigError::InvalidOperation(op.to_string())
    }
}
