//! Core data types for camrig
//!
//! Roles, device descriptors, and the per-role binding record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::binding::MAX_HISTORY;

// ============================================================================
// Roles
// ============================================================================

/// A fixed logical camera slot
///
/// The set is closed. `Role::ALL` is the expected set every configuration
/// must cover exactly once; adding a role here is the only change needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    LeftCamera,
    RightCamera,
}

impl Role {
    /// Every role, in binding order
    pub const ALL: [Role; 2] = [Role::LeftCamera, Role::RightCamera];

    /// Canonical name used as the map key on disk
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::LeftCamera => "left_camera",
            Role::RightCamera => "right_camera",
        }
    }
}

/// The expected role set
pub const EXPECTED_ROLES: &[Role] = &Role::ALL;

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts the canonical name, its kebab-case form, or the short side name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "left_camera" | "left" => Ok(Role::LeftCamera),
            "right_camera" | "right" => Ok(Role::RightCamera),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// ============================================================================
// Devices
// ============================================================================

/// Connection state reported by discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected,
    #[default]
    Unknown,
}

/// Snapshot of one device as seen by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable hardware serial
    pub id: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub state: ConnectionState,
    #[serde(default)]
    pub notes: String,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub first_seen: u64,
    /// Milliseconds since the Unix epoch
    #[serde(default)]
    pub last_seen: u64,
}

impl DeviceDescriptor {
    /// A connected device seen right now
    pub fn new(id: impl Into<String>) -> Self {
        let now = current_timestamp_ms();
        Self {
            id: id.into(),
            product_name: None,
            state: ConnectionState::Connected,
            notes: String::new(),
            first_seen: now,
            last_seen: now,
        }
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Product name when known, otherwise the id
    pub fn display_name(&self) -> &str {
        self.product_name.as_deref().unwrap_or(&self.id)
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

// ============================================================================
// Role Binding
// ============================================================================

/// Device-assignment record for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleBinding {
    pub role: Role,
    /// Device assigned in this session only
    #[serde(default)]
    pub active_id: Option<String>,
    /// Device last successfully assigned, persisted
    #[serde(default)]
    pub last_active_id: Option<String>,
    /// Previously seen devices, most recent first
    #[serde(default)]
    pub historical_ids: Vec<String>,
}

impl RoleBinding {
    /// An unbound record with no history
    pub fn new(role: Role) -> Self {
        Self {
            role,
            active_id: None,
            last_active_id: None,
            historical_ids: Vec::new(),
        }
    }

    pub fn is_bound(&self) -> bool {
        self.active_id.is_some()
    }

    /// Assign a device for this session and remember it
    pub fn activate(&mut self, device_id: &str) {
        self.active_id = Some(device_id.to_string());
        self.last_active_id = Some(device_id.to_string());
        self.record_history(device_id);
    }

    /// Clear the session assignment, keeping history
    pub fn deactivate(&mut self) {
        self.active_id = None;
    }

    /// Push an id to the front of the history
    ///
    /// An existing entry moves to the front; the oldest entry is evicted once
    /// the history exceeds `MAX_HISTORY`.
    pub fn record_history(&mut self, device_id: &str) {
        self.historical_ids.retain(|id| id != device_id);
        self.historical_ids.insert(0, device_id.to_string());
        self.historical_ids.truncate(MAX_HISTORY);
    }
}

/// Get current timestamp in milliseconds
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
