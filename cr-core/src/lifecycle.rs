//! Configuration lifecycle
//!
//! Two slots: the **draft**, freely editable and possibly invalid mid-edit,
//! and the **runnable** snapshot, the last draft that passed full
//! validation. Only the runnable snapshot is persisted or handed to
//! downstream consumers.
//!
//! ```text
//! create_default / load -> draft -> reconcile / edit -> promote -> runnable -> save
//!                             ^                                       |
//!                             +--------------- restore ---------------+
//! ```

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::data::{
    read_config, validate_configuration, validate_structure, write_config, Configuration,
    DeviceDescriptor, DisplayConfig, HardwareConfig, ProcessingConfig, Role, RoleBinding,
    TransportConfig, EXPECTED_ROLES,
};
use crate::engine::{MatchEngine, MatchResult};
use crate::error::{CamrigError, Result};

/// Lifecycle behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Pair leftover devices with unmatched roles during reconcile
    pub auto_bind: bool,
    /// Create and persist a default configuration when the file is missing
    pub auto_create: bool,
    /// Run structural and cross-field checks on load
    pub validate_on_load: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            auto_bind: true,
            auto_create: false,
            validate_on_load: true,
        }
    }
}

/// Draft/runnable state machine for one configuration file
#[derive(Debug, Clone)]
pub struct ConfigLifecycle {
    path: Option<PathBuf>,
    draft: Option<Configuration>,
    runnable: Option<Configuration>,
    dirty: bool,
    online: Vec<DeviceDescriptor>,
    expected: Vec<Role>,
    options: LifecycleOptions,
}

impl Default for ConfigLifecycle {
    fn default() -> Self {
        Self::new(LifecycleOptions::default())
    }
}

impl ConfigLifecycle {
    pub fn new(options: LifecycleOptions) -> Self {
        Self::with_expected_roles(EXPECTED_ROLES, options)
    }

    pub fn with_expected_roles(expected: &[Role], options: LifecycleOptions) -> Self {
        Self {
            path: None,
            draft: None,
            runnable: None,
            dirty: false,
            online: Vec::new(),
            expected: expected.to_vec(),
            options,
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn options(&self) -> LifecycleOptions {
        self.options
    }

    pub fn draft(&self) -> Option<&Configuration> {
        self.draft.as_ref()
    }

    pub fn runnable(&self) -> Option<&Configuration> {
        self.runnable.as_ref()
    }

    /// Whether the draft has diverged from the runnable snapshot
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Online devices from the last reconcile
    pub fn online(&self) -> &[DeviceDescriptor] {
        &self.online
    }

    fn draft_ref(&self) -> Result<&Configuration> {
        self.draft.as_ref().ok_or(CamrigError::NoDraftConfig)
    }

    fn runnable_ref(&self) -> Result<&Configuration> {
        self.runnable.as_ref().ok_or(CamrigError::NoRunnableConfig)
    }

    fn replace_draft(&mut self, draft: Configuration) {
        self.dirty = self.runnable.as_ref() != Some(&draft);
        self.draft = Some(draft);
    }

    // ========================================================================
    // Creation and Loading
    // ========================================================================

    /// Build an unbound draft from the expected roles and discovered devices
    pub fn create_default(&mut self, devices: &[DeviceDescriptor]) -> Result<&Configuration> {
        let config = Configuration::default_for(&self.expected, devices);
        validate_structure(&config, &self.expected).into_result()?;

        info!(
            roles = config.bindings.len(),
            devices = config.devices.len(),
            "Created default configuration"
        );
        self.draft = Some(config);
        self.dirty = false;
        self.draft_ref()
    }

    /// Read a configuration file into the draft
    ///
    /// A missing file is an error unless `auto_create` is set, in which case
    /// a default is created from `discovered`, promoted and written to
    /// `path`.
    pub fn load(&mut self, path: &Path, discovered: &[DeviceDescriptor]) -> Result<&Configuration> {
        let config = match read_config(path) {
            Ok(config) => config,
            Err(e) if e.is_not_found() && self.options.auto_create => {
                info!(path = ?path, "Configuration not found, creating default");
                self.path = Some(path.to_path_buf());
                self.create_default(discovered)?;
                self.promote(false)?;
                self.save()?;
                return self.draft_ref();
            }
            Err(e) => return Err(e),
        };

        if self.options.validate_on_load {
            validate_configuration(&config, &self.expected, None).into_result()?;
        }

        info!(
            path = ?path,
            version = %config.version,
            bindings = config.bindings.len(),
            devices = config.devices.len(),
            "Loaded configuration"
        );
        self.path = Some(path.to_path_buf());
        self.draft = Some(config);
        self.dirty = false;
        self.online.clear();
        self.draft_ref()
    }

    // ========================================================================
    // Reconciliation and Editing
    // ========================================================================

    /// Match the draft's bindings against the online devices
    ///
    /// The reconciled bindings and a refreshed device table replace the
    /// draft.
    pub fn reconcile(&mut self, online: &[DeviceDescriptor]) -> Result<MatchResult> {
        let draft = self.draft_ref()?;

        let mut engine = MatchEngine::with_expected_roles(
            draft.bindings.clone(),
            &self.expected,
            self.options.auto_bind,
        );
        let result = engine.default_match(online, None).clone();

        let mut next = draft.with_bindings(engine.into_bindings());
        next.devices = draft.refreshed_devices(online);

        self.online = online.to_vec();
        self.replace_draft(next);
        Ok(result)
    }

    /// Engine over a copy of the draft bindings and the last online list
    pub fn match_engine(&self) -> Result<MatchEngine> {
        let draft = self.draft_ref()?;
        let mut engine = MatchEngine::with_expected_roles(
            draft.bindings.clone(),
            &self.expected,
            self.options.auto_bind,
        );
        engine.set_online(&self.online);
        Ok(engine)
    }

    /// Fold bindings exported from an engine back into the draft
    pub fn replace_bindings(&mut self, bindings: Vec<RoleBinding>) -> Result<()> {
        let next = self.draft_ref()?.with_bindings(bindings);
        self.replace_draft(next);
        Ok(())
    }

    /// Clear `last_active_id` on every role except `keep` that still points
    /// at `device_id`
    ///
    /// Used after a manual bind so the next reconcile does not hand the
    /// device back to the role it was taken from. Returns the number of
    /// roles released.
    pub fn release_last_active(&mut self, device_id: &str, keep: Role) -> Result<usize> {
        let mut released = 0;
        self.update_draft(|config| {
            for binding in config.bindings.iter_mut().filter(|b| b.role != keep) {
                if binding.last_active_id.as_deref() == Some(device_id) {
                    debug!(
                        role = %binding.role,
                        device = %device_id,
                        "Released last active device"
                    );
                    binding.last_active_id = None;
                    released += 1;
                }
            }
        })?;
        Ok(released)
    }

    /// Edit a copy of the draft and replace it
    pub fn update_draft<F>(&mut self, updater: F) -> Result<()>
    where
        F: FnOnce(&mut Configuration),
    {
        let mut next = self.draft_ref()?.clone();
        updater(&mut next);
        self.replace_draft(next);
        Ok(())
    }

    // ========================================================================
    // Promotion
    // ========================================================================

    /// Validate the draft and make it the runnable snapshot
    ///
    /// Runtime checks against the last online list run only when
    /// `include_runtime` is set. On failure the runnable snapshot is left
    /// untouched.
    pub fn promote(&mut self, include_runtime: bool) -> Result<()> {
        let draft = self.draft_ref()?;
        let runtime = include_runtime.then_some(self.online.as_slice());

        if let Err(e) = validate_configuration(draft, &self.expected, runtime).into_result() {
            warn!(error = %e, "Promotion rejected");
            return Err(e);
        }

        if self.runnable.as_ref() == Some(draft) {
            debug!("Draft unchanged, runnable snapshot kept");
        } else {
            self.runnable = Some(draft.clone());
            info!(runtime_checks = include_runtime, "Promoted draft to runnable");
        }
        self.dirty = false;
        Ok(())
    }

    /// Discard draft edits, back to the runnable snapshot
    pub fn restore(&mut self) -> Result<()> {
        let runnable = self.runnable_ref()?.clone();
        self.draft = Some(runnable);
        self.dirty = false;
        debug!("Draft restored from runnable snapshot");
        Ok(())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write the runnable snapshot to the current path
    pub fn save(&self) -> Result<PathBuf> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| CamrigError::config("no configuration path set"))?;
        self.save_as(&path)?;
        Ok(path)
    }

    /// Write the runnable snapshot to another path
    ///
    /// The format follows the file extension. Active assignments are never
    /// written.
    pub fn save_as(&self, path: &Path) -> Result<()> {
        let runnable = self.runnable_ref()?;
        write_config(path, &runnable.without_active_ids())?;
        info!(path = ?path, "Saved configuration");
        Ok(())
    }

    // ========================================================================
    // Downstream Accessors
    // ========================================================================

    pub fn hardware(&self) -> Result<&HardwareConfig> {
        Ok(&self.runnable_ref()?.hardware)
    }

    pub fn display(&self) -> Result<&DisplayConfig> {
        Ok(&self.runnable_ref()?.display)
    }

    pub fn transport(&self) -> Result<&TransportConfig> {
        Ok(&self.runnable_ref()?.transport)
    }

    pub fn processing(&self) -> Result<&ProcessingConfig> {
        Ok(&self.runnable_ref()?.processing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{read_config, ConnectionState};
    use crate::engine::MatchStatus;
    use std::fs;
    use tempfile::TempDir;

    fn devices(ids: &[&str]) -> Vec<DeviceDescriptor> {
        ids.iter().map(|id| DeviceDescriptor::new(*id)).collect()
    }

    fn promoted(online: &[&str]) -> ConfigLifecycle {
        let mut lc = ConfigLifecycle::default();
        lc.create_default(&devices(online)).unwrap();
        lc.reconcile(&devices(online)).unwrap();
        lc.promote(true).unwrap();
        lc
    }

    #[test]
    fn test_create_default_sets_clean_draft() {
        let mut lc = ConfigLifecycle::default();
        let draft = lc.create_default(&devices(&["A"])).unwrap();
        assert_eq!(draft.bindings.len(), 2);
        assert!(lc.draft().is_some());
        assert!(lc.runnable().is_none());
        assert!(!lc.is_dirty());
    }

    #[test]
    fn test_accessors_require_runnable() {
        let mut lc = ConfigLifecycle::default();
        lc.create_default(&[]).unwrap();
        assert!(matches!(lc.hardware(), Err(CamrigError::NoRunnableConfig)));
        assert!(matches!(lc.processing(), Err(CamrigError::NoRunnableConfig)));

        lc.promote(false).unwrap();
        assert_eq!(lc.hardware().unwrap().width, 1280);
        assert_eq!(lc.transport().unwrap().interface, "can0");
        assert!(lc.display().unwrap().enabled);
    }

    #[test]
    fn test_operations_require_draft() {
        let mut lc = ConfigLifecycle::default();
        assert!(matches!(lc.reconcile(&[]), Err(CamrigError::NoDraftConfig)));
        assert!(matches!(lc.promote(false), Err(CamrigError::NoDraftConfig)));
        assert!(matches!(lc.restore(), Err(CamrigError::NoRunnableConfig)));
    }

    #[test]
    fn test_reconcile_marks_dirty_and_refreshes_devices() {
        let mut lc = ConfigLifecycle::default();
        lc.create_default(&devices(&["A", "OLD"])).unwrap();
        lc.promote(false).unwrap();

        let result = lc.reconcile(&devices(&["A", "B"])).unwrap();
        assert_eq!(result.status, MatchStatus::Full);
        assert!(lc.is_dirty());

        let draft = lc.draft().unwrap();
        assert_eq!(draft.devices["OLD"].state, ConnectionState::Unknown);
        assert_eq!(draft.devices["B"].state, ConnectionState::Connected);
        assert_eq!(draft.binding(Role::LeftCamera).unwrap().active_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_promote_idempotent() {
        let mut lc = promoted(&["A", "B"]);
        let before = lc.runnable().cloned();

        lc.promote(true).unwrap();
        assert_eq!(lc.runnable().cloned(), before);
        assert!(!lc.is_dirty());
    }

    #[test]
    fn test_failed_promote_keeps_runnable() {
        let mut lc = promoted(&["A", "B"]);
        let before = lc.runnable().cloned();

        lc.update_draft(|cfg| {
            cfg.processing.transforms.clear();
            cfg.hardware.frame_rate = 0;
        })
        .unwrap();
        assert!(lc.is_dirty());

        let err = lc.promote(false).unwrap_err();
        let errors = err.validation_errors().unwrap();
        assert!(errors.len() >= 2);
        assert_eq!(lc.runnable().cloned(), before);
        assert!(lc.is_dirty());
    }

    #[test]
    fn test_runtime_checks_are_opt_in() {
        let mut lc = promoted(&["A", "B"]);
        // Both roles on one device: only the runtime check notices
        lc.update_draft(|cfg| {
            cfg.bindings[1].active_id = Some("A".into());
        })
        .unwrap();

        assert!(lc.promote(true).is_err());
        assert!(lc.promote(false).is_ok());
    }

    #[test]
    fn test_restore_discards_edits() {
        let mut lc = promoted(&["A", "B"]);
        lc.update_draft(|cfg| cfg.display.window_title = "edited".into()).unwrap();
        assert!(lc.is_dirty());

        lc.restore().unwrap();
        assert!(!lc.is_dirty());
        assert_eq!(lc.draft(), lc.runnable());
    }

    #[test]
    fn test_update_back_to_runnable_clears_dirty() {
        let mut lc = promoted(&["A", "B"]);
        let original = lc.draft().unwrap().display.scale;
        lc.update_draft(|cfg| cfg.display.scale = 2.0).unwrap();
        assert!(lc.is_dirty());
        lc.update_draft(|cfg| cfg.display.scale = original).unwrap();
        assert!(!lc.is_dirty());
    }

    #[test]
    fn test_save_load_roundtrip_clears_active_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rig.json");

        let mut lc = promoted(&["A", "B"]);
        lc.set_path(&path);
        lc.save().unwrap();
        let saved = lc.runnable().unwrap().bindings.clone();

        let mut reloaded = ConfigLifecycle::default();
        let draft = reloaded.load(&path, &[]).unwrap();
        for (before, after) in saved.iter().zip(&draft.bindings) {
            assert!(after.active_id.is_none());
            assert_eq!(before.last_active_id, after.last_active_id);
            assert_eq!(before.historical_ids, after.historical_ids);
        }
        assert!(!reloaded.is_dirty());
    }

    #[test]
    fn test_load_missing_without_auto_create() {
        let tmp = TempDir::new().unwrap();
        let mut lc = ConfigLifecycle::default();
        let err = lc.load(&tmp.path().join("missing.json"), &[]).unwrap_err();
        assert!(err.is_not_found());
        assert!(lc.draft().is_none());
    }

    #[test]
    fn test_load_missing_with_auto_create_persists() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("rig.yaml");
        let mut lc = ConfigLifecycle::new(LifecycleOptions {
            auto_create: true,
            ..LifecycleOptions::default()
        });

        lc.load(&path, &devices(&["A"])).unwrap();
        assert!(path.exists());
        assert!(lc.runnable().is_some());
        assert_eq!(lc.path(), Some(path.as_path()));

        let on_disk = read_config(&path).unwrap();
        assert!(on_disk.devices.contains_key("A"));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rig.json");
        fs::write(
            &path,
            r#"{"version": "1.0", "bindings": {"left_camera": {}}, "devices": {}}"#,
        )
        .unwrap();

        let mut lc = ConfigLifecycle::default();
        let err = lc.load(&path, &[]).unwrap_err();
        assert!(err
            .validation_errors()
            .unwrap()
            .iter()
            .any(|e| e.contains("missing role 'right_camera'")));

        let mut lenient = ConfigLifecycle::new(LifecycleOptions {
            validate_on_load: false,
            ..LifecycleOptions::default()
        });
        assert!(lenient.load(&path, &[]).is_ok());
    }

    #[test]
    fn test_save_requires_runnable_and_path() {
        let mut lc = ConfigLifecycle::default();
        lc.create_default(&[]).unwrap();
        assert!(matches!(lc.save(), Err(CamrigError::Config(_))));

        let tmp = TempDir::new().unwrap();
        lc.set_path(tmp.path().join("rig.json"));
        assert!(matches!(lc.save(), Err(CamrigError::NoRunnableConfig)));
    }

    #[test]
    fn test_manual_edit_through_engine() {
        let mut lc = promoted(&["A", "B"]);

        let mut engine = lc.match_engine().unwrap();
        engine.swap(Role::LeftCamera, Role::RightCamera).unwrap();
        lc.replace_bindings(engine.export_bindings()).unwrap();
        assert!(lc.is_dirty());

        lc.promote(true).unwrap();
        let runnable = lc.runnable().unwrap();
        assert_eq!(runnable.binding(Role::LeftCamera).unwrap().active_id.as_deref(), Some("B"));
        assert_eq!(runnable.binding(Role::RightCamera).unwrap().active_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_released_device_stays_with_new_role() {
        let mut lc = promoted(&["A", "B"]);

        let mut engine = lc.match_engine().unwrap();
        engine.bind(Role::RightCamera, "A").unwrap();
        lc.replace_bindings(engine.export_bindings()).unwrap();
        assert_eq!(lc.release_last_active("A", Role::RightCamera).unwrap(), 1);

        let left = lc.draft().unwrap().binding(Role::LeftCamera).unwrap().clone();
        assert!(left.last_active_id.is_none());
        assert_eq!(left.historical_ids, vec!["A"]);

        let result = lc.reconcile(&devices(&["A", "B"])).unwrap();
        assert_eq!(result.device_for(Role::RightCamera), Some("A"));
        assert_eq!(result.device_for(Role::LeftCamera), Some("B"));
    }

    #[test]
    fn test_load_forgets_previous_online_list() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rig.json");
        let saved = promoted(&["A", "B"]);
        saved.save_as(&path).unwrap();

        let mut lc = promoted(&["C", "D"]);
        assert_eq!(lc.online().len(), 2);
        lc.load(&path, &[]).unwrap();
        assert!(lc.online().is_empty());
    }

    #[test]
    fn test_save_as_yaml_export() {
        let tmp = TempDir::new().unwrap();
        let lc = promoted(&["A", "B"]);
        let path = tmp.path().join("export.yml");
        lc.save_as(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("left_camera:"));
        assert!(lc.path().is_none());
    }
}
