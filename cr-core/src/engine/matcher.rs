//! Role Matching Engine
//!
//! Assigns online devices to roles using what each binding remembers. The
//! binding collection is the single source of truth; the `MatchResult` is
//! re-derived from it after every mutation.

use std::collections::HashSet;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use super::result::{InvalidOperation, MatchResult, MatchSnapshot, MatchStatus, StartReadiness};
use crate::data::{DeviceDescriptor, Role, RoleBinding, EXPECTED_ROLES};

/// Device-to-role matcher for one configuration instance
#[derive(Debug, Clone)]
pub struct MatchEngine {
    bindings: Vec<RoleBinding>,
    expected: Vec<Role>,
    online: Vec<DeviceDescriptor>,
    auto_bind: bool,
    result: MatchResult,
}

impl MatchEngine {
    /// Take ownership of a binding collection, with the default role set
    pub fn new(bindings: Vec<RoleBinding>, auto_bind: bool) -> Self {
        Self::with_expected_roles(bindings, EXPECTED_ROLES, auto_bind)
    }

    pub fn with_expected_roles(
        bindings: Vec<RoleBinding>,
        expected: &[Role],
        auto_bind: bool,
    ) -> Self {
        let result = MatchResult::project(&bindings, expected, &[]);
        Self {
            bindings,
            expected: expected.to_vec(),
            online: Vec::new(),
            auto_bind,
            result,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn bindings(&self) -> &[RoleBinding] {
        &self.bindings
    }

    pub fn binding(&self, role: Role) -> Option<&RoleBinding> {
        self.bindings.iter().find(|b| b.role == role)
    }

    /// Online devices from the last `default_match`
    pub fn online(&self) -> &[DeviceDescriptor] {
        &self.online
    }

    pub fn result(&self) -> &MatchResult {
        &self.result
    }

    pub fn auto_bind(&self) -> bool {
        self.auto_bind
    }

    pub fn set_auto_bind(&mut self, enabled: bool) {
        self.auto_bind = enabled;
    }

    /// Replace the online list without re-matching
    ///
    /// Active assignments to devices that went offline are dropped.
    pub fn set_online(&mut self, online: &[DeviceDescriptor]) {
        self.online = dedup_online(online);
        for binding in &mut self.bindings {
            if let Some(id) = binding.active_id.as_deref() {
                if !is_online(&self.online, id) {
                    debug!(role = %binding.role, device = %id, "Dropping offline assignment");
                    binding.deactivate();
                }
            }
        }
        self.refresh();
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Reconcile the bindings against the online devices
    ///
    /// Replaces the binding collection first when `bindings` is given. Runs
    /// last-active, then history, then (if enabled) auto-bind. Each device
    /// is claimed by at most one role; earlier bindings win.
    pub fn default_match(
        &mut self,
        online: &[DeviceDescriptor],
        bindings: Option<Vec<RoleBinding>>,
    ) -> &MatchResult {
        if let Some(bindings) = bindings {
            self.bindings = bindings;
        }
        self.online = dedup_online(online);

        for binding in &mut self.bindings {
            binding.deactivate();
        }

        let candidate = MatchResult::project(&self.bindings, &self.expected, &self.online);
        if candidate.status == MatchStatus::Invalid {
            warn!(errors = ?candidate.errors, "Binding set is invalid, skipping match");
            self.result = candidate;
            return &self.result;
        }

        let mut claimed: HashSet<String> = HashSet::new();
        let online = &self.online;

        // Phase 1: last active device
        for binding in self.bindings.iter_mut() {
            let Some(last) = binding.last_active_id.clone() else {
                continue;
            };
            if is_online(online, &last) && claimed.insert(last.clone()) {
                debug!(role = %binding.role, device = %last, "Matched last active device");
                binding.activate(&last);
            }
        }

        // Phase 2: history, most recent first
        for binding in self.bindings.iter_mut().filter(|b| !b.is_bound()) {
            let pick = binding
                .historical_ids
                .iter()
                .find(|id| is_online(online, id) && !claimed.contains(id.as_str()))
                .cloned();
            if let Some(id) = pick {
                debug!(role = %binding.role, device = %id, "Matched historical device");
                claimed.insert(id.clone());
                binding.activate(&id);
            }
        }

        if self.auto_bind {
            self.assign_unclaimed(&mut claimed);
        }

        self.refresh();
        info!(
            status = %self.result.status,
            matched = self.result.matched.len(),
            unmatched = self.result.unmatched.len(),
            available = self.result.available.len(),
            "Role matching complete"
        );
        &self.result
    }

    /// Pair every unbound role with an unclaimed online device
    ///
    /// Roles in binding order, devices in discovery order. Returns how many
    /// roles were assigned. Does nothing for an invalid binding set.
    pub fn auto_assign(&mut self) -> usize {
        if self.result.status == MatchStatus::Invalid {
            return 0;
        }
        let mut claimed: HashSet<String> = self
            .bindings
            .iter()
            .filter_map(|b| b.active_id.clone())
            .collect();
        let assigned = self.assign_unclaimed(&mut claimed);
        self.refresh();
        assigned
    }

    fn assign_unclaimed(&mut self, claimed: &mut HashSet<String>) -> usize {
        let unclaimed: Vec<String> = self
            .online
            .iter()
            .filter(|dev| !claimed.contains(&dev.id))
            .map(|dev| dev.id.clone())
            .collect();

        let mut assigned = 0;
        let unbound = self.bindings.iter_mut().filter(|b| !b.is_bound());
        for (binding, id) in unbound.zip(unclaimed) {
            info!(role = %binding.role, device = %id, "Auto-bound device");
            claimed.insert(id.clone());
            binding.activate(&id);
            assigned += 1;
        }
        assigned
    }

    // ========================================================================
    // Manual Operations
    // ========================================================================

    /// Assign an online device to a role
    ///
    /// A device held by another role is released from it first.
    pub fn bind(&mut self, role: Role, device_id: &str) -> Result<(), InvalidOperation> {
        let idx = self.position(role)?;
        if !is_online(&self.online, device_id) {
            return Err(InvalidOperation::DeviceOffline(device_id.to_string()));
        }

        for other in self.bindings.iter_mut().filter(|b| b.role != role) {
            if other.active_id.as_deref() == Some(device_id) {
                debug!(
                    role = %other.role,
                    device = %device_id,
                    "Releasing device from previous role"
                );
                other.deactivate();
            }
        }

        self.bindings[idx].activate(device_id);
        info!(role = %role, device = %device_id, "Bound device");
        self.refresh();
        Ok(())
    }

    /// Clear a role's session assignment; history is kept
    pub fn unbind(&mut self, role: Role) -> Result<(), InvalidOperation> {
        let idx = self.position(role)?;
        self.bindings[idx].deactivate();
        info!(role = %role, "Unbound role");
        self.refresh();
        Ok(())
    }

    pub fn unbind_all(&mut self) {
        for binding in &mut self.bindings {
            binding.deactivate();
        }
        info!("Unbound all roles");
        self.refresh();
    }

    /// Exchange the devices of two bound roles
    ///
    /// Both roles must be bound to online devices. Swapping twice restores
    /// the original assignment.
    pub fn swap(&mut self, a: Role, b: Role) -> Result<(), InvalidOperation> {
        if a == b {
            return Err(InvalidOperation::SameRole(a));
        }
        let ia = self.position(a)?;
        let ib = self.position(b)?;

        let id_a = self.bindings[ia]
            .active_id
            .clone()
            .ok_or(InvalidOperation::RoleUnbound(a))?;
        let id_b = self.bindings[ib]
            .active_id
            .clone()
            .ok_or(InvalidOperation::RoleUnbound(b))?;

        for id in [&id_a, &id_b] {
            if !is_online(&self.online, id) {
                return Err(InvalidOperation::DeviceOffline(id.clone()));
            }
        }

        self.bindings[ia].activate(&id_b);
        self.bindings[ib].activate(&id_a);
        info!(role_a = %a, role_b = %b, "Swapped role devices");
        self.refresh();
        Ok(())
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    /// Start readiness of a result, the current one by default
    pub fn validate_result(&self, result: Option<&MatchResult>) -> StartReadiness {
        StartReadiness::assess(result.unwrap_or(&self.result))
    }

    /// Reconciled bindings for handing back to the configuration owner
    pub fn export_bindings(&self) -> Vec<RoleBinding> {
        self.bindings.clone()
    }

    pub fn into_bindings(self) -> Vec<RoleBinding> {
        self.bindings
    }

    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot::new(&self.bindings, &self.result)
    }

    /// Human-readable match summary
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Match status: {}", self.result.status);

        let width = self
            .bindings
            .iter()
            .map(|b| b.role.as_str().len())
            .max()
            .unwrap_or(0);
        for binding in &self.bindings {
            let target = match binding.active_id.as_deref() {
                Some(id) => match self.online.iter().find(|dev| dev.id == id) {
                    Some(dev) if dev.product_name.is_some() => {
                        format!("{} ({})", id, dev.display_name())
                    }
                    _ => id.to_string(),
                },
                None => "(unmatched)".to_string(),
            };
            let _ = writeln!(out, "  {:<width$} -> {}", binding.role.as_str(), target);
        }

        let available = self.result.available_ids();
        if available.is_empty() {
            let _ = writeln!(out, "Available devices: none");
        } else {
            let _ = writeln!(out, "Available devices: {}", available.join(", "));
        }

        let readiness = self.validate_result(None);
        if !readiness.issues.is_empty() {
            let label = if readiness.can_start { "Warnings" } else { "Blocking issues" };
            let _ = writeln!(out, "{}:", label);
            for issue in &readiness.issues {
                let _ = writeln!(out, "  {}", issue);
            }
        }
        out
    }

    fn position(&self, role: Role) -> Result<usize, InvalidOperation> {
        self.bindings
            .iter()
            .position(|b| b.role == role)
            .ok_or_else(|| InvalidOperation::UnknownRole(role.to_string()))
    }

    fn refresh(&mut self) {
        self.result = MatchResult::project(&self.bindings, &self.expected, &self.online);
    }
}

fn is_online(online: &[DeviceDescriptor], id: &str) -> bool {
    online.iter().any(|dev| dev.id == id)
}

/// First occurrence of each id wins, order kept
fn dedup_online(online: &[DeviceDescriptor]) -> Vec<DeviceDescriptor> {
    let mut seen = HashSet::new();
    online
        .iter()
        .filter(|dev| seen.insert(dev.id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices(ids: &[&str]) -> Vec<DeviceDescriptor> {
        ids.iter().map(|id| DeviceDescriptor::new(*id)).collect()
    }

    fn fresh_bindings() -> Vec<RoleBinding> {
        Role::ALL.iter().copied().map(RoleBinding::new).collect()
    }

    fn with_history(role: Role, last: Option<&str>, history: &[&str]) -> RoleBinding {
        RoleBinding {
            role,
            active_id: None,
            last_active_id: last.map(String::from),
            historical_ids: history.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn active(engine: &MatchEngine, role: Role) -> Option<String> {
        engine.binding(role).and_then(|b| b.active_id.clone())
    }

    #[test]
    fn test_auto_bind_full_match_from_empty_history() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        let result = engine.default_match(&devices(&["A", "B"]), None).clone();

        assert_eq!(result.status, MatchStatus::Full);
        assert!(result.available.is_empty());
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("A"));
        assert_eq!(active(&engine, Role::RightCamera).as_deref(), Some("B"));
        assert_eq!(engine.binding(Role::LeftCamera).unwrap().historical_ids, vec!["A"]);
        assert_eq!(engine.binding(Role::RightCamera).unwrap().historical_ids, vec!["B"]);
    }

    #[test]
    fn test_no_auto_bind_leaves_roles_unmatched() {
        let mut engine = MatchEngine::new(fresh_bindings(), false);
        let result = engine.default_match(&devices(&["A", "B"]), None);

        assert_eq!(result.status, MatchStatus::None);
        assert_eq!(result.available.len(), 2);
    }

    #[test]
    fn test_last_active_beats_history() {
        let bindings = vec![
            with_history(Role::LeftCamera, Some("A"), &["B", "A"]),
            RoleBinding::new(Role::RightCamera),
        ];
        let mut engine = MatchEngine::new(bindings, false);
        engine.default_match(&devices(&["B", "A"]), None);

        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("A"));
        assert_eq!(active(&engine, Role::RightCamera), None);
    }

    #[test]
    fn test_claimed_device_not_assigned_twice() {
        let bindings = vec![
            with_history(Role::LeftCamera, Some("A"), &["A"]),
            with_history(Role::RightCamera, Some("A"), &["A", "B"]),
        ];
        let mut engine = MatchEngine::new(bindings, false);
        let result = engine.default_match(&devices(&["A", "B"]), None);

        assert_eq!(result.status, MatchStatus::Full);
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("A"));
        assert_eq!(active(&engine, Role::RightCamera).as_deref(), Some("B"));
    }

    #[test]
    fn test_partial_scenario_warns_about_right() {
        let bindings = vec![
            with_history(Role::LeftCamera, None, &["devA"]),
            with_history(Role::RightCamera, None, &["devB"]),
        ];
        let mut engine = MatchEngine::new(bindings, false);
        let result = engine.default_match(&devices(&["devA"]), None).clone();

        assert_eq!(result.status, MatchStatus::Partial);
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("devA"));
        assert_eq!(result.unmatched_roles(), vec![Role::RightCamera]);

        let readiness = engine.validate_result(Some(&result));
        assert!(readiness.can_start);
        assert_eq!(readiness.issues.len(), 1);
        assert!(readiness.issues[0].contains("right"));
    }

    #[test]
    fn test_zero_online_devices_is_none() {
        let bindings = vec![
            with_history(Role::LeftCamera, Some("A"), &["A"]),
            with_history(Role::RightCamera, Some("B"), &["B"]),
        ];
        let mut engine = MatchEngine::new(bindings, true);
        let result = engine.default_match(&[], None);
        assert_eq!(result.status, MatchStatus::None);
        assert!(!engine.validate_result(None).can_start);
    }

    #[test]
    fn test_extra_devices_reported_available() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        let result = engine.default_match(&devices(&["A", "B", "C", "D"]), None);
        assert_eq!(result.status, MatchStatus::Full);
        assert_eq!(result.available_ids(), vec!["C", "D"]);
    }

    #[test]
    fn test_invalid_binding_set() {
        let bindings = vec![
            RoleBinding::new(Role::LeftCamera),
            RoleBinding::new(Role::LeftCamera),
        ];
        let mut engine = MatchEngine::new(bindings, true);
        let result = engine.default_match(&devices(&["A"]), None).clone();

        assert_eq!(result.status, MatchStatus::Invalid);
        assert!(!result.errors.is_empty());
        assert!(engine.bindings().iter().all(|b| !b.is_bound()));
        assert_eq!(engine.auto_assign(), 0);
    }

    #[test]
    fn test_default_match_replaces_bindings() {
        let mut engine = MatchEngine::new(vec![RoleBinding::new(Role::LeftCamera)], false);
        assert_eq!(engine.result().status, MatchStatus::Invalid);

        let bindings = vec![
            with_history(Role::LeftCamera, Some("A"), &["A"]),
            RoleBinding::new(Role::RightCamera),
        ];
        let result = engine.default_match(&devices(&["A"]), Some(bindings));
        assert_eq!(result.status, MatchStatus::Partial);
    }

    #[test]
    fn test_bind_releases_device_from_other_role() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        engine.default_match(&devices(&["A", "B"]), None);

        engine.bind(Role::RightCamera, "A").unwrap();
        assert_eq!(active(&engine, Role::RightCamera).as_deref(), Some("A"));
        assert_eq!(active(&engine, Role::LeftCamera), None);
        assert_eq!(engine.result().status, MatchStatus::Partial);
        assert_eq!(engine.result().available_ids(), vec!["B"]);
    }

    #[test]
    fn test_bind_rejects_offline_device() {
        let mut engine = MatchEngine::new(fresh_bindings(), false);
        engine.default_match(&devices(&["A"]), None);

        let err = engine.bind(Role::LeftCamera, "Z").unwrap_err();
        assert_eq!(err, InvalidOperation::DeviceOffline("Z".into()));
        assert_eq!(engine.result().status, MatchStatus::None);
    }

    #[test]
    fn test_bind_rejects_role_missing_from_bindings() {
        let mut engine = MatchEngine::new(vec![RoleBinding::new(Role::LeftCamera)], false);
        engine.default_match(&devices(&["A"]), None);

        let err = engine.bind(Role::RightCamera, "A").unwrap_err();
        assert_eq!(err, InvalidOperation::UnknownRole("right_camera".into()));
    }

    #[test]
    fn test_unbind_keeps_history() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        engine.default_match(&devices(&["A", "B"]), None);

        engine.unbind(Role::LeftCamera).unwrap();
        let left = engine.binding(Role::LeftCamera).unwrap();
        assert!(!left.is_bound());
        assert_eq!(left.last_active_id.as_deref(), Some("A"));
        assert_eq!(left.historical_ids, vec!["A"]);
        assert_eq!(engine.result().status, MatchStatus::Partial);
    }

    #[test]
    fn test_unbind_all_then_rematch_restores() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        let first = engine.default_match(&devices(&["A", "B"]), None).clone();

        engine.unbind_all();
        assert_eq!(engine.result().status, MatchStatus::None);

        engine.set_auto_bind(false);
        let second = engine.default_match(&devices(&["A", "B"]), None).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_swap_is_involution() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        engine.default_match(&devices(&["A", "B"]), None);

        engine.swap(Role::LeftCamera, Role::RightCamera).unwrap();
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("B"));
        assert_eq!(active(&engine, Role::RightCamera).as_deref(), Some("A"));
        assert_eq!(
            engine.binding(Role::LeftCamera).unwrap().last_active_id.as_deref(),
            Some("B")
        );

        engine.swap(Role::LeftCamera, Role::RightCamera).unwrap();
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("A"));
        assert_eq!(active(&engine, Role::RightCamera).as_deref(), Some("B"));
    }

    #[test]
    fn test_swap_rejects_unbound_and_same_role() {
        let mut engine = MatchEngine::new(fresh_bindings(), false);
        engine.default_match(&devices(&["A"]), None);
        engine.bind(Role::LeftCamera, "A").unwrap();

        assert_eq!(
            engine.swap(Role::LeftCamera, Role::RightCamera),
            Err(InvalidOperation::RoleUnbound(Role::RightCamera))
        );
        assert_eq!(
            engine.swap(Role::LeftCamera, Role::LeftCamera),
            Err(InvalidOperation::SameRole(Role::LeftCamera))
        );
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("A"));
    }

    #[test]
    fn test_auto_assign_after_manual_unbind() {
        let mut engine = MatchEngine::new(fresh_bindings(), false);
        engine.default_match(&devices(&["A", "B"]), None);
        engine.bind(Role::RightCamera, "A").unwrap();

        assert_eq!(engine.auto_assign(), 1);
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("B"));
        assert_eq!(engine.result().status, MatchStatus::Full);
    }

    #[test]
    fn test_set_online_keeps_live_assignments() {
        let mut bindings = fresh_bindings();
        bindings[0].activate("A");
        bindings[1].activate("B");
        let mut engine = MatchEngine::new(bindings, false);

        engine.set_online(&devices(&["A", "C"]));
        assert_eq!(active(&engine, Role::LeftCamera).as_deref(), Some("A"));
        assert_eq!(active(&engine, Role::RightCamera), None);
        assert_eq!(engine.result().status, MatchStatus::Partial);
        assert_eq!(engine.result().available_ids(), vec!["C"]);
    }

    #[test]
    fn test_duplicate_online_ids_collapse() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        let result = engine.default_match(&devices(&["A", "A"]), None);
        assert_eq!(result.status, MatchStatus::Partial);
        assert_eq!(engine.online().len(), 1);
    }

    #[test]
    fn test_summary_lists_roles_and_warnings() {
        let mut engine = MatchEngine::new(fresh_bindings(), false);
        let online = vec![DeviceDescriptor::new("A").with_product_name("StereoCam L")];
        engine.default_match(&online, None);
        engine.bind(Role::LeftCamera, "A").unwrap();

        let summary = engine.summary();
        assert!(summary.contains("Match status: partial"));
        assert!(summary.contains("left_camera  -> A (StereoCam L)"));
        assert!(summary.contains("right_camera -> (unmatched)"));
        assert!(summary.contains("Warnings:"));
    }

    #[test]
    fn test_export_bindings_carries_matches() {
        let mut engine = MatchEngine::new(fresh_bindings(), true);
        engine.default_match(&devices(&["A", "B"]), None);
        let exported = engine.export_bindings();
        assert!(exported.iter().all(|b| b.is_bound()));
        assert_eq!(exported, engine.into_bindings());
    }
}
