//! The live security policy: active profile plus per-site overrides.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::audit::{AuditEvent, AuditLog};
use crate::config::PolicySettings;
use crate::errors::{KioskVaultError, Result};

use super::profile::{check_login_duration, PolicyOverride, PolicySnapshot, SecurityProfile};

#[derive(Debug, Default)]
struct PolicyState {
    profile: SecurityProfile,
    overrides: HashMap<String, Arc<PolicyOverride>>,
}

/// Resolves effective toggles for a site.
///
/// State sits behind one `RwLock`; `resolve` copies the profile and
/// clones the override `Arc` under a read guard, so it never sees a
/// half-applied update.
#[derive(Debug, Default)]
pub struct SecurityPolicy {
    state: RwLock<PolicyState>,
    audit: Option<Arc<AuditLog>>,
}

impl SecurityPolicy {
    pub fn new(profile: SecurityProfile) -> Self {
        Self {
            state: RwLock::new(PolicyState {
                profile,
                overrides: HashMap::new(),
            }),
            audit: None,
        }
    }

    /// Build and validate a policy from the `[policy]` config section.
    pub fn from_settings(settings: &PolicySettings) -> Result<Self> {
        let policy = Self::new(settings.profile);
        {
            let mut state = policy.write_state();
            for (site, overrides) in &settings.overrides {
                state
                    .overrides
                    .insert(site.clone(), Arc::new(overrides.clone()));
            }
        }
        policy.validate()?;
        Ok(policy)
    }

    /// Record a `policy_override` audit event on every `set_overrides`.
    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn profile(&self) -> SecurityProfile {
        self.read_state().profile
    }

    pub fn set_profile(&self, profile: SecurityProfile) {
        self.write_state().profile = profile;
        tracing::debug!(profile = profile.as_str(), "security profile changed");
    }

    /// Replace the override record for `site_id`.  Last write wins.
    pub fn set_overrides(&self, site_id: &str, overrides: PolicyOverride) -> Result<()> {
        if site_id.trim().is_empty() {
            return Err(KioskVaultError::validation("site id", "cannot be empty"));
        }
        let setting = overrides.set_fields().join(",");
        self.write_state()
            .overrides
            .insert(site_id.to_string(), Arc::new(overrides));

        if let Some(ref audit) = self.audit {
            audit.record(AuditEvent::policy_override(site_id, &setting));
        }
        Ok(())
    }

    /// Drop a site's overrides.  Returns `true` if one was present.
    pub fn remove_overrides(&self, site_id: &str) -> bool {
        self.write_state().overrides.remove(site_id).is_some()
    }

    pub fn overrides_for(&self, site_id: &str) -> Option<Arc<PolicyOverride>> {
        self.read_state().overrides.get(site_id).cloned()
    }

    /// Site ids that carry overrides, sorted.
    pub fn sites(&self) -> Vec<String> {
        let mut sites: Vec<String> = self.read_state().overrides.keys().cloned().collect();
        sites.sort();
        sites
    }

    /// Materialize the toggles for `site_id` (or the bare profile).
    pub fn resolve(&self, site_id: Option<&str>) -> PolicySnapshot {
        let (profile, overrides) = {
            let state = self.read_state();
            let overrides = site_id.and_then(|s| state.overrides.get(s).cloned());
            (state.profile, overrides)
        };

        let baseline = profile.baseline();
        match overrides {
            Some(o) => o.apply(baseline),
            None => baseline,
        }
    }

    /// Check the baseline and every override for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        let state = self.read_state();
        check_login_duration(
            state.profile.baseline().max_login_duration_secs,
            &format!("profile '{}'", state.profile),
        )?;

        let mut sites: Vec<&String> = state.overrides.keys().collect();
        sites.sort();
        for site in sites {
            if let Some(secs) = state.overrides[site].max_login_duration_secs {
                check_login_duration(secs, &format!("site '{site}'"))?;
            }
        }
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, PolicyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, PolicyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEventType, AuditFilter, DEFAULT_MAX_BYTES};
    use tempfile::TempDir;

    #[test]
    fn resolve_without_override_is_baseline() {
        let policy = SecurityPolicy::new(SecurityProfile::Strict);
        assert_eq!(policy.resolve(Some("kiosk-a")), SecurityProfile::Strict.baseline());
        assert_eq!(policy.resolve(None), SecurityProfile::Strict.baseline());
    }

    #[test]
    fn override_applies_only_to_its_site() {
        let policy = SecurityPolicy::new(SecurityProfile::Standard);
        policy
            .set_overrides(
                "site-a",
                PolicyOverride {
                    allow_cookie_restore: Some(false),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();

        assert!(!policy.resolve(Some("site-a")).allow_cookie_restore);
        assert!(policy.resolve(Some("site-b")).allow_cookie_restore);
    }

    #[test]
    fn set_overrides_is_last_write_wins() {
        let policy = SecurityPolicy::new(SecurityProfile::Standard);
        policy
            .set_overrides(
                "s",
                PolicyOverride {
                    strict_tls: Some(false),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();
        policy
            .set_overrides(
                "s",
                PolicyOverride {
                    allow_devtools_cookie_ops: Some(true),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();

        let snap = policy.resolve(Some("s"));
        assert!(snap.strict_tls, "earlier override must not be merged");
        assert!(snap.allow_devtools_cookie_ops);
    }

    #[test]
    fn profile_change_moves_baseline_under_overrides() {
        let policy = SecurityPolicy::new(SecurityProfile::Relaxed);
        policy
            .set_overrides(
                "s",
                PolicyOverride {
                    max_login_duration_secs: Some(600),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();
        policy.set_profile(SecurityProfile::Strict);

        let snap = policy.resolve(Some("s"));
        assert!(!snap.allow_cookie_restore);
        assert_eq!(snap.max_login_duration_secs, 600);
    }

    #[test]
    fn remove_overrides_restores_baseline() {
        let policy = SecurityPolicy::new(SecurityProfile::Standard);
        policy
            .set_overrides(
                "s",
                PolicyOverride {
                    strict_tls: Some(false),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();
        assert!(policy.remove_overrides("s"));
        assert!(!policy.remove_overrides("s"));
        assert!(policy.resolve(Some("s")).strict_tls);
    }

    #[test]
    fn validate_rejects_out_of_range_override() {
        let policy = SecurityPolicy::new(SecurityProfile::Standard);
        policy.validate().unwrap();
        policy
            .set_overrides(
                "s",
                PolicyOverride {
                    max_login_duration_secs: Some(0),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();

        let err = policy.validate().unwrap_err();
        assert!(matches!(err, KioskVaultError::PolicyConfiguration(_)));
        // resolve still works; validation is configuration-time only.
        assert_eq!(policy.resolve(Some("s")).max_login_duration_secs, 0);
    }

    #[test]
    fn set_overrides_writes_audit_event() {
        let dir = TempDir::new().unwrap();
        let audit =
            Arc::new(AuditLog::open(&dir.path().join("audit.log"), DEFAULT_MAX_BYTES, 2).unwrap());
        let policy = SecurityPolicy::new(SecurityProfile::Standard).with_audit(audit.clone());
        policy
            .set_overrides(
                "lobby",
                PolicyOverride {
                    strict_tls: Some(false),
                    ..PolicyOverride::default()
                },
            )
            .unwrap();

        let events = audit
            .read_events(&AuditFilter {
                event_type: Some(AuditEventType::PolicyOverride),
                ..AuditFilter::default()
            })
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.site_id.as_deref(), Some("lobby"));
        assert_eq!(events[0].event.setting.as_deref(), Some("strict_tls"));
    }
}
