//! Service assembly: backends, gate and lifecycle in one handle.

use crate::maintenance::MaintenanceTask;
use chronolock_core::{CapsuleId, Clock, GateConfig, GateResult};
use chronolock_security::{AccessGate, AccessOutcome, AccessRequest, GateStores};
use chronolock_store::{
    CapacityCounter, CapsuleGate, CapsuleProvider, MemoryAttemptLog, MemoryCapsuleStore,
    MemoryControlPlane, MemorySanctionLedger, MemoryStore, SharedStore,
};
use std::path::Path;
use std::sync::Arc;

/// A running gate over in-process backends.
///
/// Backends are connected once here and handed to the gate as trait
/// objects; nothing reaches them through globals.
pub struct GateService {
    config: GateConfig,
    pub(crate) shared: Arc<MemoryStore>,
    capsules: Arc<MemoryCapsuleStore>,
    attempts: Arc<MemoryAttemptLog>,
    control: Arc<MemoryControlPlane>,
    ledger: Arc<MemorySanctionLedger>,
    pub(crate) gate: AccessGate,
}

impl GateService {
    /// Validates the configuration and connects every backend.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::InvalidConfig`] for an
    /// inconsistent configuration.
    pub fn connect(config: GateConfig, clock: Arc<dyn Clock>) -> GateResult<Self> {
        config.validate()?;

        let shared = MemoryStore::connect(Arc::clone(&clock));
        let capsules = MemoryCapsuleStore::connect();
        let attempts = MemoryAttemptLog::connect();
        let control = MemoryControlPlane::connect(Arc::clone(&clock), shared.clone());
        let ledger = MemorySanctionLedger::connect();

        let stores = GateStores {
            shared: shared.clone(),
            capsules: capsules.clone(),
            attempts: attempts.clone(),
            control: control.clone(),
            ledger: ledger.clone(),
        };
        let gate = AccessGate::new(&config, stores, Arc::clone(&clock));

        tracing::info!(
            warning = config.escalation.warning,
            limit = config.escalation.limit,
            block = config.escalation.block,
            "gate service connected"
        );

        Ok(Self {
            config,
            shared,
            capsules,
            attempts,
            control,
            ledger,
            gate,
        })
    }

    /// Loads the configuration from a TOML file, then connects.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::InvalidConfig`] if the file
    /// cannot be read or is invalid.
    pub fn from_config_file(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> GateResult<Self> {
        Self::connect(GateConfig::load(path)?, clock)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The gate.
    #[must_use]
    pub const fn gate(&self) -> &AccessGate {
        &self.gate
    }

    /// Handles one access attempt.
    ///
    /// # Errors
    ///
    /// See [`AccessGate::attempt`].
    pub fn attempt(&self, request: &AccessRequest) -> GateResult<AccessOutcome> {
        self.gate.attempt(request)
    }

    /// Registers (or replaces) a capsule after checking its rule.
    ///
    /// # Errors
    ///
    /// Returns the rule's validation error.
    pub fn register_capsule(&self, capsule: CapsuleGate) -> GateResult<()> {
        capsule.rule.validate()?;
        tracing::debug!(
            capsule = %capsule.capsule_id,
            rule = ?capsule.rule.unlock_type,
            max_viewers = capsule.max_viewers,
            "capsule registered"
        );
        self.capsules.insert(capsule);
        Ok(())
    }

    /// Viewer counter of a capsule.
    ///
    /// # Errors
    ///
    /// Returns [`chronolock_core::GateError::StoreUnavailable`] once closed.
    pub fn capacity(&self, id: CapsuleId) -> GateResult<Option<CapacityCounter>> {
        Ok(self.capsules.capacity(id)?)
    }

    /// Purge task over this service's shared store.
    #[must_use]
    pub fn maintenance(&self) -> MaintenanceTask {
        MaintenanceTask::new(self.shared.clone(), self.config.maintenance.purge_interval())
    }

    /// Closes every backend. Later calls fail open or closed per their contract.
    pub fn close(&self) {
        self.shared.close();
        self.capsules.close();
        self.attempts.close();
        self.control.close();
        self.ledger.close();
        tracing::info!("gate service closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use chronolock_core::{
        Actor, GateError, GeoFence, GeoPoint, ManualClock, UnlockRule, UnlockType,
    };

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = GateConfig::default();
        config.escalation.block = 10;
        assert!(matches!(
            GateService::connect(config, clock()),
            Err(GateError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_register_rejects_malformed_rule() {
        let service = GateService::connect(GateConfig::default(), clock()).unwrap();
        let broken = CapsuleGate {
            capsule_id: CapsuleId(1),
            rule: UnlockRule {
                unlock_type: UnlockType::Location,
                unlock_at: None,
                unlock_until: None,
                fence: None,
            },
            max_viewers: 0,
        };
        assert_eq!(
            service.register_capsule(broken),
            Err(GateError::LocationConditionMissing)
        );
    }

    #[test]
    fn test_closed_service_fails_closed_on_capsules() {
        let service = GateService::connect(GateConfig::default(), clock()).unwrap();
        let plaza = GeoPoint::new(37.5665, 126.9780);
        service
            .register_capsule(CapsuleGate {
                capsule_id: CapsuleId(1),
                rule: UnlockRule::location(GeoFence::new(plaza, 100.0)),
                max_viewers: 3,
            })
            .unwrap();
        service.close();

        assert!(matches!(
            service.attempt(&AccessRequest::at(CapsuleId(1), Actor::member(1), plaza)),
            Err(GateError::StoreUnavailable(_))
        ));
        assert!(service.capacity(CapsuleId(1)).is_err());
    }
}
