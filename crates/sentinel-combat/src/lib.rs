//! Built-in subsystems for the Sentinel decision service.
//!
//! # Modules
//!
//! - [`tactical`] -- [`TacticalController`], the combat state machine.
//! - [`recovery`] -- [`RecoverySubsystem`], resting out of combat.
//! - [`threat`] -- Threat score of the current surroundings.
//! - [`targeting`] -- Deterministic target scoring and selection.
//! - [`geometry`] -- Centroid and retreat-step helpers.
//! - [`config`] -- Thresholds, weights, and role profiles.
//!
//! [`TacticalController`]: tactical::TacticalController
//! [`RecoverySubsystem`]: recovery::RecoverySubsystem

pub mod config;
pub mod geometry;
pub mod recovery;
pub mod tactical;
pub mod targeting;
pub mod threat;

use sentinel_core::{RegistryError, Subsystem, SubsystemRegistry};

pub use config::{CombatConfig, RecoveryConfig, RoleProfile, RoleProfiles};
pub use recovery::RecoverySubsystem;
pub use tactical::{TacticalController, TacticalState};

/// Name under which the tactical controller is registered.
pub const COMBAT: &str = "combat";

/// Name under which the recovery subsystem is registered.
pub const RECOVERY: &str = "recovery";

/// Register the built-in subsystems in priority order: combat, then
/// recovery.
///
/// # Errors
///
/// Returns [`RegistryError::Duplicate`] if either name is already taken.
pub fn register_subsystems(
    registry: &mut SubsystemRegistry,
    combat: &CombatConfig,
    recovery: &RecoveryConfig,
) -> Result<(), RegistryError> {
    let combat = combat.clone();
    registry.register(COMBAT, move || {
        Ok(Box::new(TacticalController::new(combat.clone())) as Box<dyn Subsystem>)
    })?;

    let recovery = recovery.clone();
    registry.register(RECOVERY, move || {
        Ok(Box::new(RecoverySubsystem::new(recovery.clone())) as Box<dyn Subsystem>)
    })?;

    Ok(())
}
