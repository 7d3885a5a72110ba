//! The contract every decision-producing module implements.
//!
//! A subsystem looks at one [`GameStateSnapshot`] and proposes zero or
//! more [`Action`]s. Combat, recovery, economy, social -- they all plug
//! into the [`DecisionEngine`] through this one trait and never see each
//! other.
//!
//! Instances are built once (lazily, through the registry) and reused
//! for every tick, so a subsystem may keep private bookkeeping between
//! ticks. Only one tick is ever in flight, so that bookkeeping needs no
//! synchronisation.
//!
//! [`DecisionEngine`]: crate::engine::DecisionEngine

use sentinel_types::{Action, GameStateSnapshot};

/// Errors a subsystem can report.
///
/// Any of these only removes the failing subsystem's contribution for
/// the current tick; the engine keeps going with the others.
#[derive(Debug, thiserror::Error)]
pub enum SubsystemError {
    /// Construction or [`Subsystem::initialize`] failed.
    #[error("initialization failed: {0}")]
    Init(String),

    /// The snapshot lacked data this subsystem cannot work without.
    #[error("missing data: {0}")]
    MissingData(String),

    /// The subsystem's own logic failed.
    #[error("tick failed: {0}")]
    Tick(String),

    /// The subsystem panicked; the engine caught it.
    #[error("panicked: {0}")]
    Panicked(String),
}

/// A pluggable rule engine.
pub trait Subsystem: Send {
    /// Called once, right after construction and before the first tick.
    fn initialize(&mut self) -> Result<(), SubsystemError> {
        Ok(())
    }

    /// Propose actions for this tick.
    ///
    /// Returned actions keep their order when merged; ties in priority
    /// are resolved by that order.
    fn tick(&mut self, state: &GameStateSnapshot) -> Result<Vec<Action>, SubsystemError>;

    /// Called once when the engine shuts down.
    fn shutdown(&mut self) {}
}
