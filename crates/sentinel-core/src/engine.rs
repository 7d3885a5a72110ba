//! The decision engine: runs every enabled subsystem and merges their
//! proposals into one ranked action list.
//!
//! # Pipeline (per tick)
//!
//! 1. Walk subsystems in registry-declared order, skipping disabled ones.
//! 2. Build each subsystem on first use and cache it.
//! 3. Call `tick`; an error or a panic only drops that subsystem's
//!    contribution for this tick.
//! 4. Concatenate proposals in emission order, stable-sort by priority,
//!    truncate to `max_actions_per_tick`.
//! 5. No actions at all (nothing enabled, everything failed, or nothing to
//!    do) yields an empty `idle` result.
//!
//! If the processing deadline passes between two subsystems, the rest are
//! skipped and whatever was already collected is returned.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use sentinel_types::{Action, DecisionResult, FallbackMode, GameStateSnapshot, rank_actions};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::registry::{SubsystemFactory, SubsystemRegistry};
use crate::stats::duration_ms;
use crate::subsystem::{Subsystem, SubsystemError};

/// Errors that abort a whole decision rather than one subsystem.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// [`DecisionEngine::shutdown`] already ran.
    #[error("decision engine has been shut down")]
    ShutDown,
}

/// Diagnostic view of one registered subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubsystemStatus {
    /// Enabled by configuration.
    pub enabled: bool,
    /// Currently constructed and cached.
    pub loaded: bool,
    /// Ticks on which this subsystem failed (build, init, tick, or panic).
    pub failures: u64,
}

/// A registered subsystem and its cached instance.
struct SubsystemSlot {
    name: String,
    enabled: bool,
    factory: SubsystemFactory,
    instance: Option<Box<dyn Subsystem>>,
    failures: u64,
}

impl SubsystemSlot {
    /// Build and initialize the subsystem unless it is already cached.
    fn ensure_loaded(&mut self) -> Result<(), SubsystemError> {
        if self.instance.is_some() {
            return Ok(());
        }
        let mut instance = guarded(|| (self.factory)())?;
        guarded(|| instance.initialize())?;
        info!(subsystem = %self.name, "subsystem loaded");
        self.instance = Some(instance);
        Ok(())
    }

    /// Run one tick of this subsystem behind the panic guard.
    ///
    /// A panicking instance is discarded and rebuilt on a later tick.
    fn run(&mut self, state: &GameStateSnapshot) -> Result<Vec<Action>, SubsystemError> {
        self.ensure_loaded()?;
        let Some(instance) = self.instance.as_mut() else {
            return Err(SubsystemError::Init(format!("{} is not loaded", self.name)));
        };
        let outcome = guarded(|| instance.tick(state));
        if matches!(outcome, Err(SubsystemError::Panicked(_))) {
            self.instance = None;
        }
        outcome
    }
}

/// Composes registered subsystems into one decision per tick.
pub struct DecisionEngine {
    slots: Vec<SubsystemSlot>,
    max_actions_per_tick: usize,
    shut_down: bool,
}

impl DecisionEngine {
    /// Create an engine over the registry's subsystems.
    ///
    /// Nothing is constructed yet; each subsystem is built on first use.
    pub fn new(registry: SubsystemRegistry, config: &EngineConfig) -> Self {
        let slots: Vec<SubsystemSlot> = registry
            .into_entries()
            .into_iter()
            .map(|entry| SubsystemSlot {
                enabled: config.is_enabled(&entry.name),
                name: entry.name,
                factory: entry.factory,
                instance: None,
                failures: 0,
            })
            .collect();

        for slot in &slots {
            info!(
                subsystem = %slot.name,
                enabled = slot.enabled,
                "subsystem registered"
            );
        }

        Self {
            slots,
            max_actions_per_tick: config.max_actions_per_tick,
            shut_down: false,
        }
    }

    /// Decide on actions for one snapshot.
    ///
    /// `deadline` is checked between subsystems; once it has passed the
    /// remaining subsystems are skipped for this tick.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ShutDown`] after [`shutdown`](Self::shutdown).
    /// Individual subsystem failures never surface here.
    pub fn decide(
        &mut self,
        state: &GameStateSnapshot,
        deadline: Option<Instant>,
    ) -> Result<DecisionResult, EngineError> {
        if self.shut_down {
            return Err(EngineError::ShutDown);
        }

        let started = Instant::now();
        let mut actions: Vec<Action> = Vec::new();
        let mut attempted: u32 = 0;
        let mut succeeded: u32 = 0;

        for slot in self.slots.iter_mut().filter(|slot| slot.enabled) {
            if attempted > 0 && deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    tick = state.tick,
                    next_subsystem = %slot.name,
                    "decision deadline passed, skipping remaining subsystems"
                );
                break;
            }

            attempted = attempted.saturating_add(1);
            match slot.run(state) {
                Ok(mut proposed) => {
                    succeeded = succeeded.saturating_add(1);
                    debug!(
                        tick = state.tick,
                        subsystem = %slot.name,
                        proposed = proposed.len(),
                        "subsystem ticked"
                    );
                    actions.append(&mut proposed);
                }
                Err(e) => {
                    slot.failures = slot.failures.saturating_add(1);
                    warn!(
                        tick = state.tick,
                        subsystem = %slot.name,
                        error = %e,
                        "subsystem failed, contributing no actions this tick"
                    );
                }
            }
        }

        rank_actions(&mut actions, self.max_actions_per_tick);

        let confidence = if attempted == 0 {
            0.0
        } else {
            f64::from(succeeded) / f64::from(attempted)
        };
        let processing_time_ms = duration_ms(started.elapsed());

        if actions.is_empty() {
            return Ok(DecisionResult {
                processing_time_ms,
                ..DecisionResult::idle(state.tick, confidence)
            });
        }
        Ok(DecisionResult {
            tick: state.tick,
            actions,
            fallback_mode: FallbackMode::Normal,
            processing_time_ms,
            confidence,
        })
    }

    /// Enabled/loaded flags and failure counts keyed by subsystem name.
    pub fn status(&self) -> BTreeMap<String, SubsystemStatus> {
        self.slots
            .iter()
            .map(|slot| {
                (
                    slot.name.clone(),
                    SubsystemStatus {
                        enabled: slot.enabled,
                        loaded: slot.instance.is_some(),
                        failures: slot.failures,
                    },
                )
            })
            .collect()
    }

    /// Upper bound on actions per decision.
    pub const fn max_actions_per_tick(&self) -> usize {
        self.max_actions_per_tick
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub const fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Run every loaded subsystem's shutdown hook and release it.
    ///
    /// Idempotent. Later calls to [`decide`](Self::decide) fail with
    /// [`EngineError::ShutDown`].
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        for slot in &mut self.slots {
            if let Some(mut instance) = slot.instance.take() {
                let outcome = guarded(|| {
                    instance.shutdown();
                    Ok(())
                });
                if let Err(e) = outcome {
                    warn!(subsystem = %slot.name, error = %e, "subsystem shutdown hook failed");
                }
                info!(subsystem = %slot.name, "subsystem released");
            }
        }
    }
}

impl Drop for DecisionEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("subsystems", &self.status())
            .field("max_actions_per_tick", &self.max_actions_per_tick)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

/// Run subsystem code, converting a panic into [`SubsystemError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T, SubsystemError>) -> Result<T, SubsystemError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(SubsystemError::Panicked(panic_message(payload.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}
