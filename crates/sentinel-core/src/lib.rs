//! Tick orchestration for the Sentinel decision service.
//!
//! This crate owns everything between a decoded inbound message and the
//! reply that goes back to the client:
//!
//! # Modules
//!
//! - [`subsystem`] -- The [`Subsystem`] contract every rule engine implements.
//! - [`registry`] -- Name-to-factory registry used to build subsystems lazily.
//! - [`engine`] -- [`DecisionEngine`]: fan-out, failure isolation, merge, rank.
//! - [`history`] -- Bounded ring buffer of past snapshots.
//! - [`stats`] -- Rolling processing-latency window.
//! - [`processor`] -- [`TickProcessor`]: parse, record, decide, reply.
//! - [`config`] -- Engine and processor configuration.
//!
//! [`Subsystem`]: subsystem::Subsystem
//! [`DecisionEngine`]: engine::DecisionEngine
//! [`TickProcessor`]: processor::TickProcessor

pub mod config;
pub mod engine;
pub mod history;
pub mod processor;
pub mod registry;
pub mod stats;
pub mod subsystem;

pub use config::{EngineConfig, ProcessorConfig};
pub use engine::{DecisionEngine, EngineError, SubsystemStatus};
pub use history::TickHistory;
pub use processor::{ParseError, ProcessorStats, TickProcessor};
pub use registry::{RegistryError, SubsystemFactory, SubsystemRegistry};
pub use stats::LatencyStats;
pub use subsystem::{Subsystem, SubsystemError};
