//! Shared type definitions for the Sentinel decision service.
//!
//! Everything that crosses the wire between the game client and the
//! decision pipeline is defined here, so the transport, the tick
//! processor, and every subsystem agree on one representation.
//!
//! # Modules
//!
//! - [`ids`] -- Newtype identifiers for actors, skills, and items
//! - [`action`] -- The flat [`Action`] command model and priority bands
//! - [`snapshot`] -- The per-tick [`GameStateSnapshot`] observed by the client
//! - [`wire`] -- Inbound envelope and outbound reply messages

pub mod action;
pub mod ids;
pub mod snapshot;
pub mod wire;

pub use action::{Action, ActionKind, priority, rank_actions};
pub use ids::{ActorId, ItemId, SkillId};
pub use snapshot::{
    Actor, ActorKind, CharacterState, GameStateSnapshot, InventoryItem, Position, Role,
    SNAPSHOT_SCHEMA_VERSION, SkillState,
};
pub use wire::{
    DecisionResult, ErrorBody, ErrorKind, FallbackMode, HealthStatus, InboundEnvelope,
    OutboundMessage, message_type,
};
