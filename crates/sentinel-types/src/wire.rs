//! Wire messages exchanged with the game client.
//!
//! Every frame is one JSON object with a `type` discriminator:
//!
//! | Request | Reply |
//! |---------|-------|
//! | `{"type":"heartbeat","tick":N}` | `heartbeat_ack` |
//! | `{"type":"state_update","tick":N,"payload":{...}}` | `decision` |
//! | anything unparseable or rejected | `error` |
//!
//! Inbound frames are read through the permissive [`InboundEnvelope`] so
//! the transport can route on `type` before the payload is validated.
//! Outbound frames are the strongly-typed [`OutboundMessage`].

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Inbound `type` discriminators.
pub mod message_type {
    /// Liveness check, answered by the transport itself.
    pub const HEARTBEAT: &str = "heartbeat";
    /// A new world-state snapshot that needs a decision.
    pub const STATE_UPDATE: &str = "state_update";
}

/// Advisory label describing how degraded a tick's decision is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackMode {
    /// Subsystems ran and produced actions.
    Normal,
    /// Something failed badly; the client should play safe (e.g. stop moving).
    Defensive,
    /// Nothing to do, or nothing could be decided.
    Idle,
}

/// Reported health of the service in heartbeat replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Serving requests.
    Healthy,
}

/// Category of a structured error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The frame was not valid JSON.
    InvalidJson,
    /// The frame exceeded the configured size limit.
    FrameTooLarge,
    /// A `state_update` payload was missing or malformed.
    InvalidPayload,
    /// The `type` discriminator was missing or not recognised.
    UnknownMessageType,
    /// The decision pipeline failed outside any single subsystem.
    ProcessingError,
}

/// Body of an `error` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error category.
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// The decision produced for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Tick this decision answers.
    pub tick: u64,
    /// Actions sorted by ascending priority, capped per tick.
    pub actions: Vec<Action>,
    /// Degradation label.
    pub fallback_mode: FallbackMode,
    /// Wall-clock time spent producing the decision.
    pub processing_time_ms: f64,
    /// Advisory confidence in `[0, 1]`.
    pub confidence: f64,
}

impl DecisionResult {
    /// Nothing to do this tick.
    pub const fn idle(tick: u64, confidence: f64) -> Self {
        Self {
            tick,
            actions: Vec::new(),
            fallback_mode: FallbackMode::Idle,
            processing_time_ms: 0.0,
            confidence,
        }
    }
}

/// Permissive view of an inbound frame used for routing.
///
/// `payload: null` and a missing payload both read as `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundEnvelope {
    /// The `type` discriminator.
    #[serde(rename = "type", default)]
    pub message_type: Option<String>,
    /// Envelope tick, when present.
    #[serde(default)]
    pub tick: Option<u64>,
    /// Message-specific body.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl InboundEnvelope {
    /// Whether this frame is a heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.message_type.as_deref() == Some(message_type::HEARTBEAT)
    }
}

/// A reply frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Reply to a heartbeat.
    HeartbeatAck {
        /// Tick echoed from the heartbeat.
        client_tick: Option<u64>,
        /// Frames handled by the transport so far, including this one.
        messages_processed: u64,
        /// Error replies sent so far.
        errors: u64,
        /// Service health.
        status: HealthStatus,
    },
    /// Reply to a `state_update`.
    Decision(DecisionResult),
    /// Structured failure.
    Error {
        /// Tick of the failing request, when known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tick: Option<u64>,
        /// What went wrong.
        error: ErrorBody,
        /// How the client should degrade.
        fallback_mode: FallbackMode,
    },
}

impl OutboundMessage {
    /// A healthy heartbeat acknowledgement.
    pub const fn heartbeat_ack(
        client_tick: Option<u64>,
        messages_processed: u64,
        errors: u64,
    ) -> Self {
        Self::HeartbeatAck {
            client_tick,
            messages_processed,
            errors,
            status: HealthStatus::Healthy,
        }
    }

    /// An error reply telling the client to play safe.
    pub fn error(tick: Option<u64>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            tick,
            error: ErrorBody {
                kind,
                message: message.into(),
            },
            fallback_mode: FallbackMode::Defensive,
        }
    }

    /// Whether this reply reports a failure.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, priority};
    use crate::ids::ActorId;

    #[test]
    fn heartbeat_ack_wire_shape() {
        let ack = OutboundMessage::heartbeat_ack(Some(9), 4, 1);
        let json = serde_json::to_value(&ack).unwrap_or_default();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "heartbeat_ack",
                "client_tick": 9,
                "messages_processed": 4,
                "errors": 1,
                "status": "healthy"
            })
        );
    }

    #[test]
    fn error_wire_shape() {
        let reply = OutboundMessage::error(None, ErrorKind::InvalidJson, "expected value");
        let json = serde_json::to_value(&reply).unwrap_or_default();

        assert_eq!(json["type"], "error");
        assert_eq!(json["error"]["type"], "invalid_json");
        assert_eq!(json["error"]["message"], "expected value");
        assert_eq!(json["fallback_mode"], "defensive");
        assert!(json.get("tick").is_none());
    }

    #[test]
    fn decision_reply_decodes_back_with_order_preserved() {
        let result = DecisionResult {
            tick: 314,
            actions: vec![
                Action::flee(priority::EMERGENCY),
                Action::attack(ActorId::new(4), priority::COMBAT),
                Action::sit(priority::RECOVERY),
            ],
            fallback_mode: FallbackMode::Normal,
            processing_time_ms: 1.25,
            confidence: 1.0,
        };
        let text = serde_json::to_string(&OutboundMessage::Decision(result)).unwrap_or_default();
        assert!(text.contains("\"type\":\"decision\""));

        let decoded: OutboundMessage = serde_json::from_str(&text).unwrap();
        assert!(matches!(decoded, OutboundMessage::Decision(_)));
        let OutboundMessage::Decision(decoded) = decoded else {
            return;
        };
        assert_eq!(decoded.tick, 314);
        assert_eq!(decoded.actions.len(), 3);
        let kinds: Vec<ActionKind> = decoded.actions.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ActionKind::Flee, ActionKind::Attack, ActionKind::Sit]);
    }

    #[test]
    fn envelope_treats_null_payload_as_missing() {
        let json = serde_json::json!({ "type": "state_update", "payload": null });
        let envelope: InboundEnvelope = serde_json::from_value(json).unwrap_or_default();

        assert_eq!(envelope.message_type.as_deref(), Some(message_type::STATE_UPDATE));
        assert!(envelope.payload.is_none());
        assert!(envelope.tick.is_none());
        assert!(!envelope.is_heartbeat());
    }
}
