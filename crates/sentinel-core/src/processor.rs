//! Turns inbound messages into decision replies.
//!
//! The [`TickProcessor`] owns the [`DecisionEngine`], the [`TickHistory`],
//! and the [`LatencyStats`]. For each `state_update` it parses the
//! snapshot, records it, runs the engine against the processing budget,
//! and wraps the outcome into an [`OutboundMessage`].
//!
//! Every failure mode is answered with a structured `error` reply; nothing
//! here propagates an error to the transport. A payload that does not
//! parse is never recorded in the history.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use chrono::Utc;
use sentinel_types::{
    ErrorKind, GameStateSnapshot, InboundEnvelope, OutboundMessage, message_type,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::ProcessorConfig;
use crate::engine::{DecisionEngine, panic_message};
use crate::history::TickHistory;
use crate::stats::{LatencyStats, duration_ms};

/// Why an inbound message could not be turned into a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The frame was not JSON at all.
    #[error("frame is not valid JSON: {0}")]
    Json(serde_json::Error),

    /// The frame was JSON but not a message envelope.
    #[error("malformed message envelope: {0}")]
    Envelope(serde_json::Error),

    /// `payload` was absent or `null`.
    #[error("state_update carries no payload")]
    MissingPayload,

    /// Neither the payload nor the envelope carried a tick.
    #[error("state_update carries no tick")]
    MissingTick,

    /// The payload did not match the snapshot schema.
    #[error("invalid snapshot: {0}")]
    Snapshot(serde_json::Error),
}

/// Counters and latency figures reported by [`TickProcessor::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorStats {
    /// Snapshots that reached the decision engine.
    pub ticks_processed: u64,
    /// Messages rejected before a snapshot was built.
    pub parse_errors: u64,
    /// Decisions that failed outside any single subsystem.
    pub processing_errors: u64,
    /// Most recent tick seen.
    pub last_tick: Option<u64>,
    /// Snapshots currently retained.
    pub history_len: usize,
    /// Maximum snapshots retained.
    pub history_capacity: usize,
    /// Mean processing time over the stats window.
    pub avg_processing_ms: f64,
    /// Worst processing time over the stats window.
    pub max_processing_ms: f64,
    /// Ticks over budget this session.
    pub budget_violations: u64,
    /// Processing budget in milliseconds.
    pub budget_ms: f64,
}

/// Per-tick orchestrator between the transport and the decision engine.
#[derive(Debug)]
pub struct TickProcessor {
    engine: DecisionEngine,
    history: TickHistory,
    latency: LatencyStats,
    budget: Duration,
    last_tick: Option<u64>,
    ticks_processed: u64,
    parse_errors: u64,
    processing_errors: u64,
}

impl TickProcessor {
    /// Wrap an engine with a history and latency window sized by `config`.
    pub fn new(engine: DecisionEngine, config: &ProcessorConfig) -> Self {
        let budget = config.decision_budget();
        Self {
            engine,
            history: TickHistory::new(config.history_capacity),
            latency: LatencyStats::new(config.stats_window, duration_ms(budget)),
            budget,
            last_tick: None,
            ticks_processed: 0,
            parse_errors: 0,
            processing_errors: 0,
        }
    }

    /// Handle one raw text frame.
    pub fn process_frame(&mut self, frame: &str) -> OutboundMessage {
        match serde_json::from_str::<Value>(frame) {
            Ok(message) => self.process_message(&message),
            Err(e) => {
                self.parse_errors = self.parse_errors.saturating_add(1);
                let err = ParseError::Json(e);
                warn!(error = %err, "rejected frame");
                OutboundMessage::error(None, ErrorKind::InvalidJson, err.to_string())
            }
        }
    }

    /// Handle one decoded message and produce its reply.
    ///
    /// Only `state_update` is understood here; heartbeats are answered by
    /// the transport before they reach the processor.
    pub fn process_message(&mut self, message: &Value) -> OutboundMessage {
        if let Some(kind) = message.get("type").filter(|kind| !kind.is_string()) {
            let tick = message.get("tick").and_then(Value::as_u64);
            return self.unsupported(tick, &kind.to_string());
        }

        let envelope = match InboundEnvelope::deserialize(message) {
            Ok(envelope) => envelope,
            Err(e) => return self.reject(None, &ParseError::Envelope(e)),
        };

        if envelope.message_type.as_deref() != Some(message_type::STATE_UPDATE) {
            let kind = format!("{:?}", envelope.message_type);
            return self.unsupported(envelope.tick, &kind);
        }

        let envelope_tick = envelope.tick;
        match parse_snapshot(envelope) {
            Ok(snapshot) => self.decide(snapshot),
            Err(e) => self.reject(envelope_tick, &e),
        }
    }

    /// Record the snapshot and run the engine on it.
    fn decide(&mut self, snapshot: GameStateSnapshot) -> OutboundMessage {
        let tick = snapshot.tick;
        if let Some(last) = self.last_tick.filter(|&last| tick < last) {
            warn!(tick, last_tick = last, "tick went backwards, processing anyway");
        }
        self.last_tick = Some(tick);
        self.ticks_processed = self.ticks_processed.saturating_add(1);

        if let Some(captured_at) = snapshot.timestamp {
            let age_ms = Utc::now().timestamp_millis().saturating_sub(captured_at);
            debug!(tick, age_ms, "snapshot received");
        }

        let started = Instant::now();
        let deadline = started.checked_add(self.budget);
        self.history.push(snapshot);

        let Some(latest) = self.history.latest() else {
            self.processing_errors = self.processing_errors.saturating_add(1);
            return OutboundMessage::error(
                Some(tick),
                ErrorKind::ProcessingError,
                "snapshot history is empty",
            );
        };
        let engine = &mut self.engine;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.decide(latest, deadline)));

        let elapsed_ms = duration_ms(started.elapsed());
        if self.latency.record(elapsed_ms) {
            warn!(
                tick,
                elapsed_ms,
                budget_ms = self.latency.budget_ms(),
                "decision exceeded processing budget"
            );
        }

        match outcome {
            Ok(Ok(mut result)) => {
                result.processing_time_ms = elapsed_ms;
                debug!(
                    tick,
                    actions = result.actions.len(),
                    fallback_mode = ?result.fallback_mode,
                    elapsed_ms,
                    "decision ready"
                );
                OutboundMessage::Decision(result)
            }
            Ok(Err(e)) => {
                self.processing_errors = self.processing_errors.saturating_add(1);
                error!(tick, error = %e, "decision failed");
                OutboundMessage::error(Some(tick), ErrorKind::ProcessingError, e.to_string())
            }
            Err(payload) => {
                self.processing_errors = self.processing_errors.saturating_add(1);
                let message = panic_message(payload.as_ref());
                error!(tick, panic = %message, "decision pipeline panicked");
                OutboundMessage::error(
                    Some(tick),
                    ErrorKind::ProcessingError,
                    format!("decision pipeline panicked: {message}"),
                )
            }
        }
    }

    fn unsupported(&mut self, tick: Option<u64>, kind: &str) -> OutboundMessage {
        self.parse_errors = self.parse_errors.saturating_add(1);
        warn!(message_type = kind, tick = ?tick, "unsupported message type");
        OutboundMessage::error(
            tick,
            ErrorKind::UnknownMessageType,
            format!("unsupported message type {kind}"),
        )
    }

    fn reject(&mut self, tick: Option<u64>, err: &ParseError) -> OutboundMessage {
        self.parse_errors = self.parse_errors.saturating_add(1);
        warn!(tick = ?tick, error = %err, "rejected state_update");
        OutboundMessage::error(tick, ErrorKind::InvalidPayload, err.to_string())
    }

    /// Snapshots retained so far.
    pub const fn history(&self) -> &TickHistory {
        &self.history
    }

    /// The wrapped engine.
    pub const fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Current counters and latency figures.
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            ticks_processed: self.ticks_processed,
            parse_errors: self.parse_errors,
            processing_errors: self.processing_errors,
            last_tick: self.last_tick,
            history_len: self.history.len(),
            history_capacity: self.history.capacity(),
            avg_processing_ms: self.latency.average_ms(),
            max_processing_ms: self.latency.max_ms(),
            budget_violations: self.latency.violations(),
            budget_ms: self.latency.budget_ms(),
        }
    }

    /// Shut the engine down and log a session summary. Idempotent.
    pub fn shutdown(&mut self) {
        if self.engine.is_shut_down() {
            return;
        }
        self.engine.shutdown();
        let stats = self.stats();
        info!(
            ticks_processed = stats.ticks_processed,
            parse_errors = stats.parse_errors,
            processing_errors = stats.processing_errors,
            budget_violations = stats.budget_violations,
            avg_processing_ms = stats.avg_processing_ms,
            "tick processor shut down"
        );
    }
}

/// Build a snapshot from a `state_update` envelope.
///
/// The envelope tick is authoritative, so the reply always answers the
/// tick the client sent; the payload's own `tick` is only used when the
/// envelope has none.
fn parse_snapshot(envelope: InboundEnvelope) -> Result<GameStateSnapshot, ParseError> {
    let Some(mut payload) = envelope.payload else {
        return Err(ParseError::MissingPayload);
    };
    if let Some(fields) = payload.as_object_mut() {
        match envelope.tick {
            Some(tick) => {
                let replaced = fields.insert(String::from("tick"), Value::from(tick));
                let payload_tick = replaced.as_ref().and_then(Value::as_u64);
                if let Some(payload_tick) = payload_tick.filter(|&t| t != tick) {
                    debug!(tick, payload_tick, "payload tick overridden by envelope tick");
                }
            }
            None if !fields.contains_key("tick") => return Err(ParseError::MissingTick),
            None => {}
        }
    }
    serde_json::from_value(payload).map_err(ParseError::Snapshot)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use sentinel_types::{Action, FallbackMode, priority};
    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::registry::SubsystemRegistry;
    use crate::subsystem::{Subsystem, SubsystemError};

    struct AlwaysSit;

    impl Subsystem for AlwaysSit {
        fn tick(&mut self, _state: &GameStateSnapshot) -> Result<Vec<Action>, SubsystemError> {
            Ok(vec![Action::sit(priority::RECOVERY)])
        }
    }

    fn processor() -> TickProcessor {
        let mut registry = SubsystemRegistry::new();
        registry
            .register("recovery", || Ok(Box::new(AlwaysSit) as Box<dyn Subsystem>))
            .unwrap();
        let engine = DecisionEngine::new(registry, &EngineConfig::default());
        TickProcessor::new(engine, &ProcessorConfig::default())
    }

    fn character() -> Value {
        json!({ "hp": 80, "hp_max": 100, "x": 10, "y": 12 })
    }

    #[test]
    fn payload_inherits_envelope_tick() {
        let mut processor = processor();
        let reply = processor.process_message(&json!({
            "type": "state_update",
            "tick": 41,
            "payload": { "character": character() }
        }));

        assert!(matches!(reply, OutboundMessage::Decision(ref r) if r.tick == 41));
        assert_eq!(processor.history().latest().map(|s| s.tick), Some(41));
    }

    #[test]
    fn reply_answers_the_envelope_tick() {
        let mut processor = processor();
        let reply = processor.process_message(&json!({
            "type": "state_update",
            "tick": 7,
            "payload": { "tick": 3, "character": character() }
        }));

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "decision");
        assert_eq!(json["tick"], 7);
        assert_eq!(processor.history().latest().map(|s| s.tick), Some(7));
        assert_eq!(processor.stats().last_tick, Some(7));
    }

    #[test]
    fn non_string_type_is_unknown() {
        let mut processor = processor();
        let reply = processor.process_message(&json!({ "type": 5, "tick": 8 }));

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["error"]["type"], "unknown_message_type");
        assert_eq!(json["tick"], 8);
        assert_eq!(processor.stats().parse_errors, 1);
        assert!(processor.history().is_empty());
    }

    #[test]
    fn missing_tick_everywhere_is_rejected() {
        let mut processor = processor();
        let reply = processor.process_message(&json!({
            "type": "state_update",
            "payload": { "character": character() }
        }));

        let OutboundMessage::Error { error, .. } = reply else {
            panic!("expected an error reply, got {reply:?}");
        };
        assert_eq!(error.kind, ErrorKind::InvalidPayload);
        assert!(processor.history().is_empty());
        assert_eq!(processor.stats().parse_errors, 1);
    }

    #[test]
    fn unknown_type_is_reported_with_its_tick() {
        let mut processor = processor();
        let reply = processor.process_message(&json!({ "type": "teleport", "tick": 3 }));

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["tick"], 3);
        assert_eq!(json["error"]["type"], "unknown_message_type");
        assert_eq!(json["fallback_mode"], "defensive");
    }

    #[test]
    fn backwards_tick_is_still_processed() {
        let mut processor = processor();
        for tick in [10, 9] {
            let reply = processor.process_message(&json!({
                "type": "state_update",
                "payload": { "tick": tick, "character": character() }
            }));
            assert!(!reply.is_error());
        }

        let stats = processor.stats();
        assert_eq!(stats.ticks_processed, 2);
        assert_eq!(stats.last_tick, Some(9));
    }

    #[test]
    fn shut_down_engine_answers_processing_error() {
        let mut processor = processor();
        processor.shutdown();
        processor.shutdown();

        let reply = processor.process_frame(
            r#"{"type":"state_update","tick":1,"payload":{"character":{"hp":1,"hp_max":1,"x":0,"y":0}}}"#,
        );

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["error"]["type"], "processing_error");
        assert_eq!(processor.stats().processing_errors, 1);
    }

    #[test]
    fn decision_reports_measured_time() {
        let mut processor = processor();
        let reply = processor.process_frame(
            r#"{"type":"state_update","tick":5,"payload":{"character":{"hp":5,"hp_max":10,"x":1,"y":1}}}"#,
        );

        let OutboundMessage::Decision(result) = reply else {
            panic!("expected a decision, got {reply:?}");
        };
        assert_eq!(result.fallback_mode, FallbackMode::Normal);
        assert!(result.processing_time_ms >= 0.0);
        assert_eq!(processor.stats().history_len, 1);
    }

    #[test]
    fn garbage_frame_is_invalid_json() {
        let mut processor = processor();
        let reply = processor.process_frame("{not json");

        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["error"]["type"], "invalid_json");
        assert!(processor.history().is_empty());
    }
}
