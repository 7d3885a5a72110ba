//! Sentinel decision service.
//!
//! The bridge sits between a game client and the decision pipeline. The
//! client pushes one world-state snapshot per tick over a lock-step
//! channel and waits for the decision before sending the next one.
//!
//! # Architecture
//!
//! ```text
//! client --frame--> IpcTransport --state_update--> TickProcessor --> DecisionEngine --> subsystems
//!        <--reply--              <--heartbeat_ack (answered in place)
//! ```
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`SENTINEL_CONFIG`, default `sentinel-config.yaml`)
//! 2. Apply `SENTINEL_*` environment overrides
//! 3. Initialize structured logging (tracing)
//! 4. Register subsystems and build the engine and processor
//! 5. Bind the endpoint and serve until Ctrl-C

mod config;
mod error;
mod shutdown;
mod transport;

use std::path::Path;

use anyhow::Context;
use sentinel_core::{DecisionEngine, SubsystemRegistry, TickProcessor};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH, LogFormat, LoggingConfig, ServiceConfig};
use crate::error::BridgeError;
use crate::shutdown::ShutdownSignal;
use crate::transport::{IpcTransport, TransportStats};

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the endpoint cannot
/// be bound.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH));
    let path = Path::new(&config_path);
    let found = path.exists();
    let config =
        load_config(path).with_context(|| format!("loading configuration from {config_path}"))?;

    init_logging(&config.logging);
    info!("sentinel-bridge starting");
    if found {
        info!(path = %config_path, "configuration loaded");
    } else {
        info!(path = %config_path, "config file not found, using defaults");
    }
    info!(
        endpoint = %config.transport.endpoint,
        max_actions_per_tick = config.engine.max_actions_per_tick,
        decision_budget_ms = config.processor.decision_budget_ms,
        history_capacity = config.processor.history_capacity,
        "effective configuration"
    );

    let shutdown = ShutdownSignal::new();
    spawn_ctrl_c_handler(shutdown.clone());

    let stats = run(config, shutdown).await?;
    info!(
        messages_processed = stats.messages_processed,
        errors = stats.errors,
        "sentinel-bridge stopped"
    );
    Ok(())
}

/// File (or defaults), then `SENTINEL_*` overrides.
fn load_config(path: &Path) -> Result<ServiceConfig, BridgeError> {
    let mut config = ServiceConfig::load(path)?;
    config.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Build the pipeline and serve until `shutdown` fires.
async fn run(
    config: ServiceConfig,
    shutdown: ShutdownSignal,
) -> Result<TransportStats, BridgeError> {
    let processor = build_processor(&config)?;
    let transport = IpcTransport::new(config.transport, processor);
    Ok(transport.start(shutdown).await?)
}

/// Register the built-in subsystems and wrap them in an engine and processor.
fn build_processor(config: &ServiceConfig) -> Result<TickProcessor, BridgeError> {
    let mut registry = SubsystemRegistry::new();
    sentinel_combat::register_subsystems(&mut registry, &config.combat, &config.recovery)?;
    info!(
        subsystems = ?registry.names().collect::<Vec<_>>(),
        "subsystems registered"
    );

    let engine = DecisionEngine::new(registry, &config.engine);
    Ok(TickProcessor::new(engine, &config.processor))
}

/// Trigger `shutdown` on Ctrl-C.
fn spawn_ctrl_c_handler(shutdown: ShutdownSignal) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("ctrl-c received");
                shutdown.trigger();
            }
            Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
        }
    });
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match config.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use sentinel_types::OutboundMessage;

    use super::*;

    #[test]
    fn default_pipeline_decides() {
        let mut processor = build_processor(&ServiceConfig::default()).unwrap();

        let reply = processor.process_frame(
            r#"{"type":"state_update","tick":3,"payload":{"character":{"hp":10,"hp_max":100,"x":4,"y":4}}}"#,
        );

        let OutboundMessage::Decision(result) = reply else {
            panic!("expected a decision, got {reply:?}");
        };
        assert_eq!(result.tick, 3);
        assert_eq!(result.actions.first().map(|a| a.priority), Some(10));
    }

    #[test]
    fn disabled_subsystems_stay_unloaded() {
        let yaml = "engine:\n  subsystems:\n    recovery: false\n";
        let config = ServiceConfig::parse(yaml).unwrap();
        let mut processor = build_processor(&config).unwrap();

        processor.process_frame(
            r#"{"type":"state_update","tick":1,"payload":{"character":{"hp":40,"hp_max":100,"x":0,"y":0}}}"#,
        );

        let status = processor.engine().status();
        assert_eq!(status.get("recovery").map(|s| s.loaded), Some(false));
        assert_eq!(status.get("combat").map(|s| s.loaded), Some(true));
    }
}
