//! Lock-step request/reply transport.
//!
//! One TCP peer at a time; every frame is one JSON object terminated by
//! `\n`. The loop reads a frame, answers it, and only then reads the
//! next one, so there is never more than one tick in flight.
//!
//! Heartbeats are answered here from the transport's own counters and
//! never reach the [`TickProcessor`]. Everything else is handed to the
//! processor, which always produces a reply.
//!
//! Receives poll with `recv_timeout_ms` so a shutdown request is noticed
//! between frames. A reply that cannot be sent within `send_timeout_ms`
//! drops the connection; the listener keeps accepting.
//!
//! Frames must be UTF-8; anything else is answered as `invalid_json`.

use std::io;
use std::net::SocketAddr;
use std::str::Utf8Error;
use std::time::Duration;

use sentinel_core::TickProcessor;
use sentinel_types::{ErrorKind, OutboundMessage, message_type};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::shutdown::ShutdownSignal;

/// First pause after a failed `accept`; doubles per consecutive failure.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Longest pause between failed `accept` calls.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Sent when a reply cannot be serialized.
const FALLBACK_REPLY: &str = r#"{"type":"error","error":{"type":"processing_error","message":"reply serialization failed"},"fallback_mode":"defensive"}"#;

/// Counters reported when the transport stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames handled, heartbeats included.
    pub messages_processed: u64,
    /// Error replies sent.
    pub errors: u64,
    /// Replies that failed or timed out on send.
    pub send_failures: u64,
    /// Peers accepted.
    pub connections: u64,
}

impl TransportStats {
    /// Error replies plus failed sends; the `errors` figure of a
    /// heartbeat ack.
    pub const fn total_errors(&self) -> u64 {
        self.errors.saturating_add(self.send_failures)
    }
}

/// Frames in, replies out.
#[derive(Debug)]
pub struct IpcTransport {
    config: TransportConfig,
    processor: TickProcessor,
    stats: TransportStats,
}

impl IpcTransport {
    /// Wrap a processor; nothing is bound yet.
    pub fn new(config: TransportConfig, processor: TickProcessor) -> Self {
        Self {
            config,
            processor,
            stats: TransportStats::default(),
        }
    }

    /// Bind the configured endpoint and serve until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the endpoint is unusable or cannot
    /// be bound. The processor is shut down on every path.
    pub async fn start(self, shutdown: ShutdownSignal) -> Result<TransportStats, TransportError> {
        Ok(self.bind().await?.serve(shutdown).await)
    }

    /// Bind the configured endpoint.
    ///
    /// # Errors
    ///
    /// As for [`start`](Self::start). On failure the processor has already
    /// been shut down.
    pub async fn bind(mut self) -> Result<BoundTransport, TransportError> {
        let listener = match bind_listener(&self.config.endpoint).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(endpoint = %self.config.endpoint, error = %e, "transport failed to bind");
                self.processor.shutdown();
                return Err(e);
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.processor.shutdown();
                return Err(TransportError::Bind {
                    addr: self.config.endpoint.clone(),
                    source,
                });
            }
        };

        info!(endpoint = %self.config.endpoint, %addr, "transport bound");
        Ok(BoundTransport {
            transport: self,
            socket: BoundSocket { listener, addr },
        })
    }

    /// Answer one frame and return the encoded reply, newline excluded.
    pub fn handle_frame(&mut self, frame: &str) -> String {
        self.stats.messages_processed = self.stats.messages_processed.saturating_add(1);
        debug!(bytes = frame.len(), "frame received");

        let reply = match serde_json::from_str::<Value>(frame) {
            Ok(message) if is_heartbeat(&message) => OutboundMessage::heartbeat_ack(
                message.get("tick").and_then(Value::as_u64),
                self.stats.messages_processed,
                self.stats.total_errors(),
            ),
            Ok(message) => self.processor.process_message(&message),
            Err(e) => {
                warn!(error = %e, "frame is not valid JSON");
                OutboundMessage::error(None, ErrorKind::InvalidJson, e.to_string())
            }
        };
        self.encode(&reply)
    }

    /// Reply to a frame that exceeded `max_frame_bytes`.
    fn reject_oversized(&mut self) -> String {
        self.stats.messages_processed = self.stats.messages_processed.saturating_add(1);
        warn!(max_frame_bytes = self.config.max_frame_bytes, "frame too large, discarded");
        let reply = OutboundMessage::error(
            None,
            ErrorKind::FrameTooLarge,
            format!("frame exceeds {} bytes", self.config.max_frame_bytes),
        );
        self.encode(&reply)
    }

    /// Reply to a frame whose bytes are not UTF-8, so not JSON text.
    fn reject_not_utf8(&mut self, err: Utf8Error) -> String {
        self.stats.messages_processed = self.stats.messages_processed.saturating_add(1);
        warn!(error = %err, "frame is not valid UTF-8");
        let reply = OutboundMessage::error(
            None,
            ErrorKind::InvalidJson,
            format!("frame is not valid UTF-8: {err}"),
        );
        self.encode(&reply)
    }

    fn encode(&mut self, reply: &OutboundMessage) -> String {
        if reply.is_error() {
            self.stats.errors = self.stats.errors.saturating_add(1);
        }
        serde_json::to_string(reply).unwrap_or_else(|e| {
            error!(error = %e, "failed to serialize reply");
            FALLBACK_REPLY.to_owned()
        })
    }

    /// Counters so far.
    pub const fn stats(&self) -> TransportStats {
        self.stats
    }

    async fn accept_loop(&mut self, listener: &TcpListener, shutdown: &ShutdownSignal) {
        let mut backoff = ACCEPT_BACKOFF_MIN;
        while !shutdown.is_triggered() {
            let accepted = tokio::select! {
                () = shutdown.wait() => break,
                accepted = listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, peer)) => {
                    backoff = ACCEPT_BACKOFF_MIN;
                    self.stats.connections = self.stats.connections.saturating_add(1);
                    info!(%peer, "client connected");
                    self.serve_connection(stream, shutdown).await;
                    info!(%peer, "client disconnected");
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms = backoff.as_millis(), "accept failed");
                    tokio::select! {
                        () = shutdown.wait() => break,
                        () = tokio::time::sleep(backoff) => {}
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }
    }

    async fn serve_connection(&mut self, stream: TcpStream, shutdown: &ShutdownSignal) {
        let (read_half, write_half) = stream.into_split();
        self.exchange(BufReader::new(read_half), write_half, shutdown).await;
    }

    /// Lock-step loop for one peer. Returns when the peer goes away, a
    /// send fails, or shutdown is requested.
    async fn exchange<R, W>(&mut self, mut reader: R, mut writer: W, shutdown: &ShutdownSignal)
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut frame = FrameBuffer::new(self.config.max_frame_bytes);
        let recv_timeout = self.config.recv_timeout();
        let send_timeout = self.config.send_timeout();

        loop {
            if shutdown.is_triggered() {
                break;
            }
            let received = tokio::select! {
                () = shutdown.wait() => break,
                received = timeout(recv_timeout, frame.read_from(&mut reader)) => received,
            };

            let reply = match received {
                // Poll interval elapsed; partial bytes stay buffered.
                Err(_elapsed) => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "receive failed");
                    break;
                }
                Ok(Ok(FrameRead::Closed)) => break,
                Ok(Ok(FrameRead::TooLarge)) => self.reject_oversized(),
                Ok(Ok(FrameRead::NotUtf8(err))) => self.reject_not_utf8(err),
                Ok(Ok(FrameRead::Frame(text))) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    self.handle_frame(&text)
                }
            };

            match timeout(send_timeout, write_reply(&mut writer, &reply)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    self.stats.send_failures = self.stats.send_failures.saturating_add(1);
                    warn!(error = %e, "send failed, dropping connection");
                    break;
                }
                Err(_elapsed) => {
                    self.stats.send_failures = self.stats.send_failures.saturating_add(1);
                    warn!(
                        send_timeout_ms = self.config.send_timeout_ms,
                        "send timed out, dropping connection"
                    );
                    break;
                }
            }
        }
    }
}

/// A transport holding a bound listener.
#[derive(Debug)]
pub struct BoundTransport {
    transport: IpcTransport,
    socket: BoundSocket,
}

impl BoundTransport {
    /// The address actually bound (resolves port `0`).
    pub const fn local_addr(&self) -> SocketAddr {
        self.socket.addr
    }

    /// Serve peers until `shutdown` fires, then release the listener and
    /// shut the processor down.
    pub async fn serve(self, shutdown: ShutdownSignal) -> TransportStats {
        info!(addr = %self.local_addr(), "transport serving");
        let Self {
            mut transport,
            socket,
        } = self;

        transport.accept_loop(&socket.listener, &shutdown).await;

        drop(socket);
        transport.processor.shutdown();
        let stats = transport.stats();
        info!(
            messages_processed = stats.messages_processed,
            errors = stats.errors,
            send_failures = stats.send_failures,
            connections = stats.connections,
            "transport stopped"
        );
        stats
    }
}

/// Listener guard; logs the release when dropped.
#[derive(Debug)]
struct BoundSocket {
    listener: TcpListener,
    addr: SocketAddr,
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        info!(addr = %self.addr, "endpoint released");
    }
}

/// Result of reading towards the next newline.
#[derive(Debug, PartialEq, Eq)]
enum FrameRead {
    /// A complete frame, newline and trailing `\r` removed.
    Frame(String),
    /// A complete frame that exceeded the size limit; its bytes were dropped.
    TooLarge,
    /// A complete frame whose bytes are not UTF-8.
    NotUtf8(Utf8Error),
    /// The peer closed the connection.
    Closed,
}

/// Accumulates one frame across cancelled reads.
#[derive(Debug)]
struct FrameBuffer {
    bytes: Vec<u8>,
    limit: usize,
    oversized: bool,
}

impl FrameBuffer {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            oversized: false,
        }
    }

    /// Read until the next newline or EOF.
    ///
    /// Cancel safe: buffered bytes are kept in `self` and consumed from the
    /// reader in the same step, so dropping the future loses nothing.
    async fn read_from<R>(&mut self, reader: &mut R) -> io::Result<FrameRead>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                if !self.bytes.is_empty() {
                    debug!(bytes = self.bytes.len(), "peer closed mid-frame");
                }
                self.bytes.clear();
                self.oversized = false;
                return Ok(FrameRead::Closed);
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let chunk_len = newline.unwrap_or(available.len());
            let chunk = available.get(..chunk_len).unwrap_or_default();
            if !self.oversized {
                if self.bytes.len().saturating_add(chunk.len()) > self.limit {
                    self.oversized = true;
                    self.bytes.clear();
                } else {
                    self.bytes.extend_from_slice(chunk);
                }
            }
            let consumed = newline.map_or(chunk_len, |_| chunk_len.saturating_add(1));
            reader.consume(consumed);

            if newline.is_some() {
                return Ok(self.take());
            }
        }
    }

    fn take(&mut self) -> FrameRead {
        if std::mem::take(&mut self.oversized) {
            self.bytes.clear();
            return FrameRead::TooLarge;
        }
        let mut bytes = std::mem::take(&mut self.bytes);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(text) => FrameRead::Frame(text),
            Err(e) => FrameRead::NotUtf8(e.utf8_error()),
        }
    }
}

async fn write_reply<W>(writer: &mut W, reply: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(reply.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

async fn bind_listener(endpoint: &str) -> Result<TcpListener, TransportError> {
    let addr = parse_endpoint(endpoint)?;
    let bound = TcpListener::bind(addr.as_str()).await;
    bound.map_err(|source| TransportError::Bind { addr, source })
}

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(ACCEPT_BACKOFF_MAX)
}

fn is_heartbeat(message: &Value) -> bool {
    message.get("type").and_then(Value::as_str) == Some(message_type::HEARTBEAT)
}

/// Turn a configured endpoint into a bindable `host:port`.
///
/// Accepts `tcp://host:port` and bare `host:port`; `*` means every
/// interface. Other schemes (`ipc://`, `inproc://`) are rejected.
fn parse_endpoint(endpoint: &str) -> Result<String, TransportError> {
    let address = match endpoint.split_once("://") {
        Some(("tcp", rest)) => rest,
        Some(_) => return Err(TransportError::UnsupportedEndpoint(endpoint.to_owned())),
        None => endpoint,
    };
    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(TransportError::InvalidEndpoint(endpoint.to_owned()));
    };
    if port.parse::<u16>().is_err() {
        return Err(TransportError::InvalidEndpoint(endpoint.to_owned()));
    }
    let host = match host {
        "*" | "" => "0.0.0.0",
        other => other,
    };
    Ok(format!("{host}:{port}"))
}
