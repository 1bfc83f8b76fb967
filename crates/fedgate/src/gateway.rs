// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! The local cluster's connection to the WAN router.
//!
//! Messages handed to [`Gateway::forward_to_gateway`] are encoded and
//! funneled through the [`Bundler`] to the router, which relays them to the
//! other clusters attached to it. A dedicated receiver thread decodes
//! inbound frames (unbundling composite frames one level), reconstructs
//! local messages and hands them to the cluster's
//! [`ClusterEndpoint`](crate::cluster::ClusterEndpoint).
//!
//! # Lifecycle
//!
//! ```text
//!   Disconnected --connect()--> Handshaking --ok--> Connected
//!        ^                          |                   |
//!        +------(handshake err)-----+                   |
//!        +-------------------disconnect()---------------+
//! ```
//!
//! Connecting runs the three-message handshake: the router sends a WELCOME
//! frame (human-readable banner) and a READY frame, and the gateway answers
//! with its own READY. Two threads are then started: the bundler's flush
//! timer for sending and the receiver for inbound traffic.
//!
//! Disconnect drains the bundler (bounded wait), closes the socket - which
//! is what releases the receiver thread from its blocking read - and joins
//! the receiver. Reconnecting afterwards builds a fresh connection.
//!
//! # Failure posture
//!
//! WAN problems never surface as errors into the local cluster's delivery
//! path: forwarding is fire-and-forget, flush failures drop data with a log,
//! and a dead WAN link simply means far-side federates stop receiving
//! updates. Recovery (reconnection) is the responsibility of a higher-level
//! supervisor.

use std::io::Write;
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::bundler::Bundler;
use crate::byte_stream::ByteStream;
use crate::cluster::{ClusterEndpoint, ClusterMessage, ControlKind, ControlMessage};
use crate::config::WanConfig;
use crate::error::{GatewayError, WireError};
use crate::frame::{read_frame, BundleIter, Frame, FrameType, SenderId};
use crate::metrics::{format_size, GatewayMetrics};
use crate::net;

// ============================================================================
// Gateway
// ============================================================================

/// Owns the WAN router connection for one local cluster.
pub struct Gateway {
    config: WanConfig,
    cluster: Arc<dyn ClusterEndpoint>,
    metrics: Arc<GatewayMetrics>,

    bundler: Bundler,
    socket: Option<Box<dyn ByteStream>>,
    receiver: Option<JoinHandle<()>>,

    /// Set before the socket is closed so the receiver can tell an expected
    /// teardown from a WAN fault.
    closing: Arc<AtomicBool>,
    connected: AtomicBool,
}

impl Gateway {
    /// Create a gateway for the given cluster. No connection is made until
    /// [`connect`](Gateway::connect).
    pub fn new(config: WanConfig, cluster: Arc<dyn ClusterEndpoint>) -> Gateway {
        let metrics = Arc::new(GatewayMetrics::new());
        let bundler = Bundler::new(&config, Arc::clone(&metrics));
        if !config.bundling {
            log::debug!("[Gateway] message bundling disabled for WAN");
        }

        Gateway {
            config,
            cluster,
            metrics,
            bundler,
            socket: None,
            receiver: None,
            closing: Arc::new(AtomicBool::new(false)),
            connected: AtomicBool::new(false),
        }
    }

    /// Gateway traffic statistics.
    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    /// Whether the gateway currently holds a live router connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Whether outgoing messages are being bundled.
    pub fn is_bundling(&self) -> bool {
        self.bundler.is_bundling()
    }

    /// Toggle outgoing message bundling at runtime.
    pub fn set_bundling(&self, bundling: bool) {
        self.bundler.set_bundling(bundling);
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Resolve the configured router address, open the connection and
    /// complete the handshake. No-op when already connected.
    pub fn connect(&mut self) -> Result<(), GatewayError> {
        if self.is_connected() {
            return Ok(());
        }

        let address = net::resolve_router(&self.config.router_address)?;
        log::debug!("[Gateway] opening connection to WAN router: {}", address);

        let stream =
            net::open_router_stream(address, &self.config).map_err(|source| {
                GatewayError::ConnectFailed {
                    address: address.to_string(),
                    source,
                }
            })?;
        log::debug!("[Gateway] connection to WAN router successful: {}", address);

        self.connect_with_stream(Box::new(stream))
    }

    /// Complete the handshake over an already-open stream and start the
    /// sending and receiving machinery. No-op when already connected.
    ///
    /// Handshake sequence: read WELCOME (banner logged), read READY, write
    /// READY back.
    pub fn connect_with_stream(
        &mut self,
        mut stream: Box<dyn ByteStream>,
    ) -> Result<(), GatewayError> {
        if self.is_connected() {
            return Ok(());
        }

        let welcome = read_frame(&mut *stream, self.config.max_frame_size)?;
        if welcome.frame_type != FrameType::Welcome {
            return Err(GatewayError::Handshake(format!(
                "received {}, expected WELCOME",
                welcome.frame_type
            )));
        }
        log::info!(
            "[WanRouter]: {}",
            String::from_utf8_lossy(&welcome.payload)
        );

        let ready = read_frame(&mut *stream, self.config.max_frame_size)?;
        if ready.frame_type != FrameType::Ready {
            return Err(GatewayError::Handshake(format!(
                "received {}, expected READY",
                ready.frame_type
            )));
        }

        stream.write_all(&Frame::bare(FrameType::Ready).encode())?;
        stream.flush()?;

        // split the connection: receiver reads, bundler writes
        let reader = stream.try_clone_stream()?;
        let writer = stream.try_clone_stream()?;

        self.closing.store(false, Ordering::Relaxed);
        let context = ReceiverContext {
            cluster: Arc::clone(&self.cluster),
            metrics: Arc::clone(&self.metrics),
            closing: Arc::clone(&self.closing),
            max_frame_size: self.config.max_frame_size,
        };
        self.receiver = Some(
            thread::Builder::new()
                .name("wan-receiver".to_string())
                .spawn(move || receiver_loop(reader, context))?,
        );

        self.bundler.connect(writer)?;

        self.socket = Some(stream);
        self.connected.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Break off the connection with the WAN router.
    ///
    /// Drains the bundler (bounded wait), closes the socket - which releases
    /// the receiver thread from its blocking read - joins the receiver, and
    /// logs final statistics. No-op when already disconnected; `connect` may
    /// be called again afterwards.
    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }

        // stop sending to the router
        self.bundler.disconnect();

        self.closing.store(true, Ordering::Relaxed);
        if let Some(socket) = self.socket.take() {
            log::debug!("[Gateway] closing WAN router socket");
            if let Err(e) = socket.shutdown(Shutdown::Both) {
                // the receiver must still be joined regardless
                log::warn!("[Gateway] error while closing WAN router socket: {}", e);
            }
        }

        if let Some(receiver) = self.receiver.take() {
            if receiver.join().is_err() {
                log::warn!("[Gateway] receiver thread did not shut down cleanly");
            }
        }

        let stats = self.metrics.snapshot();
        log::info!("[Gateway] WAN gateway shut down");
        log::info!(
            "[Gateway]     sent: {} ({} messages)",
            format_size(stats.bytes_to_wan),
            stats.messages_to_wan
        );
        log::info!(
            "[Gateway] received: {} ({} messages)",
            format_size(stats.bytes_from_wan),
            stats.messages_from_wan
        );

        self.connected.store(false, Ordering::Relaxed);
    }

    // ========================================================================
    // Forwarding to the WAN
    // ========================================================================

    /// Forward a local cluster message over the gateway to the clusters on
    /// the other end of the WAN.
    ///
    /// With no `control` kind this is ordinary relay traffic: the payload is
    /// forwarded opaquely with no sender id. Control messages additionally
    /// require a sender id. When the gateway is disconnected everything is
    /// dropped with a log, never an error - this call is best-effort, not
    /// guaranteed delivery. GOODBYE is local chatter and is silently not
    /// forwarded.
    pub fn forward_to_gateway(
        &self,
        control: Option<ControlKind>,
        sender: Option<SenderId>,
        payload: &[u8],
    ) {
        // Local delivery callbacks fire regardless of WAN state, and on
        // resign the link may already be torn down. Without a connection
        // there is no sink and no flush timer, so nothing may reach the
        // bundler here.
        if !self.is_connected() {
            match control {
                Some(kind) => log::error!(
                    "[Gateway] WAN connection not open. Discarding control message: {}",
                    kind
                ),
                None => log::error!(
                    "[Gateway] WAN connection not open. Discarding relay message ({}b)",
                    payload.len()
                ),
            }
            return;
        }

        let Some(kind) = control else {
            self.relay(FrameType::Relay, None, payload);
            return;
        };

        let Some(sender) = sender else {
            log::warn!(
                "[Gateway] control message {} carries no sender id. Discarding.",
                kind
            );
            return;
        };

        match kind.wire_type() {
            Some(frame_type) => self.relay(frame_type, Some(sender), payload),
            None => {} // GOODBYE: not forwarded, not an error
        }
    }

    /// Hand one frame to the bundler. Blocks while a flush it triggered or
    /// joined is in progress.
    fn relay(&self, frame_type: FrameType, sender: Option<SenderId>, payload: &[u8]) {
        log::debug!(
            "(LOCAL->WAN) {}, sender={}, payload={}b",
            frame_type,
            sender.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
            payload.len()
        );
        self.bundler.submit(frame_type, sender, payload);
    }
}

// ============================================================================
// Receiver thread
// ============================================================================

struct ReceiverContext {
    cluster: Arc<dyn ClusterEndpoint>,
    metrics: Arc<GatewayMetrics>,
    closing: Arc<AtomicBool>,
    max_frame_size: usize,
}

/// Receiver thread body: decode frames off the inbound stream and dispatch
/// them to the local cluster until the connection goes away.
fn receiver_loop(mut stream: Box<dyn ByteStream>, context: ReceiverContext) {
    log::debug!("[Gateway] receiver thread started");

    loop {
        match read_frame(&mut *stream, context.max_frame_size) {
            Ok(frame) => context.dispatch(frame),
            Err(e) if e.is_recoverable() => {
                context.metrics.record_frame_skipped();
                log::warn!("[Gateway] skipping inbound frame: {}", e);
            }
            Err(WireError::Io(e)) => {
                if context.closing.load(Ordering::Relaxed) || is_disconnect(&e) {
                    // expected during disconnect: the socket close is our
                    // cancellation signal
                    log::debug!(
                        "[Gateway] connection to WAN router was closed. Receiver thread exiting"
                    );
                } else {
                    log::error!(
                        "[Gateway] failure reading from WAN router: {}. Receiver thread exiting",
                        e
                    );
                }
                return;
            }
            Err(e) => {
                // corrupt length field or similar: the stream cannot be
                // resynchronized
                log::error!(
                    "[Gateway] unrecoverable framing error from WAN router: {}. Receiver thread exiting",
                    e
                );
                return;
            }
        }
    }
}

impl ReceiverContext {
    /// Dispatch one inbound frame, unbundling composites exactly one level.
    fn dispatch(&self, frame: Frame) {
        if frame.frame_type == FrameType::Bundle {
            for item in BundleIter::new(&frame.payload) {
                match item {
                    Ok(sub) => self.dispatch_leaf(sub),
                    Err(e) if e.is_recoverable() => {
                        self.metrics.record_frame_skipped();
                        log::warn!("[Gateway] skipping sub-frame in bundle: {}", e);
                    }
                    Err(e) => {
                        // remaining bundle bytes cannot be trusted
                        self.metrics.record_frame_skipped();
                        log::warn!("[Gateway] abandoning corrupt bundle: {}", e);
                        break;
                    }
                }
            }
        } else {
            self.dispatch_leaf(frame);
        }
    }

    /// Dispatch one leaf frame to the local cluster.
    fn dispatch_leaf(&self, frame: Frame) {
        self.metrics
            .record_message_received(frame.encoded_len() as u64);

        match frame.frame_type {
            FrameType::Relay => {
                log::debug!("(WAN->LOCAL) relay({}b)", frame.payload.len());
                // flagged so the local side does not relay it back out
                self.cluster
                    .forward_to_channel(ClusterMessage::relay(frame.payload));
            }

            FrameType::FindCoordinator
            | FrameType::SetManifest
            | FrameType::CreateFederation
            | FrameType::JoinFederation
            | FrameType::ResignFederation
            | FrameType::DestroyFederation => {
                // decode guarantees the sender id is present on these types
                let Some(sender) = frame.sender else {
                    log::warn!(
                        "[Gateway] control message {} without sender id. Ignoring.",
                        frame.frame_type
                    );
                    return;
                };
                let Some(control) = ControlMessage::from_wire(frame.frame_type, frame.payload)
                else {
                    return;
                };
                log::debug!(
                    "(WAN->LOCAL) {}, sender={}, payload={}b",
                    control.kind(),
                    sender,
                    match &control {
                        ControlMessage::FindCoordinator => 0,
                        ControlMessage::SetManifest { manifest } => manifest.len(),
                        ControlMessage::CreateFederation { notice }
                        | ControlMessage::JoinFederation { notice }
                        | ControlMessage::ResignFederation { notice }
                        | ControlMessage::DestroyFederation { notice } => notice.len(),
                    }
                );
                self.cluster
                    .forward_to_channel(ClusterMessage::control(sender, control));
            }

            // handshake frames have no business arriving in steady state
            FrameType::Welcome | FrameType::Ready | FrameType::Goodbye | FrameType::Bundle => {
                log::warn!(
                    "[Gateway] unexpected message type received: {}. Ignoring.",
                    frame.frame_type
                );
            }
        }
    }
}

/// Error kinds that mean "the connection went away", which during shutdown
/// is the normal way the receiver gets released.
fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
    )
}

// ============================================================================
// Tests
// ============================================================================
