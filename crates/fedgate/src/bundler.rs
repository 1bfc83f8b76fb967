// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! Outgoing message bundling for the WAN link.
//!
//! The bundler batches outgoing frames to amortize transport write overhead
//! while bounding latency. Frames accumulate in a send buffer until one of
//! two release triggers fires:
//!
//! - the buffered size exceeds a configurable threshold, or
//! - messages have been held longer than a configurable time limit.
//!
//! A dedicated timer thread performs the flush in both cases. When the size
//! trigger fires, the submitting thread blocks until that flush completes;
//! this throttles producers against the transport instead of letting them
//! grow the buffer without bound.
//!
//! # Locking
//!
//! One mutex guards the send buffer, its bookkeeping, and the transport
//! write during flush. The outbound stream is written only while holding
//! this lock, so there is exactly one writer; a slow write therefore stalls
//! producers, which is the intended backpressure.
//!
//! # Disabled bundling
//!
//! When bundling is turned off every submit flushes synchronously on the
//! calling thread as a bundle of one. Used for low-latency control traffic
//! and diagnostics.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::byte_stream::ByteStream;
use crate::config::WanConfig;
use crate::frame::{self, FrameType, SenderId, FRAME_HEADER_SIZE, SENDER_ID_LEN};
use crate::metrics::{format_size, GatewayMetrics};

// ============================================================================
// Bundler
// ============================================================================

/// Batches outgoing frames and writes them to the router connection.
pub struct Bundler {
    shared: Arc<Shared>,
    drain_timeout: Duration,
    timer: Option<JoinHandle<()>>,
}

struct Shared {
    size_limit: usize,
    time_limit: Duration,
    bundling: AtomicBool,
    metrics: Arc<GatewayMetrics>,

    state: Mutex<State>,
    /// Producer -> timer: the buffer went from empty to non-empty.
    arm: Condvar,
    /// Producer -> timer: flush now (size trigger or drain request).
    flush_requested: Condvar,
    /// Timer -> producers: a flush completed.
    flush_done: Condvar,
}

struct State {
    buffer: Vec<u8>,
    queued: u64,
    oldest: Option<Instant>,
    flush_pending: bool,
    flush_epoch: u64,
    shutdown: bool,
    sink: Option<Box<dyn ByteStream>>,
}

impl Bundler {
    /// Create a bundler with the given limits. It does nothing until
    /// [`connect`](Bundler::connect) attaches it to an outbound stream.
    pub fn new(config: &WanConfig, metrics: Arc<GatewayMetrics>) -> Bundler {
        let size_limit = config.bundle_size_limit;
        Bundler {
            shared: Arc::new(Shared {
                size_limit,
                time_limit: config.bundle_time_limit,
                bundling: AtomicBool::new(config.bundling),
                metrics,
                state: Mutex::new(State {
                    buffer: Vec::with_capacity(size_limit + size_limit / 10),
                    queued: 0,
                    oldest: None,
                    flush_pending: false,
                    flush_epoch: 0,
                    shutdown: false,
                    sink: None,
                }),
                arm: Condvar::new(),
                flush_requested: Condvar::new(),
                flush_done: Condvar::new(),
            }),
            drain_timeout: config.drain_timeout,
            timer: None,
        }
    }

    /// Attach the outbound stream and start the flush timer thread.
    pub fn connect(&mut self, sink: Box<dyn ByteStream>) -> std::io::Result<()> {
        log::debug!(
            "[Bundler] starting: max bundle size {}, max bundle time {:?}",
            format_size(self.shared.size_limit as u64),
            self.shared.time_limit
        );

        {
            let mut state = self.shared.state.lock();
            // frames accepted while no connection was attached must not
            // leak onto this connection
            if state.queued > 0 {
                log::debug!(
                    "[Bundler] discarding {} messages buffered while disconnected",
                    state.queued
                );
            }
            state.buffer.clear();
            state.queued = 0;
            state.oldest = None;
            state.flush_pending = false;
            state.shutdown = false;
            state.sink = Some(sink);
        }

        let shared = Arc::clone(&self.shared);
        self.timer = Some(
            thread::Builder::new()
                .name("wan-bundler".to_string())
                .spawn(move || timer_loop(shared))?,
        );
        Ok(())
    }

    /// Submit a frame for sending.
    ///
    /// Appends the encoded frame to the send buffer. If this pushes the
    /// buffered size past the limit, the flush is signalled and this call
    /// blocks until it completes. If this is the first frame since the last
    /// flush, the timer is armed so the frame is held at most the
    /// configured time limit.
    ///
    /// Never returns an error: transport failures during flush are logged
    /// and the buffered data is dropped rather than retried.
    pub fn submit(&self, frame_type: FrameType, sender: Option<SenderId>, payload: &[u8]) {
        let shared = &*self.shared;
        let mut state = shared.state.lock();

        let needed =
            FRAME_HEADER_SIZE + payload.len() + if sender.is_some() { SENDER_ID_LEN } else { 0 };
        grow_if_needed(&mut state.buffer, needed);
        frame::encode_raw_into(frame_type, sender.as_ref(), payload, &mut state.buffer);
        state.queued += 1;

        // bundling off: every message goes out on its own, right now, on
        // the calling thread
        if !shared.bundling.load(Ordering::Relaxed) {
            shared.flush_locked(&mut state);
            return;
        }

        // first frame since the last flush: start the hold clock
        if state.oldest.is_none() {
            state.oldest = Some(Instant::now());
            shared.arm.notify_all();
        }

        if state.buffer.len() > shared.size_limit {
            state.flush_pending = true;
            shared.flush_requested.notify_all();

            // block until the flush completes; producer throttling
            let epoch = state.flush_epoch;
            while state.flush_epoch == epoch && !state.shutdown {
                shared.flush_done.wait(&mut state);
            }
        }
    }

    /// Whether messages are currently being bundled.
    pub fn is_bundling(&self) -> bool {
        self.shared.bundling.load(Ordering::Relaxed)
    }

    /// Turn bundling on or off at runtime.
    pub fn set_bundling(&self, bundling: bool) {
        self.shared.bundling.store(bundling, Ordering::Relaxed);
    }

    /// Number of frames queued since the last flush.
    pub fn pending_messages(&self) -> u64 {
        self.shared.state.lock().queued
    }

    /// Drain buffered frames (bounded wait) and stop the timer thread.
    ///
    /// Does NOT close the underlying transport; that is the gateway's job.
    pub fn disconnect(&mut self) {
        if self.timer.is_none() {
            return;
        }

        {
            let mut state = self.shared.state.lock();
            log::trace!("[Bundler] flushing {} stored messages", state.queued);
            state.flush_pending = true;
            self.shared.arm.notify_all();
            self.shared.flush_requested.notify_all();

            let epoch = state.flush_epoch;
            let deadline = Instant::now() + self.drain_timeout;
            while state.flush_epoch == epoch && !state.shutdown {
                if self
                    .shared
                    .flush_done
                    .wait_until(&mut state, deadline)
                    .timed_out()
                {
                    log::warn!(
                        "[Bundler] drain timed out with {} messages still queued",
                        state.queued
                    );
                    break;
                }
            }

            state.shutdown = true;
            state.sink = None;
            self.shared.arm.notify_all();
            self.shared.flush_requested.notify_all();
            // release any submitter still parked on the flush wait
            self.shared.flush_done.notify_all();
        }

        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                log::warn!("[Bundler] flush timer thread did not shut down cleanly");
            }
        }

        log::debug!("[Bundler] shut down");
    }
}

impl Shared {
    /// Write the whole buffer as one BUNDLE frame, update counters, clear
    /// the buffer, and wake any thread blocked waiting on the flush.
    ///
    /// A write failure is logged and the buffer is still cleared: data
    /// already accepted is lost rather than retried, and blocked
    /// submitters are still released.
    fn flush_locked(&self, state: &mut State) {
        let State {
            buffer,
            queued,
            sink,
            ..
        } = state;

        if *queued > 0 {
            let bytes = buffer.len();
            match sink.as_mut() {
                Some(sink) => {
                    let mut header = [0u8; FRAME_HEADER_SIZE];
                    header[0] = FrameType::Bundle.code();
                    header[1..].copy_from_slice(&(bytes as u32).to_be_bytes());

                    let result = sink
                        .write_all(&header)
                        .and_then(|_| sink.write_all(buffer))
                        .and_then(|_| sink.flush());

                    match result {
                        Ok(()) => {
                            self.metrics.record_flush(*queued, bytes as u64);
                            log::trace!(
                                "[Bundler] sent {} bytes to WAN ({} messages)",
                                bytes,
                                queued
                            );
                        }
                        Err(e) => {
                            log::error!("[Bundler] error sending messages to WAN router: {}", e)
                        }
                    }
                }
                None => {
                    log::error!(
                        "[Bundler] no outbound stream attached; dropping {} queued messages",
                        queued
                    );
                }
            }
        }

        state.buffer.clear();
        state.queued = 0;
        state.oldest = None;
        state.flush_epoch = state.flush_epoch.wrapping_add(1);
        self.flush_done.notify_all();
    }
}

/// Timer thread body: wait to be armed, then hold messages until the flush
/// signal or the time limit, whichever comes first, and flush.
fn timer_loop(shared: Arc<Shared>) {
    log::debug!("[Bundler] flush timer thread started");

    let mut state = shared.state.lock();
    loop {
        // only arm when there are messages to hold
        while !state.shutdown && state.oldest.is_none() && !state.flush_pending {
            shared.arm.wait(&mut state);
        }
        if state.shutdown {
            break;
        }

        // hold until the size trigger fires or our wait time expires
        if !state.flush_pending {
            let _ = shared
                .flush_requested
                .wait_for(&mut state, shared.time_limit);
        }
        if state.shutdown {
            break;
        }

        state.flush_pending = false;
        shared.flush_locked(&mut state);
    }
    drop(state);

    log::debug!("[Bundler] flush timer thread stopped");
}

/// Grow the buffer with ~10% headroom when an append would overflow the
/// remaining capacity. Expected to be rare in steady state: the size limit
/// triggers a flush well before pathological growth.
fn grow_if_needed(buffer: &mut Vec<u8>, additional: usize) {
    let remaining = buffer.capacity() - buffer.len();
    if remaining < additional {
        let target = buffer.capacity() + additional;
        let with_headroom = target + target / 10;
        buffer.reserve_exact(with_headroom - buffer.len());
    }
}

// ============================================================================
// Tests
// ============================================================================
