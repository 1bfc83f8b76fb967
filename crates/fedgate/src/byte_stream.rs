// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! Stream abstraction for the router connection.
//!
//! The gateway talks to the WAN router over an ordered, reliable byte
//! stream. This trait decouples it from `TcpStream` so the handshake,
//! bundler and receiver logic can be exercised against in-memory mock
//! streams in tests.
//!
//! One connection is split into two handles via [`ByteStream::try_clone_stream`]:
//! the bundler writes through one (only while holding its buffer lock), the
//! receiver thread reads from the other. `shutdown` on any handle tears down
//! the shared socket, which is what releases the receiver from its blocking
//! read.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};

/// Abstraction over blocking byte-oriented streams.
///
/// Socket options (TCP_NODELAY, buffer sizes) are applied to the concrete
/// socket before it is boxed - see [`net::open_router_stream`] - so the
/// trait stays at the surface the gateway actually drives: reading,
/// writing, tearing down, and handle cloning.
///
/// [`net::open_router_stream`]: crate::net::open_router_stream
pub trait ByteStream: Read + Write + Send {
    /// Shut down the shared underlying connection.
    fn shutdown(&self, how: Shutdown) -> io::Result<()>;

    /// Create another handle to the same underlying connection.
    fn try_clone_stream(&self) -> io::Result<Box<dyn ByteStream>>;
}

impl ByteStream for TcpStream {
    fn shutdown(&self, how: Shutdown) -> io::Result<()> {
        TcpStream::shutdown(self, how)
    }

    fn try_clone_stream(&self) -> io::Result<Box<dyn ByteStream>> {
        Ok(Box::new(self.try_clone()?))
    }
}

// ============================================================================
// Test mock stream
// ============================================================================

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Condvar, Mutex};

    /// In-memory stand-in for the router connection.
    ///
    /// Reads block until data is fed or the stream is closed (like a real
    /// socket); writes are captured for verification. Cloned handles share
    /// the same buffers, so closing one handle releases readers on another.
    #[derive(Clone, Debug)]
    pub struct MockStream {
        shared: Arc<Shared>,
    }

    #[derive(Debug)]
    struct Shared {
        inbound: Mutex<Inbound>,
        inbound_ready: Condvar,
        outbound: Mutex<Outbound>,
    }

    #[derive(Debug, Default)]
    struct Inbound {
        data: VecDeque<u8>,
        closed: bool,
        next_error: Option<io::ErrorKind>,
    }

    #[derive(Debug, Default)]
    struct Outbound {
        data: Vec<u8>,
        closed: bool,
        next_error: Option<io::ErrorKind>,
    }

    impl MockStream {
        /// Create an open mock stream.
        pub fn new() -> Self {
            Self {
                shared: Arc::new(Shared {
                    inbound: Mutex::new(Inbound::default()),
                    inbound_ready: Condvar::new(),
                    outbound: Mutex::new(Outbound::default()),
                }),
            }
        }

        /// Make `data` available to readers.
        pub fn feed_read_data(&self, data: &[u8]) {
            let mut inbound = self.shared.inbound.lock().unwrap();
            inbound.data.extend(data);
            self.shared.inbound_ready.notify_all();
        }

        /// Everything written to this stream so far.
        pub fn written_data(&self) -> Vec<u8> {
            self.shared.outbound.lock().unwrap().data.clone()
        }

        /// Fail the next read with the given error kind.
        pub fn inject_read_error(&self, kind: io::ErrorKind) {
            let mut inbound = self.shared.inbound.lock().unwrap();
            inbound.next_error = Some(kind);
            self.shared.inbound_ready.notify_all();
        }

        /// Fail the next write with the given error kind.
        pub fn inject_write_error(&self, kind: io::ErrorKind) {
            self.shared.outbound.lock().unwrap().next_error = Some(kind);
        }

        /// True once `shutdown` has been called on any handle.
        pub fn is_closed(&self) -> bool {
            self.shared.inbound.lock().unwrap().closed
        }

        fn close(&self) {
            self.shared.inbound.lock().unwrap().closed = true;
            self.shared.outbound.lock().unwrap().closed = true;
            self.shared.inbound_ready.notify_all();
        }
    }

    impl Default for MockStream {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut inbound = self.shared.inbound.lock().unwrap();
            loop {
                if let Some(kind) = inbound.next_error.take() {
                    return Err(io::Error::new(kind, "injected error"));
                }
                if !inbound.data.is_empty() {
                    let to_read = buf.len().min(inbound.data.len());
                    for (slot, byte) in buf.iter_mut().zip(inbound.data.drain(..to_read)) {
                        *slot = byte;
                    }
                    return Ok(to_read);
                }
                if inbound.closed {
                    return Ok(0); // EOF
                }
                inbound = self.shared.inbound_ready.wait(inbound).unwrap();
            }
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut outbound = self.shared.outbound.lock().unwrap();
            if let Some(kind) = outbound.next_error.take() {
                return Err(io::Error::new(kind, "injected error"));
            }
            if outbound.closed {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed"));
            }
            outbound.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ByteStream for MockStream {
        fn shutdown(&self, _how: Shutdown) -> io::Result<()> {
            self.close();
            Ok(())
        }

        fn try_clone_stream(&self) -> io::Result<Box<dyn ByteStream>> {
            Ok(Box::new(self.clone()))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
