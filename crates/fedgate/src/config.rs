// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! WAN gateway configuration.
//!
//! [`WanConfig`] is built by the embedding application (typically from its
//! RID/settings layer) and passed into the gateway constructor. The gateway
//! itself performs no configuration lookup.
//!
//! # Example
//!
//! ```
//! use fedgate::config::WanConfig;
//! use std::time::Duration;
//!
//! let config = WanConfig::for_router("router.example.net:23114")
//!     .with_bundle_limits(32_000, Duration::from_millis(10));
//! assert!(config.bundling);
//! ```

use std::time::Duration;

/// Configuration for the WAN gateway and its bundler.
#[derive(Clone, Debug)]
pub struct WanConfig {
    // === Router connection ===
    /// WAN router endpoint, `host:port`. Symbolic host names are resolved
    /// at connect time.
    pub router_address: String,

    /// Connection timeout for the router socket.
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm) on the router link.
    ///
    /// The bundler already aggregates writes, so Nagle adds latency
    /// without saving packets.
    pub nodelay: bool,

    /// SO_SNDBUF socket option (0 = OS default).
    pub socket_send_buffer: usize,

    /// SO_RCVBUF socket option (0 = OS default).
    pub socket_recv_buffer: usize,

    // === Bundling ===
    /// Bundle outgoing messages. When false every submit is flushed to the
    /// router immediately as a bundle of one.
    pub bundling: bool,

    /// Accumulated bytes that trigger a flush.
    pub bundle_size_limit: usize,

    /// Longest time messages are held before a flush.
    pub bundle_time_limit: Duration,

    /// Bounded wait for the final drain flush during disconnect.
    pub drain_timeout: Duration,

    // === Framing ===
    /// Maximum accepted frame size in bytes (anti-OOM protection).
    pub max_frame_size: usize,
}

impl Default for WanConfig {
    fn default() -> Self {
        Self {
            router_address: String::new(),

            connect_timeout: Duration::from_secs(5),
            nodelay: true,
            socket_send_buffer: 0, // OS default
            socket_recv_buffer: 0, // OS default

            bundling: true,
            bundle_size_limit: 64_000,
            bundle_time_limit: Duration::from_millis(20),
            drain_timeout: Duration::from_secs(2),

            max_frame_size: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl WanConfig {
    /// Create a config pointing at the given router endpoint.
    pub fn for_router(address: impl Into<String>) -> Self {
        Self {
            router_address: address.into(),
            ..Default::default()
        }
    }

    /// Builder: enable or disable message bundling.
    pub fn with_bundling(mut self, bundling: bool) -> Self {
        self.bundling = bundling;
        self
    }

    /// Builder: set the bundle size and time release triggers.
    pub fn with_bundle_limits(mut self, size_limit: usize, time_limit: Duration) -> Self {
        self.bundle_size_limit = size_limit;
        self.bundle_time_limit = time_limit;
        self
    }

    /// Builder: set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Builder: set the socket buffer sizes (0 = OS default).
    pub fn with_socket_buffers(mut self, send: usize, recv: usize) -> Self {
        self.socket_send_buffer = send;
        self.socket_recv_buffer = recv;
        self
    }

    /// Builder: set the maximum accepted frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WanConfig::default();
        assert!(config.bundling);
        assert_eq!(config.bundle_size_limit, 64_000);
        assert_eq!(config.bundle_time_limit, Duration::from_millis(20));
        assert_eq!(config.drain_timeout, Duration::from_secs(2));
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
        assert!(config.nodelay);
        assert_eq!(config.socket_send_buffer, 0);
        assert_eq!(config.socket_recv_buffer, 0);
    }

    #[test]
    fn test_builders() {
        let config = WanConfig::for_router("10.0.0.1:23114")
            .with_bundling(false)
            .with_bundle_limits(1000, Duration::from_millis(5))
            .with_socket_buffers(1 << 20, 1 << 21)
            .with_max_frame_size(4096);

        assert_eq!(config.router_address, "10.0.0.1:23114");
        assert!(!config.bundling);
        assert_eq!(config.bundle_size_limit, 1000);
        assert_eq!(config.bundle_time_limit, Duration::from_millis(5));
        assert_eq!(config.socket_send_buffer, 1 << 20);
        assert_eq!(config.socket_recv_buffer, 1 << 21);
        assert_eq!(config.max_frame_size, 4096);
    }
}
