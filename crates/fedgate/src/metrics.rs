// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! WAN gateway statistics.
//!
//! Monotonic counters for traffic crossing the gateway in both directions.
//! Each counter has exactly one logical writer (the bundler's flush owns the
//! "to WAN" counters, the receiver thread owns the "from WAN" counters) and
//! may be read from any thread; relaxed, eventually-consistent reads are
//! acceptable for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Metrics
// ============================================================================

/// Counters for traffic relayed through the gateway.
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    /// Messages sent to the WAN router.
    messages_to_wan: AtomicU64,

    /// Payload bytes sent to the WAN router (bundle contents, excluding
    /// the bundle's own header).
    bytes_to_wan: AtomicU64,

    /// Bundle flushes performed.
    flushes: AtomicU64,

    /// Leaf messages received from the WAN router.
    messages_from_wan: AtomicU64,

    /// Bytes received from the WAN router (including frame headers).
    bytes_from_wan: AtomicU64,

    /// Inbound frames skipped because of framing problems.
    frames_skipped: AtomicU64,
}

impl GatewayMetrics {
    /// Create a zeroed metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed flush of `messages` messages totalling `bytes`
    /// payload bytes.
    pub fn record_flush(&self, messages: u64, bytes: u64) {
        self.messages_to_wan.fetch_add(messages, Ordering::Relaxed);
        self.bytes_to_wan.fetch_add(bytes, Ordering::Relaxed);
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one leaf message received from the WAN.
    pub fn record_message_received(&self, bytes: u64) {
        self.messages_from_wan.fetch_add(1, Ordering::Relaxed);
        self.bytes_from_wan.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record an inbound frame skipped due to a framing problem.
    pub fn record_frame_skipped(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages sent to the WAN so far.
    pub fn messages_to_wan(&self) -> u64 {
        self.messages_to_wan.load(Ordering::Relaxed)
    }

    /// Bytes sent to the WAN so far.
    pub fn bytes_to_wan(&self) -> u64 {
        self.bytes_to_wan.load(Ordering::Relaxed)
    }

    /// Messages received from the WAN so far.
    pub fn messages_from_wan(&self) -> u64 {
        self.messages_from_wan.load(Ordering::Relaxed)
    }

    /// Bytes received from the WAN so far.
    pub fn bytes_from_wan(&self) -> u64 {
        self.bytes_from_wan.load(Ordering::Relaxed)
    }

    /// Take a point-in-time copy of all counters.
    pub fn snapshot(&self) -> GatewayMetricsSnapshot {
        GatewayMetricsSnapshot {
            messages_to_wan: self.messages_to_wan.load(Ordering::Relaxed),
            bytes_to_wan: self.bytes_to_wan.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            messages_from_wan: self.messages_from_wan.load(Ordering::Relaxed),
            bytes_from_wan: self.bytes_from_wan.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GatewayMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GatewayMetricsSnapshot {
    /// Messages sent to the WAN router.
    pub messages_to_wan: u64,
    /// Payload bytes sent to the WAN router.
    pub bytes_to_wan: u64,
    /// Bundle flushes performed.
    pub flushes: u64,
    /// Leaf messages received from the WAN router.
    pub messages_from_wan: u64,
    /// Bytes received from the WAN router.
    pub bytes_from_wan: u64,
    /// Inbound frames skipped due to framing problems.
    pub frames_skipped: u64,
}

// ============================================================================
// Formatting
// ============================================================================

/// Format a byte count for human-readable statistics logs.
///
/// `1536` formats as `"1.5 KB"`, `482` as `"482 B"`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_recording() {
        let metrics = GatewayMetrics::new();

        metrics.record_flush(3, 120);
        metrics.record_flush(1, 9);

        assert_eq!(metrics.messages_to_wan(), 4);
        assert_eq!(metrics.bytes_to_wan(), 129);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.flushes, 2);
        assert_eq!(snapshot.messages_to_wan, 4);
    }

    #[test]
    fn test_receive_recording() {
        let metrics = GatewayMetrics::new();

        metrics.record_message_received(9);
        metrics.record_message_received(25);
        metrics.record_frame_skipped();

        assert_eq!(metrics.messages_from_wan(), 2);
        assert_eq!(metrics.bytes_from_wan(), 34);
        assert_eq!(metrics.snapshot().frames_skipped, 1);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let metrics = GatewayMetrics::new();
        metrics.record_flush(1, 10);

        let snapshot = metrics.snapshot();
        metrics.record_flush(1, 10);

        assert_eq!(snapshot.messages_to_wan, 1);
        assert_eq!(metrics.messages_to_wan(), 2);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(482), "482 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(64_000), "62.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024 + 200 * 1024), "3.2 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0 GB");
    }
}
