// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! Error types for the WAN gateway.
//!
//! Two layers of failure are distinguished:
//!
//! - [`WireError`] - framing-level problems on the byte stream. Some of
//!   these are recoverable (the stream is still aligned on a frame boundary
//!   and the next frame can be read), some are fatal to the connection.
//! - [`GatewayError`] - connection-level problems (resolution, connect,
//!   handshake). Always fatal to the connect attempt; the gateway remains
//!   disconnected and the caller decides whether to retry.

use std::io;

use thiserror::Error;

/// Framing-level error while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame type byte is outside the known enumeration. The declared
    /// payload length has already been consumed, so the stream is still
    /// aligned and the next frame can be read.
    #[error("unknown frame type 0x{code:02x} ({skipped} payload bytes skipped)")]
    UnknownFrameType {
        /// The unrecognized type byte.
        code: u8,
        /// Payload bytes consumed to realign the stream.
        skipped: usize,
    },

    /// Declared frame length exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Declared length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A bundle's payload ended before the declared length of one of its
    /// sub-frames was satisfied.
    #[error("truncated frame: declared {declared} bytes but only {available} available")]
    Truncated {
        /// Length declared by the sub-frame header.
        declared: usize,
        /// Bytes actually remaining in the bundle payload.
        available: usize,
    },

    /// A control frame's declared length is too short to hold the 16-byte
    /// sender identifier it is required to carry.
    #[error("control frame of {len} bytes cannot hold a 16-byte sender id")]
    MissingSenderId {
        /// Declared frame length.
        len: usize,
    },

    /// A BUNDLE frame appeared inside another bundle's payload. Bundles
    /// never nest; the offending sub-frame is skipped.
    #[error("nested bundle frame ({skipped} payload bytes skipped)")]
    NestedBundle {
        /// Payload bytes consumed to realign the stream.
        skipped: usize,
    },

    /// Underlying I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    /// True when the stream is still aligned on a frame boundary after this
    /// error, so the receive loop may log it and keep reading. The length
    /// field was readable in all of these cases; only a corrupt length or an
    /// I/O fault is unrecoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            WireError::UnknownFrameType { .. }
                | WireError::NestedBundle { .. }
                | WireError::MissingSenderId { .. }
        )
    }
}

/// Connection-level error raised by [`Gateway::connect`].
///
/// [`Gateway::connect`]: crate::gateway::Gateway::connect
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The configured router address could not be resolved to an endpoint.
    #[error("invalid WAN router address '{address}': {reason}")]
    BadAddress {
        /// The address string as configured.
        address: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The TCP connection to the router could not be established.
    #[error("failed to connect to WAN router at {address}: {source}")]
    ConnectFailed {
        /// Resolved router endpoint.
        address: String,
        /// Underlying connect error.
        source: io::Error,
    },

    /// The router did not follow the WELCOME / READY handshake sequence.
    #[error("failed handshake with WAN router: {0}")]
    Handshake(String),

    /// Framing failure during the handshake exchange.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Other I/O failure while talking to the router.
    #[error("problem talking to WAN router: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(WireError::UnknownFrameType {
            code: 0x7f,
            skipped: 10
        }
        .is_recoverable());
        assert!(WireError::NestedBundle { skipped: 4 }.is_recoverable());
        assert!(WireError::MissingSenderId { len: 4 }.is_recoverable());

        assert!(!WireError::FrameTooLarge { len: 10, max: 5 }.is_recoverable());
        assert!(!WireError::Truncated {
            declared: 10,
            available: 3
        }
        .is_recoverable());
        assert!(
            !WireError::Io(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")).is_recoverable()
        );
    }

    #[test]
    fn test_display_messages() {
        let err = WireError::UnknownFrameType {
            code: 0xab,
            skipped: 12,
        };
        assert_eq!(
            err.to_string(),
            "unknown frame type 0xab (12 payload bytes skipped)"
        );

        let err = GatewayError::Handshake("expected WELCOME".into());
        assert_eq!(
            err.to_string(),
            "failed handshake with WAN router: expected WELCOME"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let wire: WireError = io_err.into();
        assert!(matches!(wire, WireError::Io(_)));
    }
}
