// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! WAN gateway and message bundling for HLA-style federation clusters.
//!
//! A federation usually lives on one local-area cluster. To span sites,
//! each cluster runs a gateway that connects to a shared relay router over
//! the wide-area network; the router forwards traffic between otherwise
//! disconnected clusters. This crate is that gateway: it owns the router
//! connection, batches outgoing messages for efficient WAN use, and turns
//! inbound wire frames back into local cluster messages.
//!
//! # Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |                           Gateway                             |
//! |                                                               |
//! |  local cluster --forward_to_gateway()--+                      |
//! |                                        v                      |
//! |  +----------------------------------------------------------+ |
//! |  |                        Bundler                           | |
//! |  |  send buffer + size/time triggers + flush timer thread   | |
//! |  +---------------------------+------------------------------+ |
//! |                              | BUNDLE frames                  |
//! |                              v                                |
//! |  ========== TCP connection to the WAN router ===============  |
//! |                              |                                |
//! |  +---------------------------v------------------------------+ |
//! |  |                    receiver thread                       | |
//! |  |  read_frame() -> unbundle -> dispatch to ClusterEndpoint | |
//! |  +----------------------------------------------------------+ |
//! +---------------------------------------------------------------+
//! ```
//!
//! # Wire Format
//!
//! Every unit on the router link is a type byte, a 4-byte big-endian
//! length, and a payload; control frames carry a 16-byte sender id at the
//! start of the payload. Multiple frames are packed into BUNDLE frames for
//! one transport write. See [`frame`] for the exact layout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fedgate::{ClusterEndpoint, ClusterMessage, Gateway, WanConfig};
//!
//! struct MyCluster;
//! impl ClusterEndpoint for MyCluster {
//!     fn forward_to_channel(&self, message: ClusterMessage) {
//!         // hand off to the local group transport
//!         let _ = message;
//!     }
//! }
//!
//! let config = WanConfig::for_router("router.example.net:23114");
//! let mut gateway = Gateway::new(config, Arc::new(MyCluster));
//! gateway.connect()?;
//! gateway.forward_to_gateway(None, None, b"attribute-update");
//! gateway.disconnect();
//! # Ok::<(), fedgate::GatewayError>(())
//! ```
//!
//! # Modules
//!
//! - [`frame`] - wire framing codec, including the nested bundle format
//! - [`bundler`] - outgoing message batching with size/time release triggers
//! - [`gateway`] - connection lifecycle, handshake and receive loop
//! - [`cluster`] - the local cluster collaborator surface
//! - [`net`] - router address resolution and socket options
//! - [`byte_stream`] - stream abstraction over the router connection
//! - [`metrics`] - traffic counters
//! - [`config`] - gateway configuration
//! - [`error`] - error taxonomy

pub mod bundler;
pub mod byte_stream;
pub mod cluster;
pub mod config;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod metrics;
pub mod net;

// ============================================================================
// Re-exports
// ============================================================================

pub use bundler::Bundler;
pub use byte_stream::ByteStream;
pub use cluster::{
    ClusterEndpoint, ClusterMessage, ControlKind, ControlMessage, DeliveryFlags, MessageBody,
};
pub use config::WanConfig;
pub use error::{GatewayError, WireError};
pub use frame::{
    encode_bundle, read_frame, BundleIter, Frame, FrameType, SenderId, DEFAULT_MAX_FRAME_SIZE,
    FRAME_HEADER_SIZE, SENDER_ID_LEN,
};
pub use gateway::Gateway;
pub use metrics::{format_size, GatewayMetrics, GatewayMetricsSnapshot};

// ============================================================================
// Tests
// ============================================================================
