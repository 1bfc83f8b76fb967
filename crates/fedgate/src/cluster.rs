// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! Local-cluster collaborator surface.
//!
//! The gateway never inspects cluster-internal routing. Inbound WAN traffic
//! is reconstructed into a [`ClusterMessage`] and handed to the cluster's
//! [`ClusterEndpoint::forward_to_channel`]; delivery flags tell the local
//! transport how to treat it (most importantly: do not relay it back out to
//! the WAN, which would echo-loop).

use std::fmt;

use bitflags::bitflags;

use crate::frame::{FrameType, SenderId};

bitflags! {
    /// Delivery hints attached to messages handed to the local cluster.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DeliveryFlags: u8 {
        /// Message arrived from the WAN; must not be relayed back out.
        const NO_RELAY = 0b0001;
        /// Deliver out-of-band, ahead of ordinary traffic.
        const OUT_OF_BAND = 0b0010;
        /// Do not batch with other local traffic.
        const DONT_BUNDLE = 0b0100;
        /// Exempt from local flow control.
        const NO_FLOW_CONTROL = 0b1000;
    }
}

impl DeliveryFlags {
    /// Flags applied to reconstructed control messages: already relayed,
    /// out-of-band, and not to be re-bundled locally.
    pub fn control_defaults() -> DeliveryFlags {
        DeliveryFlags::NO_RELAY
            | DeliveryFlags::OUT_OF_BAND
            | DeliveryFlags::DONT_BUNDLE
            | DeliveryFlags::NO_FLOW_CONTROL
    }
}

// ============================================================================
// Control messages
// ============================================================================

/// Connection-lifecycle message kinds as the local cluster names them.
///
/// Used on the outbound path to select a wire frame type. GOODBYE is local
/// chatter and is never forwarded across the WAN.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ControlKind {
    /// Coordinator discovery request.
    FindCoordinator,
    /// Coordinator manifest announcement.
    SetManifest,
    /// Federation creation notice.
    CreateFederation,
    /// Federation join notice.
    JoinFederation,
    /// Federation resignation notice.
    ResignFederation,
    /// Federation destruction notice.
    DestroyFederation,
    /// Connection farewell; dropped by the gateway.
    Goodbye,
}

impl ControlKind {
    /// The wire frame type this control kind maps to, or `None` for kinds
    /// that are never forwarded (GOODBYE).
    pub fn wire_type(self) -> Option<FrameType> {
        match self {
            ControlKind::FindCoordinator => Some(FrameType::FindCoordinator),
            ControlKind::SetManifest => Some(FrameType::SetManifest),
            ControlKind::CreateFederation => Some(FrameType::CreateFederation),
            ControlKind::JoinFederation => Some(FrameType::JoinFederation),
            ControlKind::ResignFederation => Some(FrameType::ResignFederation),
            ControlKind::DestroyFederation => Some(FrameType::DestroyFederation),
            ControlKind::Goodbye => None,
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControlKind::FindCoordinator => "FindCoordinator",
            ControlKind::SetManifest => "SetManifest",
            ControlKind::CreateFederation => "CreateFederation",
            ControlKind::JoinFederation => "JoinFederation",
            ControlKind::ResignFederation => "ResignFederation",
            ControlKind::DestroyFederation => "DestroyFederation",
            ControlKind::Goodbye => "Goodbye",
        };
        write!(f, "{}", s)
    }
}

/// A reconstructed control message received from the WAN.
///
/// Each variant carries the payload shape of the corresponding request; the
/// originating federate is identified separately by the message's sender id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Someone on the far side is looking for the coordinator.
    FindCoordinator,
    /// Coordinator manifest, sent in response to coordinator discovery.
    SetManifest {
        /// Serialized manifest contents.
        manifest: Vec<u8>,
    },
    /// A federation was created on the far side.
    CreateFederation {
        /// Serialized creation notice.
        notice: Vec<u8>,
    },
    /// A federate joined a federation on the far side.
    JoinFederation {
        /// Serialized join notice.
        notice: Vec<u8>,
    },
    /// A federate resigned from a federation on the far side.
    ResignFederation {
        /// Serialized resignation notice.
        notice: Vec<u8>,
    },
    /// A federation was destroyed on the far side.
    DestroyFederation {
        /// Serialized destruction notice.
        notice: Vec<u8>,
    },
}

impl ControlMessage {
    /// Reconstruct a control message from its wire type and the payload
    /// remaining after the sender id prefix has been stripped.
    ///
    /// Returns `None` for frame types that are not control messages.
    pub fn from_wire(frame_type: FrameType, payload: Vec<u8>) -> Option<ControlMessage> {
        match frame_type {
            // discovery requests carry no body of their own
            FrameType::FindCoordinator => Some(ControlMessage::FindCoordinator),
            FrameType::SetManifest => Some(ControlMessage::SetManifest { manifest: payload }),
            FrameType::CreateFederation => {
                Some(ControlMessage::CreateFederation { notice: payload })
            }
            FrameType::JoinFederation => Some(ControlMessage::JoinFederation { notice: payload }),
            FrameType::ResignFederation => {
                Some(ControlMessage::ResignFederation { notice: payload })
            }
            FrameType::DestroyFederation => {
                Some(ControlMessage::DestroyFederation { notice: payload })
            }
            _ => None,
        }
    }

    /// The control kind of this message.
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlMessage::FindCoordinator => ControlKind::FindCoordinator,
            ControlMessage::SetManifest { .. } => ControlKind::SetManifest,
            ControlMessage::CreateFederation { .. } => ControlKind::CreateFederation,
            ControlMessage::JoinFederation { .. } => ControlKind::JoinFederation,
            ControlMessage::ResignFederation { .. } => ControlKind::ResignFederation,
            ControlMessage::DestroyFederation { .. } => ControlKind::DestroyFederation,
        }
    }
}

// ============================================================================
// Cluster delivery
// ============================================================================

/// Body of a message delivered to the local cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageBody {
    /// Ordinary relayed traffic, opaque to the gateway.
    Relay(Vec<u8>),
    /// A reconstructed connection-control message.
    Control(ControlMessage),
}

/// A message delivered from the WAN to the local cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterMessage {
    /// Originating federate for control messages, absent for relay traffic.
    pub sender: Option<SenderId>,
    /// Message body.
    pub body: MessageBody,
    /// Delivery hints for the local transport.
    pub flags: DeliveryFlags,
}

impl ClusterMessage {
    /// Relayed traffic, flagged so it is not echoed back out to the WAN.
    pub fn relay(payload: Vec<u8>) -> ClusterMessage {
        ClusterMessage {
            sender: None,
            body: MessageBody::Relay(payload),
            flags: DeliveryFlags::NO_RELAY,
        }
    }

    /// A reconstructed control message with the standard control flags.
    pub fn control(sender: SenderId, message: ControlMessage) -> ClusterMessage {
        ClusterMessage {
            sender: Some(sender),
            body: MessageBody::Control(message),
            flags: DeliveryFlags::control_defaults(),
        }
    }
}

/// The local cluster transport as seen by the gateway.
///
/// Implementations route the message to the local group channel; the gateway
/// calls this for all inbound WAN traffic and never looks further.
pub trait ClusterEndpoint: Send + Sync {
    /// Deliver a reconstructed message to the local cluster.
    fn forward_to_channel(&self, message: ClusterMessage);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_kind_wire_mapping() {
        assert_eq!(
            ControlKind::FindCoordinator.wire_type(),
            Some(FrameType::FindCoordinator)
        );
        assert_eq!(
            ControlKind::SetManifest.wire_type(),
            Some(FrameType::SetManifest)
        );
        assert_eq!(
            ControlKind::CreateFederation.wire_type(),
            Some(FrameType::CreateFederation)
        );
        assert_eq!(
            ControlKind::JoinFederation.wire_type(),
            Some(FrameType::JoinFederation)
        );
        assert_eq!(
            ControlKind::ResignFederation.wire_type(),
            Some(FrameType::ResignFederation)
        );
        assert_eq!(
            ControlKind::DestroyFederation.wire_type(),
            Some(FrameType::DestroyFederation)
        );
        assert_eq!(ControlKind::Goodbye.wire_type(), None);
    }

    #[test]
    fn test_control_message_from_wire() {
        let msg = ControlMessage::from_wire(FrameType::SetManifest, b"manifest".to_vec()).unwrap();
        assert_eq!(
            msg,
            ControlMessage::SetManifest {
                manifest: b"manifest".to_vec()
            }
        );
        assert_eq!(msg.kind(), ControlKind::SetManifest);

        // find-coordinator has no body regardless of payload bytes
        let msg = ControlMessage::from_wire(FrameType::FindCoordinator, b"junk".to_vec()).unwrap();
        assert_eq!(msg, ControlMessage::FindCoordinator);

        assert_eq!(ControlMessage::from_wire(FrameType::Relay, Vec::new()), None);
        assert_eq!(
            ControlMessage::from_wire(FrameType::Bundle, Vec::new()),
            None
        );
    }

    #[test]
    fn test_relay_message_flags() {
        let msg = ClusterMessage::relay(b"data".to_vec());
        assert_eq!(msg.flags, DeliveryFlags::NO_RELAY);
        assert!(msg.sender.is_none());
    }

    #[test]
    fn test_control_message_flags() {
        let sender = SenderId::from_bytes([1u8; 16]);
        let msg = ClusterMessage::control(sender, ControlMessage::FindCoordinator);

        assert!(msg.flags.contains(DeliveryFlags::NO_RELAY));
        assert!(msg.flags.contains(DeliveryFlags::OUT_OF_BAND));
        assert!(msg.flags.contains(DeliveryFlags::DONT_BUNDLE));
        assert!(msg.flags.contains(DeliveryFlags::NO_FLOW_CONTROL));
        assert_eq!(msg.sender, Some(sender));
    }
}
