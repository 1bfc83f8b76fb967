// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 fedgate maintainers

//! Wire framing codec for the WAN gateway link.
//!
//! TCP is a stream protocol without message boundaries. Every unit relayed
//! between a gateway and the WAN router is framed as:
//!
//! ```text
//! +-----------+----------------+------------------------------+
//! | Type (1B) | Length (4B BE) | Payload (Length bytes)       |
//! +-----------+----------------+------------------------------+
//! ```
//!
//! Control frames additionally carry a 16-byte sender identifier at the
//! start of the payload; the length field covers it:
//!
//! ```text
//! +-----------+----------------+-----------------+------------+
//! | Type (1B) | Length (4B BE) | SenderId (16B)  | Payload    |
//! +-----------+----------------+-----------------+------------+
//! ```
//!
//! A BUNDLE frame's payload is itself a concatenation of complete encoded
//! frames of any non-bundle type. Bundles never nest: the receiver performs
//! exactly one level of unbundling.
//!
//! # Wire Format
//!
//! - **Type**: `u8`, one of [`FrameType`]
//! - **Length**: `u32` big-endian (network byte order), payload size
//!   including the sender id when present
//! - **SenderId**: exactly 16 opaque bytes, control frames only

use std::fmt;
use std::io::{self, Read};

use crate::error::WireError;

/// Frame header size: one type byte plus the 4-byte length.
pub const FRAME_HEADER_SIZE: usize = 5;

/// Sender identifier size in bytes.
pub const SENDER_ID_LEN: usize = 16;

/// Default maximum frame size (16 MB, anti-OOM protection).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// Frame type
// ============================================================================

/// Closed enumeration of wire frame types.
///
/// The numeric codes are implementation-defined but stable within one
/// deployment; encoder and decoder must agree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Router greeting, payload is a human-readable UTF-8 banner.
    Welcome = 1,
    /// Handshake synchronization, empty payload.
    Ready = 2,
    /// Composite frame packing multiple leaf frames into one write.
    Bundle = 3,
    /// Ordinary cluster traffic, opaque payload, no sender id.
    Relay = 4,
    /// Coordinator discovery request.
    FindCoordinator = 5,
    /// Coordinator manifest announcement.
    SetManifest = 6,
    /// Federation creation notice.
    CreateFederation = 7,
    /// Federation join notice.
    JoinFederation = 8,
    /// Federation resignation notice.
    ResignFederation = 9,
    /// Federation destruction notice.
    DestroyFederation = 10,
    /// Connection farewell. Never forwarded across the WAN.
    Goodbye = 11,
}

impl FrameType {
    /// Look up a frame type from its wire code.
    pub fn from_code(code: u8) -> Option<FrameType> {
        match code {
            1 => Some(FrameType::Welcome),
            2 => Some(FrameType::Ready),
            3 => Some(FrameType::Bundle),
            4 => Some(FrameType::Relay),
            5 => Some(FrameType::FindCoordinator),
            6 => Some(FrameType::SetManifest),
            7 => Some(FrameType::CreateFederation),
            8 => Some(FrameType::JoinFederation),
            9 => Some(FrameType::ResignFederation),
            10 => Some(FrameType::DestroyFederation),
            11 => Some(FrameType::Goodbye),
            _ => None,
        }
    }

    /// The wire code for this frame type.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether frames of this type carry a 16-byte sender id prefix.
    pub fn carries_sender(self) -> bool {
        matches!(
            self,
            FrameType::FindCoordinator
                | FrameType::SetManifest
                | FrameType::CreateFederation
                | FrameType::JoinFederation
                | FrameType::ResignFederation
                | FrameType::DestroyFederation
        )
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameType::Welcome => "WELCOME",
            FrameType::Ready => "READY",
            FrameType::Bundle => "BUNDLE",
            FrameType::Relay => "RELAY",
            FrameType::FindCoordinator => "FIND_COORD",
            FrameType::SetManifest => "SET_MANIFEST",
            FrameType::CreateFederation => "CREATE_FEDERATION",
            FrameType::JoinFederation => "JOIN_FEDERATION",
            FrameType::ResignFederation => "RESIGN_FEDERATION",
            FrameType::DestroyFederation => "DESTROY_FEDERATION",
            FrameType::Goodbye => "GOODBYE",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Sender identifier
// ============================================================================

/// Opaque 16-byte identifier of the federate that originated a control
/// message. The gateway relays it without interpretation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId([u8; SENDER_ID_LEN]);

impl SenderId {
    /// Wrap raw identifier bytes.
    pub fn from_bytes(bytes: [u8; SENDER_ID_LEN]) -> Self {
        SenderId(bytes)
    }

    /// Borrow the raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; SENDER_ID_LEN] {
        &self.0
    }

    fn read_from(slice: &[u8]) -> SenderId {
        let mut bytes = [0u8; SENDER_ID_LEN];
        bytes.copy_from_slice(&slice[..SENDER_ID_LEN]);
        SenderId(bytes)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // uuid-style grouping for readable logs
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SenderId({})", self)
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A single decoded wire frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame type.
    pub frame_type: FrameType,

    /// Sender identifier, present on control frames only.
    pub sender: Option<SenderId>,

    /// Opaque payload, excluding the sender id.
    pub payload: Vec<u8>,
}

impl Frame {
    /// An ordinary relay frame with no sender id.
    pub fn relay(payload: Vec<u8>) -> Frame {
        Frame {
            frame_type: FrameType::Relay,
            sender: None,
            payload,
        }
    }

    /// A control frame carrying a sender id.
    pub fn control(frame_type: FrameType, sender: SenderId, payload: Vec<u8>) -> Frame {
        debug_assert!(frame_type.carries_sender());
        Frame {
            frame_type,
            sender: Some(sender),
            payload,
        }
    }

    /// A handshake-style frame with no sender id (WELCOME, READY, GOODBYE).
    pub fn bare(frame_type: FrameType) -> Frame {
        Frame {
            frame_type,
            sender: None,
            payload: Vec::new(),
        }
    }

    /// A frame with a payload and no sender id.
    pub fn with_payload(frame_type: FrameType, payload: Vec<u8>) -> Frame {
        Frame {
            frame_type,
            sender: None,
            payload,
        }
    }

    /// On-wire size of this frame: header plus length-field value.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.wire_length()
    }

    /// Value of the on-wire length field: payload size plus 16 when a
    /// sender id is present.
    pub fn wire_length(&self) -> usize {
        self.payload.len() + if self.sender.is_some() { SENDER_ID_LEN } else { 0 }
    }

    /// Append the encoded frame to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        encode_raw_into(self.frame_type, self.sender.as_ref(), &self.payload, buf);
    }

    /// Encode the frame into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }
}

/// Append one encoded frame to `buf` without constructing a [`Frame`].
///
/// This is the append path the bundler uses to write directly into its send
/// buffer; [`Frame::encode_into`] delegates here.
pub fn encode_raw_into(
    frame_type: FrameType,
    sender: Option<&SenderId>,
    payload: &[u8],
    buf: &mut Vec<u8>,
) {
    let wire_length = payload.len() + if sender.is_some() { SENDER_ID_LEN } else { 0 };
    buf.push(frame_type.code());
    buf.extend_from_slice(&(wire_length as u32).to_be_bytes());
    if let Some(sender) = sender {
        buf.extend_from_slice(sender.as_bytes());
    }
    buf.extend_from_slice(payload);
}

/// Encode `frames` as one BUNDLE frame.
///
/// A bundle containing exactly one sub-frame decodes identically to sending
/// that frame unbundled.
pub fn encode_bundle(frames: &[Frame]) -> Vec<u8> {
    let body_len: usize = frames.iter().map(Frame::encoded_len).sum();
    let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + body_len);
    buf.push(FrameType::Bundle.code());
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    for frame in frames {
        frame.encode_into(&mut buf);
    }
    buf
}

// ============================================================================
// Decoding
// ============================================================================

/// Read one complete frame from a blocking byte source.
///
/// Returns:
/// - `Ok(frame)` - a complete, recognized frame
/// - `Err(e)` where `e.is_recoverable()` - the frame was skipped but the
///   stream is still aligned; the caller may keep reading
/// - any other `Err(e)` - the connection is unusable
///
/// An unknown type byte still consumes the declared payload length so the
/// stream stays aligned on the next frame boundary.
pub fn read_frame<R: Read + ?Sized>(reader: &mut R, max_size: usize) -> Result<Frame, WireError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let code = header[0];
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;

    // A corrupt length field is unrecoverable: we cannot trust the next
    // frame boundary.
    if len > max_size {
        return Err(WireError::FrameTooLarge { len, max: max_size });
    }

    let frame_type = match FrameType::from_code(code) {
        Some(ft) => ft,
        None => {
            skip_exact(reader, len)?;
            return Err(WireError::UnknownFrameType { code, skipped: len });
        }
    };

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    split_body(frame_type, body)
}

/// Discard exactly `len` bytes from the reader.
fn skip_exact<R: Read + ?Sized>(reader: &mut R, len: usize) -> Result<(), WireError> {
    let copied = io::copy(&mut (&mut *reader).take(len as u64), &mut io::sink())?;
    if copied < len as u64 {
        return Err(WireError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended while skipping frame payload",
        )));
    }
    Ok(())
}

/// Split a raw frame body into sender id and payload per the frame type.
fn split_body(frame_type: FrameType, body: Vec<u8>) -> Result<Frame, WireError> {
    if frame_type.carries_sender() {
        if body.len() < SENDER_ID_LEN {
            return Err(WireError::MissingSenderId { len: body.len() });
        }
        let sender = SenderId::read_from(&body);
        Ok(Frame {
            frame_type,
            sender: Some(sender),
            payload: body[SENDER_ID_LEN..].to_vec(),
        })
    } else {
        Ok(Frame {
            frame_type,
            sender: None,
            payload: body,
        })
    }
}

/// Iterator over the sub-frames of a BUNDLE payload.
///
/// Yields one item per sub-frame, in payload order. Recoverable errors
/// (unknown type, nested bundle, short control frame) skip only the
/// offending sub-frame; a truncated sub-frame ends iteration because the
/// remaining bytes cannot be trusted.
pub struct BundleIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BundleIter<'a> {
    /// Iterate over the sub-frames of `payload`.
    pub fn new(payload: &'a [u8]) -> BundleIter<'a> {
        BundleIter {
            buf: payload,
            pos: 0,
        }
    }
}

impl Iterator for BundleIter<'_> {
    type Item = Result<Frame, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }

        let remaining = self.buf.len() - self.pos;
        if remaining < FRAME_HEADER_SIZE {
            self.pos = self.buf.len();
            return Some(Err(WireError::Truncated {
                declared: FRAME_HEADER_SIZE,
                available: remaining,
            }));
        }

        let header = &self.buf[self.pos..self.pos + FRAME_HEADER_SIZE];
        let code = header[0];
        let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
        let available = remaining - FRAME_HEADER_SIZE;

        if len > available {
            self.pos = self.buf.len();
            return Some(Err(WireError::Truncated {
                declared: len,
                available,
            }));
        }

        let body_start = self.pos + FRAME_HEADER_SIZE;
        let body = &self.buf[body_start..body_start + len];
        self.pos = body_start + len;

        let frame_type = match FrameType::from_code(code) {
            Some(FrameType::Bundle) => return Some(Err(WireError::NestedBundle { skipped: len })),
            Some(ft) => ft,
            None => return Some(Err(WireError::UnknownFrameType { code, skipped: len })),
        };

        Some(split_body(frame_type, body.to_vec()))
    }
}

// ============================================================================
// Tests
// ============================================================================
