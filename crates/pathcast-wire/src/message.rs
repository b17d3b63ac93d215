//! # pathcast update message
//!
//! Single fixed-header datagram format, big-endian throughout.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Version    |     Kind      |        Path Length (16)       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                       Prefix Address (32)                    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Gateway (32)                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Weight (32)                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                  Hop Path (Path Length × 64)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The hop path is the list of host ids an update has already visited;
//! a receiver that finds its own id on the path drops the update.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;

/// Protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed header size: 1 + 1 + 2 + 4 + 4 + 4 = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest datagram a node will send or accept.
pub const MAX_MESSAGE_SIZE: usize = 4096;

/// Longest hop path that still fits in [`MAX_MESSAGE_SIZE`].
pub const MAX_PATH_LEN: usize = (MAX_MESSAGE_SIZE - HEADER_SIZE) / 8;

/// Why a datagram failed to decode.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("message truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
    #[error("unsupported protocol version {0}")]
    Version(u8),
    #[error("unknown update kind {0}")]
    Kind(u8),
    #[error("declared hop path length {0} exceeds the datagram limit")]
    PathTooLong(u16),
}

/// Whether an update announces or withdraws a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateKind {
    Add = 0,
    Withdraw = 1,
}

impl UpdateKind {
    fn from_byte(b: u8) -> Result<Self, DecodeError> {
        match b {
            0 => Ok(UpdateKind::Add),
            1 => Ok(UpdateKind::Withdraw),
            other => Err(DecodeError::Kind(other)),
        }
    }
}

/// A route update as gossiped between nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    pub kind: UpdateKind,
    pub prefix: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub weight: u32,
    /// Host ids this update has passed through, origin first.
    pub path: Vec<u64>,
}

impl UpdateMessage {
    /// An announcement of one of the sender's own addresses.
    pub fn announce(prefix: Ipv4Addr, origin: u64) -> Self {
        Self {
            kind: UpdateKind::Add,
            prefix,
            gateway: Ipv4Addr::UNSPECIFIED,
            weight: 1,
            path: vec![origin],
        }
    }

    /// True if `host_id` already appears on the hop path.
    pub fn contains_hop(&self, host_id: u64) -> bool {
        self.path.contains(&host_id)
    }

    /// Append a host id to the hop path. Updates that have somehow grown
    /// to the datagram limit are left unchanged.
    pub fn push_hop(&mut self, host_id: u64) {
        if self.path.len() < MAX_PATH_LEN {
            self.path.push(host_id);
        } else {
            tracing::warn!(host_id, "hop path full, not appending");
        }
    }

    /// Size of the encoded message in bytes.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.path.len() * 8
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Encode into `buf`.
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(PROTOCOL_VERSION);
        buf.put_u8(self.kind as u8);
        buf.put_u16(self.path.len() as u16);
        buf.put_u32(u32::from(self.prefix));
        buf.put_u32(u32::from(self.gateway));
        buf.put_u32(self.weight);
        for hop in &self.path {
            buf.put_u64(*hop);
        }
    }

    /// Decode a full datagram. Never panics on short or malformed input.
    pub fn decode(mut buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                need: HEADER_SIZE,
                have: buf.len(),
            });
        }

        let version = buf.get_u8();
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::Version(version));
        }
        let kind = UpdateKind::from_byte(buf.get_u8())?;
        let path_len = buf.get_u16();
        if path_len as usize > MAX_PATH_LEN {
            return Err(DecodeError::PathTooLong(path_len));
        }
        let prefix = Ipv4Addr::from(buf.get_u32());
        let gateway = Ipv4Addr::from(buf.get_u32());
        let weight = buf.get_u32();

        let path_bytes = path_len as usize * 8;
        if buf.remaining() < path_bytes {
            return Err(DecodeError::Truncated {
                need: HEADER_SIZE + path_bytes,
                have: HEADER_SIZE + buf.remaining(),
            });
        }
        let mut path = Vec::with_capacity(path_len as usize);
        for _ in 0..path_len {
            path.push(buf.get_u64());
        }

        Ok(Self {
            kind,
            prefix,
            gateway,
            weight,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UpdateMessage {
        UpdateMessage {
            kind: UpdateKind::Add,
            prefix: Ipv4Addr::new(10, 0, 0, 1),
            gateway: Ipv4Addr::UNSPECIFIED,
            weight: 3,
            path: vec![7, 11, 42],
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let msg = sample();
        let bytes = msg.to_bytes();
        assert_eq!(bytes.len(), msg.encoded_len());
        assert_eq!(UpdateMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn announce_carries_origin() {
        let msg = UpdateMessage::announce(Ipv4Addr::new(10, 0, 0, 2), 99);
        assert_eq!(msg.kind, UpdateKind::Add);
        assert_eq!(msg.weight, 1);
        assert!(msg.contains_hop(99));
        assert!(!msg.contains_hop(100));
    }

    #[test]
    fn truncated_header_rejected() {
        let err = UpdateMessage::decode(&[1, 0, 0]).unwrap_err();
        assert_eq!(err, DecodeError::Truncated { need: 16, have: 3 });
    }

    #[test]
    fn truncated_path_rejected() {
        let msg = sample();
        let bytes = msg.to_bytes();
        let err = UpdateMessage::decode(&bytes[..bytes.len() - 4]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn declared_path_bounded() {
        let mut bytes = sample().to_bytes().to_vec();
        // Overwrite the path length field with a value past the cap.
        bytes[2] = 0xFF;
        bytes[3] = 0xFF;
        let err = UpdateMessage::decode(&bytes).unwrap_err();
        assert_eq!(err, DecodeError::PathTooLong(0xFFFF));
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut bytes = sample().to_bytes().to_vec();
        bytes[1] = 9;
        assert_eq!(
            UpdateMessage::decode(&bytes).unwrap_err(),
            DecodeError::Kind(9)
        );
    }

    #[test]
    fn push_hop_appends_in_order() {
        let mut msg = UpdateMessage::announce(Ipv4Addr::new(10, 0, 0, 1), 1);
        msg.push_hop(2);
        msg.push_hop(3);
        assert_eq!(msg.path, vec![1, 2, 3]);
    }
}
