//! Chunk framing for the kcpuv session layer.
//!
//! Every chunk handed to the ARQ engine starts with a fixed header:
//!
//! ```text
//! +--------------------+---------+---------------------+
//! | Nonce              | Command | Payload             |
//! | 8 bytes (LE64)     | 1 byte  | 0..MAX_CHUNK_PAYLOAD|
//! +--------------------+---------+---------------------+
//! ```
//!
//! The nonce belongs to the crypto layer; framing writes it and hands it
//! back on decode without interpreting it.

use thiserror::Error;

use crate::core::{CMD_FIN, CMD_FIN_ACK, CMD_NOO, CMD_PUSH, MAX_CHUNK_PAYLOAD, NONCE_LENGTH, OVERHEAD};

/// Command tag carried in every chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Keepalive, no payload.
    Noo = CMD_NOO,
    /// Application payload.
    Push = CMD_PUSH,
    /// Graceful close request.
    Fin = CMD_FIN,
    /// Close acknowledgment.
    FinAck = CMD_FIN_ACK,
}

impl Command {
    /// Parse a command from its tag byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CMD_NOO => Some(Self::Noo),
            CMD_PUSH => Some(Self::Push),
            CMD_FIN => Some(Self::Fin),
            CMD_FIN_ACK => Some(Self::FinAck),
            _ => None,
        }
    }

    /// Tag byte for this command.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Decoded chunk header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Opaque per-chunk nonce.
    pub nonce: u64,
    /// Command tag.
    pub command: Command,
}

impl ChunkHeader {
    /// Create a header.
    pub fn new(nonce: u64, command: Command) -> Self {
        Self { nonce, command }
    }

    /// Serialize the header (9 bytes).
    pub fn to_bytes(&self) -> [u8; OVERHEAD] {
        let mut buf = [0u8; OVERHEAD];
        buf[..NONCE_LENGTH].copy_from_slice(&self.nonce.to_le_bytes());
        buf[NONCE_LENGTH] = self.command.as_byte();
        buf
    }

    /// Parse a header from the front of a chunk.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < OVERHEAD {
            return Err(FrameError::TooShort {
                expected: OVERHEAD,
                actual: bytes.len(),
            });
        }

        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        nonce_bytes.copy_from_slice(&bytes[..NONCE_LENGTH]);
        let tag = bytes[NONCE_LENGTH];
        let command = Command::from_byte(tag).ok_or(FrameError::UnknownCommand(tag))?;

        Ok(Self {
            nonce: u64::from_le_bytes(nonce_bytes),
            command,
        })
    }
}

/// Errors that can occur while decoding a chunk.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Chunk is shorter than its header.
    #[error("chunk too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Command tag is not one we know.
    #[error("unknown command: 0x{0:02x}")]
    UnknownCommand(u8),
}

/// Frame `payload` behind a header into a new chunk.
pub fn encode_chunk(header: ChunkHeader, payload: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(OVERHEAD + payload.len());
    chunk.extend_from_slice(&header.to_bytes());
    chunk.extend_from_slice(payload);
    chunk
}

/// Split a chunk into its header and payload.
pub fn decode_chunk(chunk: &[u8]) -> Result<(ChunkHeader, &[u8]), FrameError> {
    let header = ChunkHeader::from_bytes(chunk)?;
    Ok((header, &chunk[OVERHEAD..]))
}

/// Iterator over the per-chunk slices of an outbound payload.
///
/// Always yields at least one slice, so an empty payload still produces
/// one (header-only) chunk.
#[derive(Debug, Clone)]
pub struct PayloadParts<'a> {
    rest: &'a [u8],
    max: usize,
    emitted: bool,
}

impl<'a> Iterator for PayloadParts<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.rest.is_empty() {
            if self.emitted {
                return None;
            }
            self.emitted = true;
            return Some(self.rest);
        }

        let take = self.rest.len().min(self.max);
        let (part, rest) = self.rest.split_at(take);
        self.rest = rest;
        self.emitted = true;
        Some(part)
    }
}

/// Split `payload` into parts of at most [`MAX_CHUNK_PAYLOAD`] bytes.
pub fn split_payload(payload: &[u8]) -> PayloadParts<'_> {
    split_payload_with(payload, MAX_CHUNK_PAYLOAD)
}

/// Split `payload` into parts of at most `max` bytes.
pub fn split_payload_with(payload: &[u8], max: usize) -> PayloadParts<'_> {
    PayloadParts {
        rest: payload,
        max: max.max(1),
        emitted: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        for cmd in [Command::Noo, Command::Push, Command::Fin, Command::FinAck] {
            assert_eq!(Command::from_byte(cmd.as_byte()), Some(cmd));
        }
        assert_eq!(Command::from_byte(0x00), None);
        assert_eq!(Command::from_byte(0xFF), None);
    }

    #[test]
    fn test_header_layout() {
        let header = ChunkHeader::new(0x0102030405060708, Command::Push);
        let bytes = header.to_bytes();

        assert_eq!(hex::encode(bytes), "080706050403020102");
        assert_eq!(ChunkHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_decode_chunk_payload() {
        let chunk = encode_chunk(ChunkHeader::new(7, Command::Push), b"hello");
        assert_eq!(chunk.len(), OVERHEAD + 5);

        let (header, payload) = decode_chunk(&chunk).unwrap();
        assert_eq!(header.nonce, 7);
        assert_eq!(header.command, Command::Push);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn test_decode_too_short() {
        assert!(matches!(
            decode_chunk(&[0u8; 4]),
            Err(FrameError::TooShort { expected: OVERHEAD, actual: 4 })
        ));
    }

    #[test]
    fn test_decode_unknown_command() {
        let mut chunk = [0u8; OVERHEAD];
        chunk[NONCE_LENGTH] = 0x7f;
        assert!(matches!(
            decode_chunk(&chunk),
            Err(FrameError::UnknownCommand(0x7f))
        ));
    }

    #[test]
    fn test_split_empty_payload() {
        let parts: Vec<_> = split_payload(&[]).collect();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].is_empty());
    }

    #[test]
    fn test_split_large_payload() {
        let payload = vec![0xAB; 200_000];
        let sizes: Vec<_> = split_payload(&payload).map(<[u8]>::len).collect();

        assert_eq!(MAX_CHUNK_PAYLOAD, 65_527);
        assert_eq!(sizes, vec![65_527, 65_527, 65_527, 3_419]);
    }

    #[test]
    fn test_split_exact_multiple() {
        let payload = vec![1u8; 12];
        let sizes: Vec<_> = split_payload_with(&payload, 4).map(<[u8]>::len).collect();
        assert_eq!(sizes, vec![4, 4, 4]);
    }
}
