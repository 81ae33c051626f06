//! The atomic protocol message: kind + packed flags + raw payload.
//!
//! ## Wire format
//!
//! Little-endian, fixed 6-byte header followed by the payload:
//!
//! ```text
//! kind:        u8   (1)
//! flags:       u8   (1)
//! payload_len: u32  (4)
//! payload:     [u8] (payload_len)
//! ```
//!
//! Outbound chunk payloads are bounded by [`MAX_BLOCK_SIZE`]; inbound
//! frames are bounded by [`MAX_RECV_PAYLOAD`] at decode time. The
//! buffer backing a frame may be larger than the valid payload — only
//! the first `payload_len` bytes are meaningful.

use bitflags::bitflags;

use crate::error::CastError;

// ── Constants ────────────────────────────────────────────────────

/// Encoded header size on the wire.
pub const HEADER_SIZE: usize = 6;

/// Maximum payload for a single outbound chunk (file data or plain text).
pub const MAX_BLOCK_SIZE: usize = 1024;

/// Maximum accepted payload for any inbound frame. Batch frames pack
/// many sub-frames, so this is far larger than [`MAX_BLOCK_SIZE`].
pub const MAX_RECV_PAYLOAD: usize = 64 * 1024;

/// Reference names containing this marker resolve against the
/// server's shared directory; the marker and everything before it
/// are stripped before lookup.
pub const SHARED_MARKER: &str = "shared:";

/// Suffix of executable scripts.
pub const SCRIPT_SUFFIX: &str = ".lua";

/// Suffix selecting archive handling (extract before execution).
pub const ARCHIVE_SUFFIX: &str = ".zip";

// ── FrameKind ────────────────────────────────────────────────────

/// All frame kinds understood by the protocol.
///
/// Organized by direction:
/// - `0x01..0x03` — upload phase (client → server)
/// - `0x04..0x06` — output stream (server → client)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Names the script to run: a shared reference or an upload header.
    FileReference = 0x01,
    /// The argument string handed to the script.
    Arguments = 0x02,
    /// One block of uploaded script/archive bytes.
    ExecutableChunk = 0x03,
    /// Screen output. Plain text at the top level; a delta-encoded
    /// diff when nested inside a [`FrameKind::CompressedBatch`].
    ScreenText = 0x04,
    /// A raw terminal control sequence (clear screen, cursor home).
    AnsiCommand = 0x05,
    /// Several sub-frames packed back-to-back into one payload.
    CompressedBatch = 0x06,
}

impl TryFrom<u8> for FrameKind {
    type Error = CastError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(FrameKind::FileReference),
            0x02 => Ok(FrameKind::Arguments),
            0x03 => Ok(FrameKind::ExecutableChunk),
            0x04 => Ok(FrameKind::ScreenText),
            0x05 => Ok(FrameKind::AnsiCommand),
            0x06 => Ok(FrameKind::CompressedBatch),
            other => Err(CastError::UnknownFrameKind(other)),
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

// ── FrameFlags ───────────────────────────────────────────────────

bitflags! {
    /// Packed per-frame flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u8 {
        /// Marks the last frame of a logical multi-frame exchange:
        /// the end of an upload, an argument transfer, or a burst of
        /// screen updates.
        const END_OF_SEQUENCE = 0b0000_0001;
        /// Set only on a `FileReference`: the content is a compressed
        /// archive requiring extraction before execution.
        const IS_ARCHIVE = 0b0000_0010;
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// One atomic protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    kind: FrameKind,
    flags: FrameFlags,
    payload: Vec<u8>,
}

impl Frame {
    /// Build a frame with no flags set.
    pub fn new(kind: FrameKind, payload: Vec<u8>) -> Self {
        Self {
            kind,
            flags: FrameFlags::empty(),
            payload,
        }
    }

    /// Build a frame with explicit flags.
    pub fn with_flags(kind: FrameKind, flags: FrameFlags, payload: Vec<u8>) -> Self {
        Self {
            kind,
            flags,
            payload,
        }
    }

    /// Set [`FrameFlags::END_OF_SEQUENCE`].
    pub fn end_of_sequence(mut self) -> Self {
        self.flags |= FrameFlags::END_OF_SEQUENCE;
        self
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn flags(&self) -> FrameFlags {
        self.flags
    }

    /// The valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of valid payload bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Consume the frame, returning its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn is_end_of_sequence(&self) -> bool {
        self.flags.contains(FrameFlags::END_OF_SEQUENCE)
    }

    pub fn is_archive(&self) -> bool {
        self.flags.contains(FrameFlags::IS_ARCHIVE)
    }

    /// Total encoded size on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    // ── Encoding ─────────────────────────────────────────────────

    /// Append the encoded frame to `dst`.
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        dst.reserve(self.encoded_len());
        dst.push(self.kind as u8);
        dst.push(self.flags.bits());
        dst.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        dst.extend_from_slice(&self.payload);
    }

    /// Encode into a fresh byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut out);
        out
    }

    /// Parse one frame from the start of `src`.
    ///
    /// Returns the frame and the number of bytes consumed, so the
    /// same routine decodes both a live stream region and a
    /// sub-region of a `CompressedBatch` payload. A region shorter
    /// than the declared frame is a [`CastError::TruncatedFrame`];
    /// the streaming codec maps that case to needs-more-data instead.
    pub fn parse(src: &[u8]) -> Result<(Self, usize), CastError> {
        if src.len() < HEADER_SIZE {
            return Err(CastError::TruncatedFrame {
                need: HEADER_SIZE,
                have: src.len(),
            });
        }

        let kind = FrameKind::try_from(src[0])?;
        let flags = FrameFlags::from_bits(src[1])
            .ok_or(CastError::ProtocolViolation("unknown flag bits set"))?;
        let payload_len =
            u32::from_le_bytes(src[2..6].try_into().expect("header slice is 4 bytes")) as usize;

        if payload_len > MAX_RECV_PAYLOAD {
            return Err(CastError::PayloadTooLarge {
                size: payload_len,
                max: MAX_RECV_PAYLOAD,
            });
        }

        let total = HEADER_SIZE + payload_len;
        if src.len() < total {
            return Err(CastError::TruncatedFrame {
                need: total,
                have: src.len(),
            });
        }

        Ok((
            Self {
                kind,
                flags,
                payload: src[HEADER_SIZE..total].to_vec(),
            },
            total,
        ))
    }
}

// ── Tests ────────────────────────────────────────────────────────
