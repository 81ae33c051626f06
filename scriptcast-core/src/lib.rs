//! # scriptcast-core
//!
//! Core protocol library for the scriptcast remote-execution system.
//!
//! This crate contains:
//! - **Frame**: the atomic protocol message (`Frame`, `FrameKind`,
//!   `FrameFlags`) and its wire encoding
//! - **Codec**: `FrameCodec` for framed TCP I/O via `tokio_util`
//! - **Connection**: managed TCP connections with a shared writer
//! - **Screen**: fixed-size frame buffer, delta compression engine,
//!   and the batching multiplexer for low-latency mode
//! - **Text**: prefix matching, byte widening, chunk splitting
//! - **Error**: `CastError` — typed, `thiserror`-based error hierarchy

pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod screen;
pub mod text;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::FrameCodec;
pub use connection::{Connection, ConnectionInfo, ConnectionSender};
pub use error::CastError;
pub use frame::{
    ARCHIVE_SUFFIX, Frame, FrameFlags, FrameKind, HEADER_SIZE, MAX_BLOCK_SIZE, MAX_RECV_PAYLOAD,
    SCRIPT_SUFFIX, SHARED_MARKER,
};
pub use screen::{
    DeltaEncoder, FrameBatcher, SCREEN_SIZE, ScreenBuffer, apply_delta, pack_batch, unpack_batch,
};
