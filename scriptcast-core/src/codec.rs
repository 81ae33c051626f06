//! `tokio_util` codec over the frame wire format.
//!
//! Decoding delegates to [`Frame::parse`] so the live-stream path and
//! the in-memory batch-payload path share one parser; an incomplete
//! region is reported as needs-more-data rather than an error.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CastError;
use crate::frame::Frame;

/// Stateless codec for [`Frame`]s on a byte stream.
#[derive(Debug, Default)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CastError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match Frame::parse(src) {
            Ok((frame, consumed)) => {
                src.advance(consumed);
                Ok(Some(frame))
            }
            Err(CastError::TruncatedFrame { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CastError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item.encode());
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
