//! The screen multiplexer: batches small outgoing frames into one
//! `CompressedBatch` container while low-latency mode is active.
//!
//! Modeled as a bounded queue drained by a dedicated flush task. The
//! session enqueues sub-frames; the flusher packs whatever is pending
//! into a single batch on a short tick (or earlier, when the batch
//! would outgrow the receive limit) and hands it to the connection's
//! shared writer. Stopping drops the queue, which makes the flusher
//! emit the final partial batch and exit; `stop` joins it so teardown
//! is synchronous from the caller's point of view.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::debug;

use crate::connection::ConnectionSender;
use crate::error::CastError;
use crate::frame::{Frame, FrameKind, MAX_RECV_PAYLOAD};

/// How long pending sub-frames may sit before a flush.
const FLUSH_INTERVAL: Duration = Duration::from_millis(25);

/// Depth of the sub-frame queue between session and flusher.
const QUEUE_DEPTH: usize = 64;

// ── Packing ──────────────────────────────────────────────────────

/// Pack sub-frames back-to-back into one `CompressedBatch` frame.
pub fn pack_batch(frames: &[Frame]) -> Frame {
    let mut payload = Vec::with_capacity(frames.iter().map(Frame::encoded_len).sum());
    for frame in frames {
        frame.encode_to(&mut payload);
    }
    Frame::new(FrameKind::CompressedBatch, payload)
}

/// Unpack a `CompressedBatch` payload into its sub-frames, in order.
///
/// The payload must be exhausted exactly; a batch that ends inside a
/// sub-frame is corrupt.
pub fn unpack_batch(payload: &[u8]) -> Result<Vec<Frame>, CastError> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < payload.len() {
        let (frame, consumed) = Frame::parse(&payload[pos..]).map_err(|e| match e {
            CastError::TruncatedFrame { .. } => {
                CastError::Encoding("batch payload truncated mid sub-frame".into())
            }
            other => other,
        })?;
        frames.push(frame);
        pos += consumed;
    }
    Ok(frames)
}

// ── FrameBatcher ─────────────────────────────────────────────────

/// Owns the optional background flush task for one connection.
///
/// Starting an already-running batcher, or stopping an already
/// stopped one, is a no-op that reports the status as unchanged.
#[derive(Debug, Default)]
pub struct FrameBatcher {
    active: Option<Active>,
}

#[derive(Debug)]
struct Active {
    queue: mpsc::Sender<Frame>,
    flusher: JoinHandle<()>,
}

impl FrameBatcher {
    pub fn new() -> Self {
        Self { active: None }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Start the flush task, sending batches through `out`.
    ///
    /// Returns `false` (status unchanged) if already running.
    pub fn start(&mut self, out: ConnectionSender) -> bool {
        if self.active.is_some() {
            return false;
        }
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let flusher = tokio::spawn(flush_loop(rx, out));
        self.active = Some(Active { queue: tx, flusher });
        true
    }

    /// Queue a sub-frame for the next batch.
    pub async fn enqueue(&self, frame: Frame) -> Result<(), CastError> {
        match &self.active {
            Some(active) => active
                .queue
                .send(frame)
                .await
                .map_err(|_| CastError::ChannelClosed),
            None => Err(CastError::ChannelClosed),
        }
    }

    /// Stop the flush task, emitting any pending batch first.
    ///
    /// Returns `false` (status unchanged) if already stopped.
    pub async fn stop(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                // Dropping the queue ends the flush loop after its
                // final flush; join so teardown is synchronous.
                drop(active.queue);
                if let Err(e) = active.flusher.await {
                    debug!("batch flusher join error: {e}");
                }
                true
            }
            None => false,
        }
    }
}

// ── Flush loop ───────────────────────────────────────────────────

async fn flush_loop(mut rx: mpsc::Receiver<Frame>, out: ConnectionSender) {
    let mut pending: Vec<Frame> = Vec::new();
    let mut pending_bytes = 0usize;

    let mut ticker = interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(frame) => {
                    // Never let one batch outgrow the receive limit.
                    if pending_bytes + frame.encoded_len() > MAX_RECV_PAYLOAD
                        && !pending.is_empty()
                        && !flush(&mut pending, &mut pending_bytes, &out).await
                    {
                        break;
                    }
                    pending_bytes += frame.encoded_len();
                    pending.push(frame);
                }
                None => {
                    flush(&mut pending, &mut pending_bytes, &out).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                if !pending.is_empty()
                    && !flush(&mut pending, &mut pending_bytes, &out).await
                {
                    break;
                }
            }
        }
    }
}

/// Emit the pending sub-frames as one batch. Returns `false` when the
/// connection is gone and the loop should end.
async fn flush(pending: &mut Vec<Frame>, pending_bytes: &mut usize, out: &ConnectionSender) -> bool {
    if pending.is_empty() {
        return true;
    }
    let batch = pack_batch(pending);
    pending.clear();
    *pending_bytes = 0;
    out.send(batch).await.is_ok()
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFlags;

    fn text_frame(s: &str) -> Frame {
        Frame::new(FrameKind::ScreenText, s.as_bytes().to_vec())
    }

    #[test]
    fn pack_unpack_preserves_order_and_count() {
        let frames = vec![
            text_frame("one"),
            Frame::new(FrameKind::AnsiCommand, b"\x1b[2J".to_vec()),
            text_frame("three"),
        ];
        let batch = pack_batch(&frames);
        assert_eq!(batch.kind(), FrameKind::CompressedBatch);

        let unpacked = unpack_batch(batch.payload()).unwrap();
        assert_eq!(unpacked.len(), 3);
        assert_eq!(unpacked, frames);
    }

    #[test]
    fn pack_unpack_keeps_flags() {
        let frames = vec![Frame::with_flags(
            FrameKind::ScreenText,
            FrameFlags::END_OF_SEQUENCE,
            b"fin".to_vec(),
        )];
        let unpacked = unpack_batch(pack_batch(&frames).payload()).unwrap();
        assert!(unpacked[0].is_end_of_sequence());
    }

    #[test]
    fn unpack_empty_batch() {
        assert!(unpack_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn unpack_truncated_batch_is_an_error() {
        let batch = pack_batch(&[text_frame("payload")]);
        let bytes = batch.payload();
        assert!(matches!(
            unpack_batch(&bytes[..bytes.len() - 2]),
            Err(CastError::Encoding(_))
        ));
    }

    #[tokio::test]
    async fn start_and_stop_report_status_changes() {
        let (tx, _rx) = mpsc::channel(8);
        let mut batcher = FrameBatcher::new();

        assert!(!batcher.is_running());
        assert!(batcher.start(tx.clone()));
        assert!(batcher.is_running());

        // Starting again is a no-op reporting unchanged status.
        assert!(!batcher.start(tx));
        assert!(batcher.is_running());

        assert!(batcher.stop().await);
        assert!(!batcher.is_running());
        assert!(!batcher.stop().await);
    }

    #[tokio::test]
    async fn stop_flushes_pending_frames_as_one_batch() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut batcher = FrameBatcher::new();
        batcher.start(tx);

        batcher.enqueue(text_frame("a")).await.unwrap();
        batcher.enqueue(text_frame("b")).await.unwrap();
        batcher.enqueue(text_frame("c")).await.unwrap();
        batcher.stop().await;

        // Everything queued before stop arrives, batched in order.
        let mut sub_frames = Vec::new();
        while let Ok(batch) = rx.try_recv() {
            assert_eq!(batch.kind(), FrameKind::CompressedBatch);
            sub_frames.extend(unpack_batch(batch.payload()).unwrap());
        }
        let texts: Vec<&[u8]> = sub_frames.iter().map(Frame::payload).collect();
        assert_eq!(texts, vec![b"a" as &[u8], b"b", b"c"]);
    }

    #[tokio::test]
    async fn enqueue_after_stop_is_rejected() {
        let (tx, _rx) = mpsc::channel(8);
        let mut batcher = FrameBatcher::new();
        batcher.start(tx);
        batcher.stop().await;
        assert!(matches!(
            batcher.enqueue(text_frame("late")).await,
            Err(CastError::ChannelClosed)
        ));
    }
}
