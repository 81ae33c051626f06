//! The client driver: upload sequence and receive loop.
//!
//! Strictly ordered, one round per phase:
//!
//! 1. Resolve shared-reference vs. local file; open local files
//!    before any network I/O.
//! 2. Send `FileReference`.
//! 3. Send `Arguments` if supplied.
//! 4. Stream `ExecutableChunk` frames (non-shared only), the final
//!    chunk trimmed and flagged end-of-sequence.
//! 5. Receive and render until end-of-sequence or close.
//! 6. Close unconditionally.
//!
//! A send failure aborts the remaining steps; the file handle and
//! the connection are released on every exit path.

use std::io::Write;
use std::path::Path;

use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use scriptcast_core::{
    ARCHIVE_SUFFIX, CastError, Connection, Frame, FrameFlags, FrameKind, MAX_BLOCK_SIZE,
    SHARED_MARKER,
};

use crate::progress::ProgressMeter;
use crate::render::TerminalRenderer;

/// What to run and where.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Server address (`host:port`).
    pub server: String,
    /// Local script/archive path, or a shared reference containing
    /// the marker (e.g. `shared:game.lua`).
    pub target: String,
    /// Optional argument string for the script.
    pub args: Option<String>,
}

/// Drives one full exchange against the server.
pub struct Driver {
    options: ClientOptions,
}

impl Driver {
    pub fn new(options: ClientOptions) -> Self {
        Self { options }
    }

    /// Run the exchange, rendering output to `out` and upload
    /// progress to `status`.
    pub async fn run(
        &self,
        out: impl Write,
        status: &mut impl Write,
    ) -> Result<(), CastError> {
        let shared = self.options.target.contains(SHARED_MARKER);

        // Local open failures abort before any network I/O.
        let local = if shared {
            None
        } else {
            let file = tokio::fs::File::open(&self.options.target).await?;
            let size = file.metadata().await?.len();
            if size == 0 {
                return Err(CastError::Other(format!(
                    "{} is empty",
                    self.options.target
                )));
            }
            Some((file, size))
        };

        let mut conn = Connection::connect(&self.options.server).await?;
        info!("connected to {}", self.options.server);

        let result = self.exchange(&mut conn, local, shared, out, status).await;
        // Step 6: close unconditionally, success or failure.
        conn.close();
        result
    }

    async fn exchange(
        &self,
        conn: &mut Connection,
        local: Option<(tokio::fs::File, u64)>,
        shared: bool,
        out: impl Write,
        status: &mut impl Write,
    ) -> Result<(), CastError> {
        let has_args = self.options.args.is_some();

        // ── 2. File reference ───────────────────────────────────
        let reference = self.reference_name(shared)?;
        let mut flags = FrameFlags::empty();
        if reference.ends_with(ARCHIVE_SUFFIX) {
            flags |= FrameFlags::IS_ARCHIVE;
        }
        // Shared references send no bytes; without arguments this
        // single frame is the whole upload phase.
        if shared && !has_args {
            flags |= FrameFlags::END_OF_SEQUENCE;
        }
        conn.send(Frame::with_flags(
            FrameKind::FileReference,
            flags,
            reference.into_bytes(),
        ))
        .await?;

        // ── 3. Arguments ────────────────────────────────────────
        if let Some(args) = &self.options.args {
            let mut frame = Frame::new(FrameKind::Arguments, args.as_bytes().to_vec());
            if shared {
                frame = frame.end_of_sequence();
            }
            conn.send(frame).await?;
        }

        // ── 4. Executable chunks ────────────────────────────────
        if let Some((mut file, size)) = local {
            let mut meter = ProgressMeter::new(size);
            let mut buf = vec![0u8; MAX_BLOCK_SIZE];
            let mut pending: Option<Vec<u8>> = None;

            loop {
                let n = read_block(&mut file, &mut buf).await?;
                if n == 0 {
                    break;
                }
                if let Some(chunk) = pending.take() {
                    meter.record(chunk.len());
                    conn.send(Frame::new(FrameKind::ExecutableChunk, chunk))
                        .await?;
                    meter.report(status);
                }
                // Trim to the bytes actually read.
                pending = Some(buf[..n].to_vec());
            }

            match pending {
                Some(chunk) => {
                    meter.record(chunk.len());
                    conn.send(Frame::new(FrameKind::ExecutableChunk, chunk).end_of_sequence())
                        .await?;
                    meter.finish(status);
                }
                // Size was checked before connecting; a file shrunk
                // to zero mid-read still must not stall the server.
                None => {
                    return Err(CastError::Other(format!(
                        "{} became empty during upload",
                        self.options.target
                    )));
                }
            }
            debug!("upload done: {} chunks", meter.chunks());
        }

        // ── 5. Receive loop ─────────────────────────────────────
        let mut renderer = TerminalRenderer::new(out);
        loop {
            match conn.recv().await {
                Some(frame) => {
                    let finished = frame.is_end_of_sequence();
                    renderer.render_frame(&frame)?;
                    if finished {
                        return Ok(());
                    }
                }
                // Closed without the end marker: the server reported
                // failure by not reporting success.
                None => return Err(CastError::ConnectionClosed),
            }
        }
    }

    /// The name sent in the `FileReference` frame: the full shared
    /// reference, or the file name of the local path.
    fn reference_name(&self, shared: bool) -> Result<String, CastError> {
        if shared {
            return Ok(self.options.target.clone());
        }
        Path::new(&self.options.target)
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| CastError::Other(format!("unusable path: {}", self.options.target)))
    }
}

/// Fill `buf` from `file`, tolerating short reads. Returns the number
/// of valid bytes; less than the buffer length only at end of file.
async fn read_block(file: &mut tokio::fs::File, buf: &mut [u8]) -> Result<usize, CastError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
