//! Per-connection session: the upload state machine and the
//! execute-and-stream phase.
//!
//! ```text
//! AwaitingReference ──► AwaitingArguments/AwaitingChunks ──► Executing
//!                                                               │
//!      Closed ◄──────────────── Streaming ◄────────────────────┘
//! ```
//!
//! Transitions are driven by the kind of each received frame — the
//! only fixed ordering is that a `FileReference` comes first. The
//! orchestrator runs synchronously within the connection's task;
//! streaming ends when it returns, and the connection is flushed and
//! closed unconditionally afterwards. On success the stream is
//! terminated by an empty `ScreenText` frame flagged end-of-sequence;
//! a failed execution closes without the marker, which the client
//! maps to a failed outcome.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use scriptcast_core::{
    ARCHIVE_SUFFIX, CastError, Connection, Frame, FrameKind, SCRIPT_SUFFIX, SHARED_MARKER,
};

use crate::config::ServerConfig;
use crate::executor::{ExecutionRequest, Orchestrator, random_name};
use crate::host::SessionHost;
use crate::runtime::{AssistantClient, AudioPlayer, ScriptRuntime};

/// One accepted connection, from reference receipt to close.
pub struct Session {
    conn: Connection,
    config: Arc<ServerConfig>,
    runtime: Arc<dyn ScriptRuntime>,
    assistant: Arc<dyn AssistantClient>,
    audio: Arc<dyn AudioPlayer>,
}

impl Session {
    pub fn new(
        conn: Connection,
        config: Arc<ServerConfig>,
        runtime: Arc<dyn ScriptRuntime>,
        assistant: Arc<dyn AssistantClient>,
        audio: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            conn,
            config,
            runtime,
            assistant,
            audio,
        }
    }

    /// Drive the session to completion, logging the outcome. Errors
    /// terminate this session only — never the process.
    pub async fn run(mut self) {
        match self.serve().await {
            Ok(()) => info!("session complete"),
            Err(e) => warn!("session ended: {e}"),
        }
    }

    async fn serve(&mut self) -> Result<(), CastError> {
        let request = self.receive_upload().await?;
        info!(
            reference = %request.reference_name,
            shared = request.shared,
            archive = request.is_archive,
            "upload phase complete"
        );

        let mut host = SessionHost::new(
            self.conn.sender(),
            request.args.clone(),
            self.assistant.clone(),
            self.audio.clone(),
        );
        let orchestrator = Orchestrator::new(
            &self.config.storage.download_dir,
            &self.config.storage.shared_dir,
        );

        let outcome = orchestrator
            .execute(&request, &mut host, self.runtime.as_ref())
            .await;
        host.shutdown().await;
        outcome?;

        // Success: terminate the output stream explicitly. The
        // connection's writer flushes pending frames on close.
        self.conn
            .send(Frame::new(FrameKind::ScreenText, Vec::new()).end_of_sequence())
            .await?;
        Ok(())
    }

    // ── Upload state machine ─────────────────────────────────────

    async fn receive_upload(&mut self) -> Result<ExecutionRequest, CastError> {
        let frame = self
            .conn
            .recv()
            .await
            .ok_or(CastError::ConnectionClosed)?;
        if frame.kind() != FrameKind::FileReference {
            return Err(CastError::ProtocolViolation(
                "upload must start with a file reference",
            ));
        }
        if frame.payload_len() == 0 {
            return Err(CastError::ProtocolViolation("empty file reference"));
        }

        let is_archive = frame.is_archive();
        let mut phase_done = frame.is_end_of_sequence();
        let name = String::from_utf8(frame.into_payload())?;

        // Shared references resolve in place; uploads get a fresh
        // randomly named write target in the download directory.
        let (script_path, reference_name, shared, mut writer) =
            if let Some(idx) = name.find(SHARED_MARKER) {
                let suffix = &name[idx + SHARED_MARKER.len()..];
                if suffix.is_empty() {
                    return Err(CastError::ProtocolViolation("empty shared reference"));
                }
                let path = self.config.storage.shared_dir.join(suffix);
                (path, suffix.to_string(), true, None)
            } else {
                let ext = if is_archive { ARCHIVE_SUFFIX } else { SCRIPT_SUFFIX };
                tokio::fs::create_dir_all(&self.config.storage.download_dir).await?;
                let path = self
                    .config
                    .storage
                    .download_dir
                    .join(random_name("upload-", ext));
                let file = tokio::fs::File::create(&path).await?;
                (path, name.clone(), false, Some(file))
            };

        let mut args = String::new();
        while !phase_done {
            let frame = self
                .conn
                .recv()
                .await
                .ok_or(CastError::ConnectionClosed)?;
            if frame.payload_len() == 0 {
                return Err(CastError::ProtocolViolation("empty upload payload"));
            }
            phase_done = frame.is_end_of_sequence();

            match frame.kind() {
                FrameKind::Arguments => {
                    args = String::from_utf8(frame.into_payload())?;
                }
                FrameKind::ExecutableChunk => {
                    // Chunks carry no data for shared references.
                    if let Some(file) = writer.as_mut() {
                        file.write_all(frame.payload()).await?;
                    }
                }
                _ => {
                    return Err(CastError::ProtocolViolation(
                        "unexpected frame kind during upload",
                    ));
                }
            }
        }

        if let Some(mut file) = writer.take() {
            file.flush().await?;
        }

        Ok(ExecutionRequest {
            script_path,
            reference_name,
            args,
            is_archive,
            shared,
        })
    }
}
