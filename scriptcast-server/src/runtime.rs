//! Collaborator seams: the script interpreter, the assistant client,
//! and the audio subsystem.
//!
//! These are external to the protocol/compression core and are
//! reached only through the narrow traits below. The server binary
//! ships a process-based interpreter plus inert assistant/audio
//! implementations; an embedded interpreter integrates by
//! implementing [`ScriptRuntime`] and binding the capability table.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use scriptcast_core::CastError;

use crate::host::SessionHost;

// ── Traits ───────────────────────────────────────────────────────

/// Runs one script to completion against a session host.
#[async_trait]
pub trait ScriptRuntime: Send + Sync {
    async fn run(&self, script: &Path, host: &mut SessionHost) -> Result<(), CastError>;
}

/// Answers natural-language questions on behalf of a script.
#[async_trait]
pub trait AssistantClient: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, CastError>;
}

/// Plays audio files on the server machine.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Start playback; returns whether playback started.
    async fn play(&self, file: &str) -> bool;
    /// Stop everything currently playing.
    async fn stop_all(&self);
}

// ── ProcessRuntime ───────────────────────────────────────────────

/// Invokes a configured interpreter executable on the resolved
/// script, relaying its stdout line by line through the host's print
/// capability so output streams while the script still runs.
pub struct ProcessRuntime {
    interpreter: String,
}

impl ProcessRuntime {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }
}

#[async_trait]
impl ScriptRuntime for ProcessRuntime {
    async fn run(&self, script: &Path, host: &mut SessionHost) -> Result<(), CastError> {
        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(script);
        // The argument string travels as one argv entry; the script
        // sees the same value through get_args.
        if !host.args().is_empty() {
            cmd.arg(host.args());
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| CastError::Script(format!("spawn {}: {e}", self.interpreter)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or(CastError::Script("child stdout unavailable".into()))?;

        // Drain stderr concurrently so a chatty script cannot fill
        // the pipe and stall itself.
        let stderr_drain = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("script stderr: {line}");
                }
            })
        });

        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            host.print(&[line]).await?;
        }

        if let Some(drain) = stderr_drain {
            let _ = drain.await;
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CastError::Script(format!("wait for interpreter: {e}")))?;
        if !status.success() {
            return Err(CastError::Script(format!(
                "interpreter exited with {status}"
            )));
        }
        Ok(())
    }
}

// ── Inert collaborators ──────────────────────────────────────────

/// Assistant stand-in used when no HTTP backend is configured.
pub struct DisabledAssistant;

#[async_trait]
impl AssistantClient for DisabledAssistant {
    async fn ask(&self, question: &str) -> Result<String, CastError> {
        warn!("assistant not configured; dropping question ({} bytes)", question.len());
        Err(CastError::Script("assistant not configured".into()))
    }
}

/// Audio stand-in for headless servers: playback never starts.
pub struct SilentAudio;

#[async_trait]
impl AudioPlayer for SilentAudio {
    async fn play(&self, file: &str) -> bool {
        debug!("audio not configured; ignoring play({file})");
        false
    }

    async fn stop_all(&self) {}
}

// ── Tests ────────────────────────────────────────────────────────
