//! The per-session host surface exposed to a running script.
//!
//! One `SessionHost` exists per connection, owned by the connection
//! task for the duration of `Executing`/`Streaming`. It owns the
//! server-side screen state (buffer + delta encoder), the optional
//! batching multiplexer, and the collaborator handles. Once the
//! connection is gone every output call degrades to a no-op, so a
//! script outliving its client cannot wedge the session task.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use scriptcast_core::screen::{DeltaEncoder, FrameBatcher, SCREEN_SIZE, ScreenBuffer};
use scriptcast_core::text::{CLEAR_SCREEN, CURSOR_HOME, split_chunks};
use scriptcast_core::{CastError, ConnectionSender, Frame, FrameKind, MAX_BLOCK_SIZE};

use crate::runtime::{AssistantClient, AudioPlayer};

/// Host-side state and capabilities for one executing script.
pub struct SessionHost {
    out: ConnectionSender,
    batcher: FrameBatcher,
    screen: ScreenBuffer,
    encoder: DeltaEncoder,
    args: String,
    script_dir: PathBuf,
    auto_newline: bool,
    /// Set when the connection goes away; output becomes a no-op.
    dead: bool,
    assistant: Arc<dyn AssistantClient>,
    audio: Arc<dyn AudioPlayer>,
}

impl SessionHost {
    pub fn new(
        out: ConnectionSender,
        args: String,
        assistant: Arc<dyn AssistantClient>,
        audio: Arc<dyn AudioPlayer>,
    ) -> Self {
        Self {
            out,
            batcher: FrameBatcher::new(),
            screen: ScreenBuffer::new(),
            encoder: DeltaEncoder::new(SCREEN_SIZE),
            args,
            script_dir: PathBuf::new(),
            auto_newline: true,
            dead: false,
            assistant,
            audio,
        }
    }

    /// Record the directory of the script about to run.
    pub fn set_script_dir(&mut self, dir: &Path) {
        self.script_dir = dir.to_path_buf();
    }

    /// True once the connection has been torn down.
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    // ── Output path ──────────────────────────────────────────────

    /// Send one frame, through the batcher while compression mode is
    /// active, directly otherwise. A send failure marks the host dead
    /// instead of propagating: the session is already gone and the
    /// script's remaining output must become no-ops.
    async fn emit(&mut self, frame: Frame) {
        if self.dead {
            return;
        }
        let result = if self.batcher.is_running() {
            self.batcher.enqueue(frame).await
        } else {
            self.out.send(frame).await.map_err(|_| CastError::ChannelClosed)
        };
        if result.is_err() {
            debug!("connection gone; muting script output");
            self.dead = true;
        }
    }

    // ── Capabilities ─────────────────────────────────────────────

    /// Print the given values, joined with single spaces, with an
    /// optional trailing newline per [`set_auto_newline`](Self::set_auto_newline).
    ///
    /// In compression mode the text becomes the new screen content
    /// and only the delta goes out; otherwise it is chunked into
    /// plain `ScreenText` frames of at most [`MAX_BLOCK_SIZE`].
    pub async fn print(&mut self, values: &[String]) -> Result<(), CastError> {
        let mut text = values.join(" ");
        if self.auto_newline {
            text.push('\n');
        }

        if self.batcher.is_running() {
            self.screen.load(text.as_bytes());
            let diff = self.encoder.encode(self.screen.as_bytes())?;
            // An unchanged screen produces an empty diff; skip it.
            if diff != [0, 0] {
                self.emit(Frame::new(FrameKind::ScreenText, diff)).await;
            }
        } else {
            for chunk in split_chunks(&text, MAX_BLOCK_SIZE) {
                self.emit(Frame::new(FrameKind::ScreenText, chunk.as_bytes().to_vec()))
                    .await;
            }
        }
        Ok(())
    }

    /// Blocking delay, from the script's point of view.
    pub async fn wait(&self, millis: u64) {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }

    /// Toggle the trailing newline appended by [`print`](Self::print).
    pub fn set_auto_newline(&mut self, enabled: bool) {
        self.auto_newline = enabled;
    }

    /// Enable or disable compression/low-latency mode.
    ///
    /// Returns whether the status actually changed; enabling an
    /// already-enabled mode (or disabling a disabled one) is a no-op.
    pub async fn set_compression(&mut self, enabled: bool) -> bool {
        if enabled {
            self.batcher.start(self.out.clone())
        } else {
            self.batcher.stop().await
        }
    }

    /// Emit a clear-screen control sequence and reset both the local
    /// screen copy and the delta baseline so encoder and renderer
    /// stay in sync.
    pub async fn clear_screen(&mut self) {
        self.screen.clear();
        self.encoder.reset();
        self.emit(Frame::new(FrameKind::AnsiCommand, CLEAR_SCREEN.to_vec()))
            .await;
    }

    /// Emit a cursor-home control sequence.
    pub async fn cursor_home(&mut self) {
        self.emit(Frame::new(FrameKind::AnsiCommand, CURSOR_HOME.to_vec()))
            .await;
    }

    /// The argument string received from the client.
    pub fn args(&self) -> &str {
        &self.args
    }

    /// Forward a natural-language question to the assistant
    /// collaborator.
    pub async fn ask_assistant(&self, question: &str) -> Result<String, CastError> {
        self.assistant.ask(question).await
    }

    /// Start playback of an audio file. Returns whether playback
    /// started.
    pub async fn play(&self, file: &str) -> bool {
        self.audio.play(file).await
    }

    /// Stop all active playback.
    pub async fn stop_all_playback(&self) {
        self.audio.stop_all().await;
    }

    /// Directory containing the executing script.
    pub fn script_directory(&self) -> String {
        self.script_dir.display().to_string()
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Tear down after the script returns: flush and stop the
    /// batcher if the script left compression mode on.
    pub async fn shutdown(&mut self) {
        self.batcher.stop().await;
        self.audio.stop_all().await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
