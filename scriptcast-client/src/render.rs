//! The client-side decode and render path.
//!
//! Owns the persistent screen buffer that batched diffs patch in
//! place. Plain `ScreenText` frames print as they arrive; batched
//! `ScreenText` sub-frames go through the delta decoder and redraw
//! the screen; `AnsiCommand` frames bypass the diff decoder entirely
//! and are re-encoded (byte → char) for direct interpretation.

use std::io::Write;

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};

use scriptcast_core::screen::{ScreenBuffer, apply_delta, unpack_batch};
use scriptcast_core::text::{CLEAR_SCREEN, CURSOR_HOME, is_prefix, widen};
use scriptcast_core::{CastError, Frame, FrameKind};

/// Renders the response stream onto a terminal-like writer.
pub struct TerminalRenderer<W: Write> {
    screen: ScreenBuffer,
    out: W,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            screen: ScreenBuffer::new(),
            out,
        }
    }

    /// The current decoded screen content, without trailing padding.
    pub fn screen_content(&self) -> &[u8] {
        self.screen.trimmed()
    }

    /// Render one incoming frame. Returns the number of render calls
    /// performed — one per top-level frame, one per sub-frame of a
    /// batch, preserving incremental-update semantics.
    pub fn render_frame(&mut self, frame: &Frame) -> Result<usize, CastError> {
        match frame.kind() {
            FrameKind::ScreenText => {
                self.render_text(frame.payload())?;
                Ok(1)
            }
            FrameKind::AnsiCommand => {
                self.render_ansi(frame.payload())?;
                Ok(1)
            }
            FrameKind::CompressedBatch => {
                let mut rendered = 0;
                for sub in unpack_batch(frame.payload())? {
                    match sub.kind() {
                        FrameKind::ScreenText => {
                            apply_delta(self.screen.as_mut_bytes(), sub.payload())?;
                            self.render_screen()?;
                        }
                        FrameKind::AnsiCommand => self.render_ansi(sub.payload())?,
                        _ => {
                            return Err(CastError::ProtocolViolation(
                                "unexpected sub-frame kind in batch",
                            ));
                        }
                    }
                    rendered += 1;
                }
                Ok(rendered)
            }
            _ => Err(CastError::ProtocolViolation(
                "unexpected frame kind in output stream",
            )),
        }
    }

    /// Plain text: widen and print as-is.
    fn render_text(&mut self, bytes: &[u8]) -> Result<(), CastError> {
        write!(self.out, "{}", widen(bytes))?;
        self.out.flush()?;
        Ok(())
    }

    /// Control sequence: known prefixes drive the terminal directly;
    /// anything else prints raw.
    fn render_ansi(&mut self, bytes: &[u8]) -> Result<(), CastError> {
        if is_prefix(CLEAR_SCREEN, bytes) {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
            // Keep the decode-side buffer in step with the encoder's
            // post-clear baseline.
            self.screen.clear();
        } else if is_prefix(CURSOR_HOME, bytes) {
            execute!(self.out, MoveTo(0, 0))?;
        } else {
            write!(self.out, "{}", widen(bytes))?;
            self.out.flush()?;
        }
        Ok(())
    }

    /// Redraw the full screen buffer from the top-left corner.
    fn render_screen(&mut self) -> Result<(), CastError> {
        execute!(self.out, MoveTo(0, 0))?;
        write!(self.out, "{}", widen(self.screen.trimmed()))?;
        self.out.flush()?;
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────
