//! The fixed-capacity virtual screen buffer.
//!
//! Holds the full screen content as last rendered, one byte per cell.
//! The server's encode path and the client's decode path each own
//! their private copy; ownership never crosses a task boundary, so no
//! locking is involved anywhere in the screen pipeline.

/// Screen width in cells.
pub const SCREEN_WIDTH: usize = 80;

/// Screen height in cells.
pub const SCREEN_HEIGHT: usize = 25;

/// Total buffer capacity in bytes.
pub const SCREEN_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT;

/// Byte used for unoccupied cells.
const BLANK: u8 = b' ';

/// A full virtual screen: [`SCREEN_SIZE`] bytes, blank-padded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenBuffer {
    cells: Vec<u8>,
}

impl ScreenBuffer {
    /// A blank screen.
    pub fn new() -> Self {
        Self {
            cells: vec![BLANK; SCREEN_SIZE],
        }
    }

    /// Replace the screen content with `text`, blank-padding the
    /// remainder. Text longer than the screen is truncated.
    pub fn load(&mut self, text: &[u8]) {
        let n = text.len().min(SCREEN_SIZE);
        self.cells[..n].copy_from_slice(&text[..n]);
        self.cells[n..].fill(BLANK);
    }

    /// Blank every cell.
    pub fn clear(&mut self) {
        self.cells.fill(BLANK);
    }

    /// The full cell array.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }

    /// Mutable access for in-place delta application.
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    /// Content without the trailing blank padding.
    pub fn trimmed(&self) -> &[u8] {
        let end = self
            .cells
            .iter()
            .rposition(|&b| b != BLANK)
            .map_or(0, |i| i + 1);
        &self.cells[..end]
    }
}

impl Default for ScreenBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_blank() {
        let buf = ScreenBuffer::new();
        assert_eq!(buf.as_bytes().len(), SCREEN_SIZE);
        assert!(buf.as_bytes().iter().all(|&b| b == b' '));
        assert!(buf.trimmed().is_empty());
    }

    #[test]
    fn load_pads_with_blanks() {
        let mut buf = ScreenBuffer::new();
        buf.load(b"hello");
        assert_eq!(&buf.as_bytes()[..5], b"hello");
        assert_eq!(buf.as_bytes()[5], b' ');
        assert_eq!(buf.trimmed(), b"hello");
    }

    #[test]
    fn load_replaces_previous_content() {
        let mut buf = ScreenBuffer::new();
        buf.load(b"a longer first line");
        buf.load(b"short");
        assert_eq!(buf.trimmed(), b"short");
    }

    #[test]
    fn load_truncates_oversized_text() {
        let mut buf = ScreenBuffer::new();
        let big = vec![b'x'; SCREEN_SIZE + 100];
        buf.load(&big);
        assert_eq!(buf.as_bytes().len(), SCREEN_SIZE);
        assert!(buf.as_bytes().iter().all(|&b| b == b'x'));
    }

    #[test]
    fn clear_blanks_everything() {
        let mut buf = ScreenBuffer::new();
        buf.load(b"content");
        buf.clear();
        assert!(buf.trimmed().is_empty());
    }
}
