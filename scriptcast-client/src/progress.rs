//! Upload progress reporting.
//!
//! A small owned struct passed explicitly to the reporting call — no
//! globals, no shared cursor state.

use std::io::Write;

/// Tracks how much of one upload has been sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMeter {
    total_bytes: u64,
    sent_bytes: u64,
    chunks: u64,
}

impl ProgressMeter {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            sent_bytes: 0,
            chunks: 0,
        }
    }

    /// Account for one sent chunk.
    pub fn record(&mut self, chunk_len: usize) {
        self.sent_bytes += chunk_len as u64;
        self.chunks += 1;
    }

    pub fn sent_bytes(&self) -> u64 {
        self.sent_bytes
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Whole-number percentage, 100 for zero-byte totals.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.sent_bytes * 100) / self.total_bytes).min(100) as u8
    }

    /// One status line, suitable for carriage-return updates.
    pub fn line(&self) -> String {
        format!(
            "uploading {}/{} bytes ({} chunks, {}%)",
            self.sent_bytes,
            self.total_bytes,
            self.chunks,
            self.percent(),
        )
    }

    /// Rewrite the status line in place on `out`.
    pub fn report(&self, out: &mut impl Write) {
        let _ = write!(out, "\r{}", self.line());
        let _ = out.flush();
    }

    /// Finish the status line with a newline.
    pub fn finish(&self, out: &mut impl Write) {
        let _ = writeln!(out, "\r{}", self.line());
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_bytes_and_chunks() {
        let mut meter = ProgressMeter::new(2500);
        meter.record(1024);
        meter.record(1024);
        meter.record(452);
        assert_eq!(meter.sent_bytes(), 2500);
        assert_eq!(meter.chunks(), 3);
        assert_eq!(meter.percent(), 100);
    }

    #[test]
    fn percent_is_bounded() {
        let mut meter = ProgressMeter::new(100);
        assert_eq!(meter.percent(), 0);
        meter.record(50);
        assert_eq!(meter.percent(), 50);
        meter.record(200); // more than declared
        assert_eq!(meter.percent(), 100);
    }

    #[test]
    fn report_rewrites_in_place() {
        let mut meter = ProgressMeter::new(10);
        meter.record(10);
        let mut out = Vec::new();
        meter.report(&mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with('\r'));
        assert!(text.contains("10/10"));
        assert!(text.contains("1 chunks"));
    }
}
