//! Run-level delta encoding between consecutive screen states.
//!
//! The encoder remembers the previously transmitted buffer and emits
//! only the contiguous byte runs that changed, dramatically reducing
//! bandwidth for animation-style updates where most of the screen is
//! static between frames.
//!
//! ## Wire format
//!
//! Little-endian:
//!
//! ```text
//! run_count: u16  (2)
//! runs:           (repeated run_count times)
//!   offset: u16   (2)
//!   len:    u16   (2)
//!   bytes:  [u8]  (len)
//! ```
//!
//! The hard contract is the round-trip property: applying the encoded
//! diff to the previous buffer reconstructs the new buffer exactly.

use crate::error::CastError;

// ── DeltaEncoder ─────────────────────────────────────────────────

/// Stateful encoder that owns the previously transmitted screen copy.
///
/// The first call after construction (or after [`reset`](Self::reset))
/// always emits the full buffer as a single run.
#[derive(Debug)]
pub struct DeltaEncoder {
    previous: Option<Vec<u8>>,
    size: usize,
}

impl DeltaEncoder {
    /// Create an encoder for buffers of exactly `size` bytes.
    pub fn new(size: usize) -> Self {
        assert!(size > 0 && size <= u16::MAX as usize, "size must fit in u16");
        Self {
            previous: None,
            size,
        }
    }

    /// Forget the previous state, forcing the next diff to carry the
    /// full buffer. Used after a clear-screen.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    /// Encode `current` as a diff against the previously encoded
    /// state, then remember `current` as the new baseline.
    ///
    /// An unchanged buffer encodes to an empty diff (`run_count` 0).
    pub fn encode(&mut self, current: &[u8]) -> Result<Vec<u8>, CastError> {
        if current.len() != self.size {
            return Err(CastError::Encoding(format!(
                "screen size mismatch: got {}, expected {}",
                current.len(),
                self.size,
            )));
        }

        let runs = match &self.previous {
            Some(prev) => changed_runs(prev, current),
            // No baseline: one run covering everything.
            None => vec![(0, current.len())],
        };

        let mut out = Vec::with_capacity(2 + runs.iter().map(|&(_, l)| 4 + l).sum::<usize>());
        out.extend_from_slice(&(runs.len() as u16).to_le_bytes());
        for (offset, len) in runs {
            out.extend_from_slice(&(offset as u16).to_le_bytes());
            out.extend_from_slice(&(len as u16).to_le_bytes());
            out.extend_from_slice(&current[offset..offset + len]);
        }

        self.previous = Some(current.to_vec());
        Ok(out)
    }
}

/// Maximal contiguous spans where `prev` and `cur` differ.
fn changed_runs(prev: &[u8], cur: &[u8]) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start: Option<usize> = None;

    for i in 0..cur.len() {
        if prev[i] != cur[i] {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            runs.push((s, i - s));
        }
    }
    if let Some(s) = start {
        runs.push((s, cur.len() - s));
    }
    runs
}

// ── Decode ───────────────────────────────────────────────────────

/// Apply an encoded diff onto `buffer` in place.
///
/// Every run is bounds-checked against the buffer; trailing bytes
/// after the declared runs are rejected so a corrupted diff cannot be
/// silently half-applied.
pub fn apply_delta(buffer: &mut [u8], diff: &[u8]) -> Result<(), CastError> {
    if diff.len() < 2 {
        return Err(CastError::Encoding("diff shorter than run count".into()));
    }
    let run_count = u16::from_le_bytes(diff[..2].try_into().expect("2-byte slice")) as usize;

    let mut pos = 2;
    for _ in 0..run_count {
        if diff.len() < pos + 4 {
            return Err(CastError::Encoding("diff truncated in run header".into()));
        }
        let offset =
            u16::from_le_bytes(diff[pos..pos + 2].try_into().expect("2-byte slice")) as usize;
        let len =
            u16::from_le_bytes(diff[pos + 2..pos + 4].try_into().expect("2-byte slice")) as usize;
        pos += 4;

        if diff.len() < pos + len {
            return Err(CastError::Encoding("diff truncated in run data".into()));
        }
        if offset + len > buffer.len() {
            return Err(CastError::DeltaOutOfBounds {
                offset,
                len,
                size: buffer.len(),
            });
        }

        buffer[offset..offset + len].copy_from_slice(&diff[pos..pos + len]);
        pos += len;
    }

    if pos != diff.len() {
        return Err(CastError::Encoding("trailing bytes after last run".into()));
    }
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 64;

    fn filled(b: u8) -> Vec<u8> {
        vec![b; N]
    }

    #[test]
    fn first_encode_carries_full_buffer() {
        let mut enc = DeltaEncoder::new(N);
        let cur = filled(b'x');
        let diff = enc.encode(&cur).unwrap();

        // One run: count + header + the whole buffer.
        assert_eq!(diff.len(), 2 + 4 + N);

        let mut screen = filled(0);
        apply_delta(&mut screen, &diff).unwrap();
        assert_eq!(screen, cur);
    }

    #[test]
    fn unchanged_buffer_encodes_empty_diff() {
        let mut enc = DeltaEncoder::new(N);
        let cur = filled(b'x');
        let _ = enc.encode(&cur).unwrap();
        let diff = enc.encode(&cur).unwrap();
        assert_eq!(diff, vec![0, 0]);

        let mut screen = cur.clone();
        apply_delta(&mut screen, &diff).unwrap();
        assert_eq!(screen, cur);
    }

    #[test]
    fn single_byte_change_is_one_small_run() {
        let mut enc = DeltaEncoder::new(N);
        let a = filled(b'a');
        let mut b = a.clone();
        b[10] = b'!';

        let _ = enc.encode(&a).unwrap();
        let diff = enc.encode(&b).unwrap();
        assert_eq!(diff.len(), 2 + 4 + 1);

        let mut screen = a.clone();
        apply_delta(&mut screen, &diff).unwrap();
        assert_eq!(screen, b);
    }

    #[test]
    fn roundtrip_over_a_sequence_of_states() {
        // decode(encode(A, B), A) == B across an animation-like run.
        let mut enc = DeltaEncoder::new(N);
        let mut screen = filled(0);

        let states: Vec<Vec<u8>> = (0..10u8)
            .map(|i| {
                let mut s = filled(b'.');
                // A moving sprite plus a static border.
                s[0] = b'#';
                s[N - 1] = b'#';
                s[(i as usize * 5) % (N - 2) + 1] = b'@';
                s
            })
            .collect();

        for state in &states {
            let diff = enc.encode(state).unwrap();
            apply_delta(&mut screen, &diff).unwrap();
            assert_eq!(&screen, state);
        }
    }

    #[test]
    fn disjoint_changes_become_separate_runs() {
        let mut enc = DeltaEncoder::new(N);
        let a = filled(b'a');
        let mut b = a.clone();
        b[0] = b'X';
        b[1] = b'Y';
        b[40] = b'Z';

        let _ = enc.encode(&a).unwrap();
        let diff = enc.encode(&b).unwrap();
        let run_count = u16::from_le_bytes([diff[0], diff[1]]);
        assert_eq!(run_count, 2);

        let mut screen = a.clone();
        apply_delta(&mut screen, &diff).unwrap();
        assert_eq!(screen, b);
    }

    #[test]
    fn reset_forces_full_diff() {
        let mut enc = DeltaEncoder::new(N);
        let cur = filled(b'q');
        let _ = enc.encode(&cur).unwrap();
        enc.reset();
        let diff = enc.encode(&cur).unwrap();
        assert_eq!(diff.len(), 2 + 4 + N);
    }

    #[test]
    fn size_mismatch_is_an_error() {
        let mut enc = DeltaEncoder::new(N);
        assert!(enc.encode(&filled(b'x')[..N - 1]).is_err());
    }

    #[test]
    fn out_of_bounds_run_is_rejected() {
        // Hand-built diff writing past the end of a small buffer.
        let mut diff = Vec::new();
        diff.extend_from_slice(&1u16.to_le_bytes());
        diff.extend_from_slice(&60u16.to_le_bytes());
        diff.extend_from_slice(&10u16.to_le_bytes());
        diff.extend_from_slice(&[0u8; 10]);

        let mut screen = filled(0);
        assert!(matches!(
            apply_delta(&mut screen, &diff),
            Err(CastError::DeltaOutOfBounds { .. })
        ));
    }

    #[test]
    fn truncated_diff_is_rejected() {
        let mut enc = DeltaEncoder::new(N);
        let diff = enc.encode(&filled(b'x')).unwrap();
        let mut screen = filled(0);
        assert!(apply_delta(&mut screen, &diff[..diff.len() - 1]).is_err());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let mut enc = DeltaEncoder::new(N);
        let mut diff = enc.encode(&filled(b'x')).unwrap();
        diff.push(0xFF);
        let mut screen = filled(0);
        assert!(apply_delta(&mut screen, &diff).is_err());
    }
}
