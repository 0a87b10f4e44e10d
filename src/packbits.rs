//! PackBits style run-length codec for raster lines.
//!
//! A control byte `n` in `0..=127` is followed by `n + 1` literal bytes; a
//! control byte in `-1..=-127` (two's complement) is followed by one byte
//! repeated `1 - n` times; `-128` is a no-op and carries no data. Runs
//! never exceed [`MAX_RUN`] bytes per control
//! byte; longer input runs are split. Decompression exists for verification
//! and stream analysis, not for the send path.

use crate::error::CodecError;

/// Longest run a single control byte can describe.
pub const MAX_RUN: usize = 128;

/// Compress a raster line.
///
/// Worst case output (no run of two anywhere) is one extra control byte
/// per started group of [`MAX_RUN`] input bytes.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_RUN + 1);
    let mut i = 0;

    while i < data.len() {
        let mut run = 1;
        while i + run < data.len() && run < MAX_RUN && data[i + run] == data[i] {
            run += 1;
        }

        if run >= 2 {
            out.push((257 - run) as u8);
            out.push(data[i]);
            i += run;
        } else {
            let start = i;
            let mut literal = 1;
            i += 1;
            while i < data.len() && literal < MAX_RUN {
                if i + 1 < data.len() && data[i] == data[i + 1] {
                    break;
                }
                literal += 1;
                i += 1;
            }
            out.push((literal - 1) as u8);
            out.extend_from_slice(&data[start..start + literal]);
        }
    }

    out
}

/// Decompress a raster line, verifying the expected raw length.
pub fn decompress(data: &[u8], expected_len: usize) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 0;

    while i < data.len() {
        let control = data[i] as i8;
        i += 1;
        if control == -128 {
            // No-op in the classic codec; never emitted by `compress`.
            continue;
        }
        if control >= 0 {
            let n = control as usize + 1;
            if i + n > data.len() {
                return Err(CodecError::Truncated);
            }
            out.extend_from_slice(&data[i..i + n]);
            i += n;
        } else {
            let n = 1 - control as isize;
            if i >= data.len() {
                return Err(CodecError::Truncated);
            }
            out.extend(std::iter::repeat(data[i]).take(n as usize));
            i += 1;
        }
    }

    if out.len() != expected_len {
        return Err(CodecError::LengthMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}
