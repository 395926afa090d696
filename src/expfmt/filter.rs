//! Byte-stream filter that deletes carriage returns before parsing.
//!
//! Producer files written on Windows arrive CRLF-terminated; stripping every
//! `\r` before the parser sees the bytes makes both line endings parse
//! identically.

use std::io::{self, Read};

/// A [`Read`] decorator that removes every `\r` byte from the inner stream.
///
/// Correct for arbitrary chunk sizes: a chunk that happens to contain only
/// carriage returns re-reads the inner stream instead of returning `Ok(0)`,
/// which would be mistaken for end-of-stream.
pub struct CarriageReturnFilter<R> {
    inner: R,
}

impl<R: Read> CarriageReturnFilter<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> Read for CarriageReturnFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..n {
                if buf[i] != b'\r' {
                    buf[kept] = buf[i];
                    kept += 1;
                }
            }
            if kept > 0 {
                return Ok(kept);
            }
            // The whole chunk was carriage returns; try the inner reader again.
        }
    }
}
