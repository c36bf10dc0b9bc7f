use alloc::borrow::Cow;
use alloc::string::String;

use embedded_io_async::Read;
use heapless::Vec;

use crate::error::Error;
use crate::fmt::LossyStr;

/// Longest line kept as one record. Longer modem output is split.
pub const MAX_LINE_LEN: usize = 256;

/// One line of modem output, raw bytes including the line terminator.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Line(Vec<u8, MAX_LINE_LEN>);

impl Line {
    /// Build a line from raw bytes, truncating at [`MAX_LINE_LEN`].
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let len = bytes.len().min(MAX_LINE_LEN);
        let mut buf = Vec::new();
        // Cannot fail, `len` is bounded by the capacity
        buf.extend_from_slice(&bytes[..len]).ok();
        Self(buf)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Decoded text, invalid UTF-8 replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for Line {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl core::fmt::Debug for Line {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        LossyStr(&self.0).fmt(f)
    }
}

/// Splits a byte stream into [`Line`]s.
///
/// Bytes read past the end of a line are kept for the next call, so dropping a
/// pending `read_line` future loses nothing.
pub struct LineReader<R> {
    rx: R,
    buf: Vec<u8, MAX_LINE_LEN>,
}

impl<R: Read> LineReader<R> {
    pub fn new(rx: R) -> Self {
        Self {
            rx,
            buf: Vec::new(),
        }
    }

    pub fn into_inner(self) -> R {
        self.rx
    }

    pub async fn read_line(&mut self) -> Result<Line, Error> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&c| c == b'\n') {
                let line = Line::from_bytes(&self.buf[..=pos]);
                self.consume(pos + 1);
                return Ok(line);
            }

            if self.buf.is_full() {
                let line = Line::from_bytes(&self.buf);
                self.buf.clear();
                return Ok(line);
            }

            let mut chunk = [0; 32];
            let room = (self.buf.capacity() - self.buf.len()).min(chunk.len());
            let n = self
                .rx
                .read(&mut chunk[..room])
                .await
                .map_err(|_| Error::Read)?;
            if n == 0 {
                return Err(Error::Read);
            }
            self.buf.extend_from_slice(&chunk[..n]).ok();
        }
    }

    fn consume(&mut self, amt: usize) {
        let len = self.buf.len();
        self.buf.copy_within(amt..len, 0);
        self.buf.truncate(len - amt);
    }
}
