use super::{ByteSource, Close};
use std::io;

/// In-memory [`ByteSource`] over an owned buffer. Supports mark and reset.
#[derive(Debug)]
pub struct SliceSource {
    data: Vec<u8>,
    pos: usize,
    mark: usize,
    closed: bool,
}

impl SliceSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            mark: 0,
            closed: false,
        }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> io::Result<&[u8]> {
        if self.closed {
            Err(io::Error::new(io::ErrorKind::Other, "source closed"))
        } else {
            Ok(&self.data[self.pos..])
        }
    }
}

impl Close for SliceSource {
    fn close(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl ByteSource for SliceSource {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.remaining()?.first().copied();

        if byte.is_some() {
            self.pos += 1;
        }

        Ok(byte)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining()?;
        let len = remaining.len().min(buf.len());

        buf[..len].copy_from_slice(&remaining[..len]);
        self.pos += len;

        Ok(len)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        let len = (self.remaining()?.len() as u64).min(n);
        self.pos += len as usize;

        Ok(len)
    }

    fn available(&mut self) -> io::Result<usize> {
        Ok(self.remaining()?.len())
    }

    /// The read limit is ignored, the mark is kept until the next call to `mark`.
    fn mark(&mut self, _read_limit: usize) {
        self.mark = self.pos;
    }

    fn reset(&mut self) -> io::Result<()> {
        self.remaining()?;
        self.pos = self.mark;
        Ok(())
    }

    fn mark_supported(&self) -> bool {
        true
    }
}
