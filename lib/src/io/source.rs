use super::Close;
use std::io;

/// Upper bound of the scratch buffer [`ByteSource::skip`] reads into.
pub const MAX_SKIP_BUFFER_SIZE: usize = 2048;

/// A source of bytes read one at a time.
///
/// Only [`read_byte`](Self::read_byte) is required. The other methods have defaults built on it
/// which implementors are encouraged to override with something more efficient. A source that
/// holds nothing to release can rely on the default [`Close`] with an empty `impl Close for .. {}`.
pub trait ByteSource: Close {
    /// Reads the next byte, or returns `None` at the end of the source. Blocks until a byte is
    /// available, the end is reached or an error occurs.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Reads up to `buf.len()` bytes into `buf` and returns how many were read. Returns `0` only
    /// when `buf` is empty or the source is at its end.
    ///
    /// An error reading the first byte is returned. An error reading any later byte ends the read
    /// early and the bytes read so far are returned; the error will likely occur again on the next
    /// read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some((first, rest)) = buf.split_first_mut() else {
            return Ok(0);
        };

        match self.read_byte()? {
            Some(byte) => *first = byte,
            None => return Ok(0),
        }

        let mut count = 1;

        for slot in rest {
            match self.read_byte() {
                Ok(Some(byte)) => *slot = byte,
                Ok(None) => break,
                Err(error) => {
                    tracing::debug!(?error, count, "read ended early");
                    break;
                }
            }

            count += 1;
        }

        Ok(count)
    }

    /// Skips over and discards up to `n` bytes. Returns how many were skipped, which is less than
    /// `n` only when the end of the source was reached first.
    fn skip(&mut self, n: u64) -> io::Result<u64> {
        if n == 0 {
            return Ok(0);
        }

        let size = n.min(MAX_SKIP_BUFFER_SIZE as u64) as usize;
        let mut buffer = vec![0; size];
        let mut remaining = n;

        while remaining > 0 {
            let len = remaining.min(size as u64) as usize;

            match self.read(&mut buffer[..len])? {
                0 => break,
                count => remaining -= count as u64,
            }
        }

        Ok(n - remaining)
    }

    /// Estimated number of bytes that can be read without blocking.
    fn available(&mut self) -> io::Result<usize> {
        Ok(0)
    }

    /// Marks the current position so that a later [`reset`](Self::reset) returns to it. After
    /// more than `read_limit` further bytes are read the mark may be forgotten.
    fn mark(&mut self, read_limit: usize) {
        let _ = read_limit;
    }

    /// Returns to the last marked position.
    fn reset(&mut self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "mark/reset not supported",
        ))
    }

    fn mark_supported(&self) -> bool {
        false
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn skip(&mut self, n: u64) -> io::Result<u64> {
        (**self).skip(n)
    }

    fn available(&mut self) -> io::Result<usize> {
        (**self).available()
    }

    fn mark(&mut self, read_limit: usize) {
        (**self).mark(read_limit)
    }

    fn reset(&mut self) -> io::Result<()> {
        (**self).reset()
    }

    fn mark_supported(&self) -> bool {
        (**self).mark_supported()
    }
}
