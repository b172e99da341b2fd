//! The bounded value source: a handle scoped to a single element's declared
//! value length, so that reading (or not reading) a value can never run
//! past the element's boundary.

use std::io::{self, Read, Seek, SeekFrom};

/// Marker trait for sources that can both be read from and seeked within.
pub trait ReadSeek: Read + Seek {}
impl<T: ?Sized> ReadSeek for T where T: Read + Seek {}

/// A handle over a single element's value, bounded to `size()` bytes
/// regardless of how the caller reads from it.
///
/// Created on entry to a defined-length value and valid only for the
/// duration of the handler call that receives it; a handler that wants to
/// retain bytes read from it must copy them out first.
pub struct BoundedValueSource<'a, R: ?Sized> {
    stream: &'a mut R,
    max_len: u64,
    cur_pos: u64,
}

impl<'a, R: ReadSeek + ?Sized> BoundedValueSource<'a, R> {
    /// Create a value source scoped to `max_len` bytes starting at the
    /// stream's current position.
    pub fn new(stream: &'a mut R, max_len: u64) -> Self {
        BoundedValueSource {
            stream,
            max_len,
            cur_pos: 0,
        }
    }

    /// The total declared size of this value, in bytes.
    pub fn size(&self) -> u64 {
        self.max_len
    }

    /// Bytes not yet consumed from this value.
    pub fn remaining(&self) -> u64 {
        self.max_len - self.cur_pos
    }

    /// Attempt to read exactly `buf.len()` bytes. `cur_pos` is advanced by
    /// however many bytes were actually consumed from the underlying
    /// stream — even on a short read — so that a subsequent `skip` call
    /// still lands on the element boundary rather than double-counting.
    ///
    /// Returns `Ok(true)` if the read was satisfied in full, `Ok(false)` on
    /// a short read (fewer bytes available in this value than requested).
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<bool> {
        let available = self.remaining();
        let want = buf.len() as u64;
        let take = want.min(available) as usize;

        let mut read_so_far = 0usize;
        while read_so_far < take {
            match self.stream.read(&mut buf[read_so_far..take])? {
                0 => break,
                n => read_so_far += n,
            }
        }
        self.cur_pos += read_so_far as u64;
        Ok(read_so_far == buf.len())
    }

    /// Read the whole remaining value into an owned buffer.
    pub fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; self.remaining() as usize];
        if !self.read(&mut buf)? {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short read inside a declared-length value",
            ));
        }
        Ok(buf)
    }

    /// Advance the underlying stream by `min(n, remaining())` bytes.
    pub fn skip(&mut self, n: u64) -> io::Result<u64> {
        let actual = n.min(self.remaining());
        self.stream.seek(SeekFrom::Current(actual as i64))?;
        self.cur_pos += actual;
        Ok(actual)
    }

    /// Skip whatever is left unread, so the stream sits exactly on the next
    /// element header regardless of how much the handler actually consumed.
    pub fn skip_to_end(mut self) -> io::Result<()> {
        self.skip(self.remaining())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_exact_within_bounds() {
        let data = b"0123456789".to_vec();
        let mut cursor = Cursor::new(data);
        let mut src = BoundedValueSource::new(&mut cursor, 6);
        let mut buf = [0u8; 4];
        assert!(src.read(&mut buf).unwrap());
        assert_eq!(&buf, b"0123");
        assert_eq!(src.remaining(), 2);
    }

    #[test]
    fn skip_to_end_lands_exactly_on_boundary() {
        let data = b"0123456789".to_vec();
        let mut cursor = Cursor::new(data);
        {
            let mut src = BoundedValueSource::new(&mut cursor, 6);
            let mut buf = [0u8; 2];
            src.read(&mut buf).unwrap();
            src.skip_to_end().unwrap();
        }
        // stream should now be at offset 6, regardless of having read only 2 bytes
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn skip_to_end_with_nothing_read() {
        let data = b"0123456789".to_vec();
        let mut cursor = Cursor::new(data);
        {
            let src = BoundedValueSource::new(&mut cursor, 6);
            src.skip_to_end().unwrap();
        }
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn short_read_reports_false_and_clamps() {
        let data = b"01".to_vec();
        let mut cursor = Cursor::new(data);
        let mut src = BoundedValueSource::new(&mut cursor, 2);
        let mut buf = [0u8; 5];
        // requested more than the value declares: clamp to size(), report short
        assert!(!src.read(&mut buf).unwrap());
        assert_eq!(&buf[0..2], b"01");
        assert_eq!(src.remaining(), 0);
    }
}
