//! Output capability shared by both engines.

use std::io;

/// Anything that accepts raw bytes, single bytes and strings.
///
/// Every [`io::Write`] is a sink, so files, sockets and `Vec<u8>` work as-is.
pub trait OutputSink {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_bytes(&[byte])
    }

    fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }
}

impl<W: io::Write + ?Sized> OutputSink for W {
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }
}
