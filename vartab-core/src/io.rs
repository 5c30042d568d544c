use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::models::VirtualOffset;

/// A seekable, line-oriented view of a (possibly block-compressed) stream.
///
/// The indexing engine never touches compression: it reads whole lines and
/// records the virtual offsets around them. A BGZF-backed implementation can
/// plug in here; decompression worker threads behind it are invisible to the
/// index as long as `read_line`/`tell`/`seek` stay blocking.
pub trait LineStream {
    /// Read the next line into `buf`, stripping the trailing newline.
    /// Returns `false` at end of stream.
    fn read_line(&mut self, buf: &mut String) -> io::Result<bool>;

    /// Virtual offset of the next byte to be read.
    fn tell(&mut self) -> io::Result<VirtualOffset>;

    /// Reposition the stream at an offset previously obtained from `tell`.
    fn seek(&mut self, offset: VirtualOffset) -> io::Result<()>;
}

/// Adapter for uncompressed files.
///
/// Every byte offset acts as its own "block", so byte `b` maps to the
/// virtual offset `b << 16`. Block adjacency and linear-index arithmetic
/// then behave exactly as they do over a real block-compressed stream.
pub struct PlainTextStream<R> {
    inner: R,
    pos: u64,
}

impl PlainTextStream<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        PlainTextStream::new(BufReader::new(file))
    }
}

impl<R: BufRead + Seek> PlainTextStream<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(PlainTextStream { inner, pos })
    }
}

impl<R: BufRead + Seek> LineStream for PlainTextStream<R> {
    fn read_line(&mut self, buf: &mut String) -> io::Result<bool> {
        buf.clear();
        let n = self.inner.read_line(buf)?;
        if n == 0 {
            return Ok(false);
        }
        self.pos += n as u64;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(true)
    }

    fn tell(&mut self) -> io::Result<VirtualOffset> {
        Ok(VirtualOffset::new(self.pos, 0))
    }

    fn seek(&mut self, offset: VirtualOffset) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset.compressed()))?;
        self.pos = offset.compressed();
        Ok(())
    }
}
