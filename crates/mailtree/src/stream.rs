//! Seekable byte streams.
//!
//! Everything that reads or writes message bytes goes through the [`Stream`]
//! trait. Two implementations ship with the crate: [`MemStream`], an
//! in-memory buffer whose storage is shared copy-on-write, and [`IoStream`],
//! an adapter over any `std::io` handle.
//!
//! Positions are absolute. A stream may carry bounds `[start, end)`; seeking
//! from the start is relative to `start`, and reads never cross `end`.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

const READ_CHUNK: usize = 8192;

/// Positioned byte source and sink.
pub trait Stream: fmt::Debug + Send {
    /// Reads up to `buf.len()` bytes, returning how many were read.
    /// Returns `Ok(0)` at the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes `buf`, returning how many bytes were accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Moves the stream position.
    ///
    /// # Errors
    ///
    /// Returns an error if the target lies outside the stream bounds.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Returns the current absolute position.
    fn tell(&self) -> u64;

    /// Returns the number of bytes between the start bound and the end of
    /// the stream (or its end bound).
    ///
    /// # Errors
    ///
    /// Returns an error if the length cannot be determined.
    fn length(&mut self) -> Result<u64>;

    /// Returns true once the position reached the end.
    fn eos(&mut self) -> bool;

    /// Returns a view of `[start, end)` (absolute positions; `None` means up
    /// to the end of this stream).
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid or cannot be read.
    fn substream(&mut self, start: u64, end: Option<u64>) -> Result<Box<dyn Stream>>;

    /// Flushes buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying flush fails.
    fn flush(&mut self) -> Result<()>;

    /// Flushes and releases the stream. Further I/O fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    fn close(&mut self) -> Result<()>;

    /// Reads everything up to the end of the stream into `out`.
    ///
    /// # Errors
    ///
    /// Propagates read errors.
    fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut total = 0;
        loop {
            let n = self.read(&mut chunk)?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&chunk[..n]);
            total += n;
        }
    }

    /// Writes the whole buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream stops accepting bytes.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(Error::Stream("stream refused further writes".into()));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}

fn resolve_seek(pos: SeekFrom, current: u64, start: u64, end: u64) -> Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => start.checked_add(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => end.checked_add_signed(delta),
    }
    .ok_or_else(|| Error::Stream("seek overflow".into()))?;

    if target < start {
        return Err(Error::Stream(format!(
            "seek to {target} before stream start {start}"
        )));
    }
    Ok(target)
}

#[derive(Clone)]
enum Storage {
    Shared(Bytes),
    Owned(BytesMut),
}

impl Storage {
    fn as_slice(&self) -> &[u8] {
        match self {
            Self::Shared(b) => b,
            Self::Owned(b) => b,
        }
    }

    fn make_owned(&mut self) -> &mut BytesMut {
        if let Self::Shared(shared) = self {
            *self = Self::Owned(BytesMut::from(&shared[..]));
        }
        match self {
            Self::Owned(b) => b,
            Self::Shared(_) => unreachable!("storage converted above"),
        }
    }

    fn share(&mut self) -> Bytes {
        match self {
            Self::Shared(b) => b.clone(),
            Self::Owned(b) => {
                let frozen = std::mem::take(b).freeze();
                *self = Self::Shared(frozen.clone());
                frozen
            }
        }
    }
}

/// In-memory stream.
///
/// Substreams share the parent's storage; a write to either side copies
/// the buffer first, so views handed out earlier never change.
#[derive(Clone)]
pub struct MemStream {
    storage: Storage,
    position: u64,
    start: u64,
    end: Option<u64>,
    closed: bool,
}

impl MemStream {
    /// Creates an empty, growable stream.
    #[must_use]
    pub fn new() -> Self {
        Self::from_storage(Storage::Owned(BytesMut::new()))
    }

    /// Creates a stream holding a copy of `data`.
    #[must_use]
    pub fn with_buffer(data: &[u8]) -> Self {
        Self::from_storage(Storage::Owned(BytesMut::from(data)))
    }

    /// Creates a stream over shared bytes without copying.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::from_storage(Storage::Shared(data.into()))
    }

    const fn from_storage(storage: Storage) -> Self {
        Self {
            storage,
            position: 0,
            start: 0,
            end: None,
            closed: false,
        }
    }

    fn bound_end(&self) -> u64 {
        let len = self.storage.as_slice().len() as u64;
        self.end.map_or(len, |end| end.min(len))
    }

    /// Returns the bytes between the bounds.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        let slice = self.storage.as_slice();
        let start = usize::try_from(self.start).unwrap_or(usize::MAX).min(slice.len());
        let end = usize::try_from(self.bound_end()).unwrap_or(usize::MAX).max(start);
        &slice[start..end]
    }

    /// Returns the bytes between the bounds as a cheap shared handle.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        match &self.storage {
            Storage::Shared(b) => {
                let len = b.len();
                let start = usize::try_from(self.start).unwrap_or(len).min(len);
                let end = usize::try_from(self.bound_end()).unwrap_or(len).max(start);
                b.slice(start..end)
            }
            Storage::Owned(_) => Bytes::copy_from_slice(self.bytes()),
        }
    }

    /// Restricts the stream to `[start, end)` and moves to `start`.
    pub fn set_bounds(&mut self, start: u64, end: Option<u64>) {
        self.start = start;
        self.end = end;
        self.position = start;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Stream("stream is closed".into()))
        } else {
            Ok(())
        }
    }
}

impl Default for MemStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemStream")
            .field("len", &self.storage.as_slice().len())
            .field("position", &self.position)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}

impl Stream for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let end = self.bound_end();
        if self.position >= end {
            return Ok(0);
        }
        let slice = self.storage.as_slice();
        let from = usize::try_from(self.position).map_err(|_| Error::Stream("position overflow".into()))?;
        let available = usize::try_from(end - self.position).unwrap_or(usize::MAX);
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&slice[from..from + n]);
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut n = buf.len();
        if let Some(end) = self.end {
            if self.position >= end {
                return Ok(0);
            }
            n = n.min(usize::try_from(end - self.position).unwrap_or(usize::MAX));
        }
        let at = usize::try_from(self.position).map_err(|_| Error::Stream("position overflow".into()))?;
        let owned = self.storage.make_owned();
        if owned.len() < at {
            owned.resize(at, 0);
        }
        let overlap = (owned.len() - at).min(n);
        owned[at..at + overlap].copy_from_slice(&buf[..overlap]);
        owned.extend_from_slice(&buf[overlap..n]);
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;
        let target = resolve_seek(pos, self.position, self.start, self.bound_end())?;
        if let Some(end) = self.end {
            if target > end {
                return Err(Error::Stream(format!("seek to {target} past bound {end}")));
            }
        }
        self.position = target;
        Ok(target)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.bound_end().saturating_sub(self.start))
    }

    fn eos(&mut self) -> bool {
        self.position >= self.bound_end()
    }

    fn substream(&mut self, start: u64, end: Option<u64>) -> Result<Box<dyn Stream>> {
        self.ensure_open()?;
        let limit = self.bound_end();
        let end = end.map_or(limit, |e| e.min(limit));
        if start < self.start || start > end {
            return Err(Error::Stream(format!("invalid substream range {start}..{end}")));
        }
        let mut sub = Self::from_storage(Storage::Shared(self.storage.share()));
        sub.set_bounds(start, Some(end));
        Ok(Box::new(sub))
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Adapter exposing any `Read + Write + Seek` handle as a [`Stream`].
#[derive(Debug)]
pub struct IoStream<T> {
    inner: T,
    position: u64,
    start: u64,
    end: Option<u64>,
    closed: bool,
}

impl IoStream<File> {
    /// Opens `path` with the given options and wraps the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let file = options.open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened file stream");
        Self::new(file)
    }
}

impl<T: Read + Write + Seek + Send + fmt::Debug> IoStream<T> {
    /// Wraps a handle, starting at its current position.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle's position cannot be queried.
    pub fn new(mut inner: T) -> Result<Self> {
        let position = inner.stream_position()?;
        Ok(Self {
            inner,
            position,
            start: position,
            end: None,
            closed: false,
        })
    }

    /// Restricts the stream to `[start, end)` and moves to `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle cannot seek to `start`.
    pub fn set_bounds(&mut self, start: u64, end: Option<u64>) -> Result<()> {
        self.inner.seek(SeekFrom::Start(start))?;
        self.start = start;
        self.end = end;
        self.position = start;
        Ok(())
    }

    /// Returns the wrapped handle.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Stream("stream is closed".into()))
        } else {
            Ok(())
        }
    }

    fn physical_end(&mut self) -> Result<u64> {
        let here = self.inner.stream_position()?;
        let len = self.inner.seek(SeekFrom::End(0))?;
        self.inner.seek(SeekFrom::Start(here))?;
        Ok(self.end.map_or(len, |end| end.min(len)))
    }
}

impl<T: Read + Write + Seek + Send + fmt::Debug> Stream for IoStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut limit = buf.len();
        if let Some(end) = self.end {
            if self.position >= end {
                return Ok(0);
            }
            limit = limit.min(usize::try_from(end - self.position).unwrap_or(usize::MAX));
        }
        let n = self.inner.read(&mut buf[..limit])?;
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let mut limit = buf.len();
        if let Some(end) = self.end {
            if self.position >= end {
                return Ok(0);
            }
            limit = limit.min(usize::try_from(end - self.position).unwrap_or(usize::MAX));
        }
        let n = self.inner.write(&buf[..limit])?;
        self.position += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.ensure_open()?;
        let end = self.physical_end()?;
        let target = resolve_seek(pos, self.position, self.start, end)?;
        self.inner.seek(SeekFrom::Start(target))?;
        self.position = target;
        Ok(target)
    }

    fn tell(&self) -> u64 {
        self.position
    }

    fn length(&mut self) -> Result<u64> {
        Ok(self.physical_end()?.saturating_sub(self.start))
    }

    fn eos(&mut self) -> bool {
        self.physical_end().map_or(true, |end| self.position >= end)
    }

    /// Handles cannot be shared, so the range is read into a [`MemStream`]
    /// snapshot whose positions start at zero.
    fn substream(&mut self, start: u64, end: Option<u64>) -> Result<Box<dyn Stream>> {
        self.ensure_open()?;
        let limit = self.physical_end()?;
        let end = end.map_or(limit, |e| e.min(limit));
        if start < self.start || start > end {
            return Err(Error::Stream(format!("invalid substream range {start}..{end}")));
        }
        let here = self.position;
        self.inner.seek(SeekFrom::Start(start))?;
        let len = usize::try_from(end - start).map_err(|_| Error::Stream("range too large".into()))?;
        let mut snapshot = vec![0u8; len];
        let read = self.inner.read(&mut snapshot);
        self.inner.seek(SeekFrom::Start(here))?;
        let n = read?;
        snapshot.truncate(n);
        Ok(Box::new(MemStream::from_bytes(snapshot)))
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.inner.flush().map_err(Into::into)
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.inner.flush()?;
            self.closed = true;
        }
        Ok(())
    }
}

impl io::Write for MemStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Stream::write(self, buf).map_err(|e| io::Error::other(e.to_string()))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::similar_names)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_mem_stream_write_then_read() {
        let mut stream = MemStream::new();
        Stream::write_all(&mut stream, b"Hello, World!").unwrap();
        assert_eq!(stream.tell(), 13);
        assert!(stream.eos());

        stream.seek(SeekFrom::Start(7)).unwrap();
        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"World!");
        assert_eq!(stream.length().unwrap(), 13);
    }

    #[test]
    fn test_mem_stream_overwrite_in_place() {
        let mut stream = MemStream::with_buffer(b"abcdef");
        stream.seek(SeekFrom::Start(2)).unwrap();
        Stream::write_all(&mut stream, b"XY").unwrap();
        assert_eq!(stream.bytes(), b"abXYef");
    }

    #[test]
    fn test_substream_is_bounded() {
        let mut stream = MemStream::from_bytes(&b"0123456789"[..]);
        let mut sub = stream.substream(3, Some(7)).unwrap();
        assert_eq!(sub.tell(), 3);
        assert_eq!(sub.length().unwrap(), 4);

        let mut out = Vec::new();
        sub.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"3456");
        assert!(sub.eos());

        sub.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(sub.tell(), 4);
        assert!(sub.seek(SeekFrom::Current(-5)).is_err());
    }

    #[test]
    fn test_substream_survives_parent_write() {
        let mut stream = MemStream::with_buffer(b"shared data");
        let mut sub = stream.substream(0, Some(6)).unwrap();
        stream.seek(SeekFrom::Start(0)).unwrap();
        Stream::write_all(&mut stream, b"SHARED").unwrap();

        let mut out = Vec::new();
        sub.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"shared");
        assert_eq!(stream.bytes(), b"SHARED data");
    }

    #[test]
    fn test_closed_stream_fails() {
        let mut stream = MemStream::with_buffer(b"x");
        stream.close().unwrap();
        let mut buf = [0u8; 1];
        assert!(stream.read(&mut buf).is_err());
    }

    #[test]
    fn test_io_stream_over_cursor() {
        let cursor = Cursor::new(b"From: a@b.c\r\n\r\nbody".to_vec());
        let mut stream = IoStream::new(cursor).unwrap();
        assert_eq!(stream.length().unwrap(), 19);

        let mut sub = stream.substream(15, None).unwrap();
        let mut out = Vec::new();
        sub.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"body");
        assert_eq!(stream.tell(), 0);

        stream.seek(SeekFrom::End(-4)).unwrap();
        let mut buf = [0u8; 8];
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"body");
        assert!(stream.eos());
    }

    #[test]
    fn test_io_stream_bounds() {
        let cursor = Cursor::new(b"0123456789".to_vec());
        let mut stream = IoStream::new(cursor).unwrap();
        stream.set_bounds(2, Some(5)).unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"234");
    }
}
