//! Frame resynchronization
//!
//! Turns an unframed byte stream into a sequence of frames. The reader
//! scans forward to each `AA` byte and accepts the 74 bytes ending there if
//! they start with `FF FE`; otherwise the `AA` was payload and scanning goes
//! on. Leading garbage and torn first reads are absorbed without error.

use std::io::{self, BufRead, BufReader, Read};

use super::{ChargerError, Frame, FRAME_HEADER, FRAME_LEN, FRAME_TERMINATOR};

/// Lazy, unbounded sequence of frames read from a byte source.
///
/// Yields `Err` once when the source fails or reaches end of stream and
/// `None` after that. A partial frame at the tail is never emitted.
pub struct FrameReader<R: Read> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a byte source
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
            buf: Vec::with_capacity(FRAME_LEN * 2),
            finished: false,
        }
    }

    /// Bytes held while waiting for the next terminator
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Consume the reader, returning the underlying source
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    fn read_frame(&mut self) -> Result<Frame, ChargerError> {
        loop {
            let n = match self.reader.read_until(FRAME_TERMINATOR, &mut self.buf) {
                Ok(n) => n,
                // Serial ports report an idle line as a timeout; keep waiting
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                return Err(ChargerError::DeviceRead(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "byte source closed",
                )));
            }
            if self.buf.last() != Some(&FRAME_TERMINATOR) {
                // Tail without a terminator; the next read reports EOF
                continue;
            }

            let len = self.buf.len();
            if len >= FRAME_LEN && self.buf[len - FRAME_LEN..len - FRAME_LEN + 2] == FRAME_HEADER {
                let frame = Frame::from_bytes(&self.buf[len - FRAME_LEN..]);
                if len > FRAME_LEN {
                    tracing::trace!("resync: discarded {} leading bytes", len - FRAME_LEN);
                }
                self.buf.clear();
                return frame;
            }

            // Only the last FRAME_LEN - 1 bytes can start a frame ending at a later AA
            if len >= FRAME_LEN {
                self.buf.drain(..len - (FRAME_LEN - 1));
            }
        }
    }
}

impl<R: Read> Iterator for FrameReader<R> {
    type Item = Result<Frame, ChargerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.read_frame();
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}

impl<R: Read> std::iter::FusedIterator for FrameReader<R> {}
