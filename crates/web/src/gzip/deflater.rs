use std::io;

use bytes::{Buf, Bytes, BytesMut};
use flate2::{Compress, Compression, FlushCompress, Status};

/// A raw deflate engine (no zlib or gzip framing) fed with owned input.
///
/// Input handed over with [`Deflater::set_input`] is consumed by successive
/// [`Deflater::deflate`] calls, which write into the spare capacity of the
/// output buffer.
#[derive(Debug)]
pub struct Deflater {
    compress: Compress,
    input: Bytes,
    finishing: bool,
    finished: bool,
}

impl Deflater {
    pub fn new(level: Compression) -> Self {
        Self { compress: Compress::new(level, false), input: Bytes::new(), finishing: false, finished: false }
    }

    /// True when all input given so far has been consumed.
    #[inline]
    pub fn needs_input(&self) -> bool {
        !self.input.has_remaining()
    }

    pub fn set_input(&mut self, input: Bytes) {
        self.input = input;
    }

    /// Requests the end of the stream; repeated calls have no further effect.
    pub fn finish(&mut self) {
        self.finishing = true;
    }

    #[inline]
    pub fn finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub fn total_in(&self) -> u64 {
        self.compress.total_in()
    }

    #[inline]
    pub fn total_out(&self) -> u64 {
        self.compress.total_out()
    }

    /// Compresses pending input into the free space of `out` and returns the
    /// number of bytes produced.
    pub fn deflate(&mut self, out: &mut BytesMut, sync_flush: bool) -> io::Result<usize> {
        let start = out.len();
        let capacity = out.capacity();
        if capacity == start || self.finished {
            return Ok(0);
        }

        let flush = if self.finishing {
            FlushCompress::Finish
        } else if sync_flush {
            FlushCompress::Sync
        } else {
            FlushCompress::None
        };

        out.resize(capacity, 0);
        let before_in = self.compress.total_in();
        let before_out = self.compress.total_out();
        let status = self.compress.compress(&self.input, &mut out[start..], flush);

        let consumed = usize::try_from(self.compress.total_in() - before_in).map_err(io::Error::other)?;
        let produced = usize::try_from(self.compress.total_out() - before_out).map_err(io::Error::other)?;
        self.input.advance(consumed);
        out.truncate(start + produced);

        match status.map_err(io::Error::other)? {
            Status::StreamEnd => self.finished = true,
            Status::Ok | Status::BufError => {}
        }
        Ok(produced)
    }

    /// Prepares the engine for a new stream.
    pub fn reset(&mut self) {
        self.compress.reset();
        self.input = Bytes::new();
        self.finishing = false;
        self.finished = false;
    }
}
