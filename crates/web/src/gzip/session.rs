use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::Crc;

use crate::gzip::pool::{ByteBufferPool, DeflaterEntry};

/// Fixed gzip member header: magic, deflate, no flags, no mtime, unknown OS.
pub const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0];

const TRAILER_LEN: usize = 8;

/// Per-response compression resources.
#[derive(Debug)]
pub struct CompressionSession {
    crc: Crc,
    deflater: Option<DeflaterEntry>,
    buffer: Option<BytesMut>,
    buffer_size: usize,
    sync_flush: bool,
}

impl CompressionSession {
    pub fn new(buffer_size: usize, sync_flush: bool) -> Self {
        Self { crc: Crc::new(), deflater: None, buffer: None, buffer_size, sync_flush }
    }

    /// Starts a gzip stream using `deflater`.
    pub fn start(&mut self, deflater: DeflaterEntry) {
        self.crc.reset();
        self.deflater = Some(deflater);
    }

    pub fn is_active(&self) -> bool {
        self.deflater.is_some()
    }

    pub fn crc(&self) -> &Crc {
        &self.crc
    }

    /// The bytes produced by the last step.
    pub fn output(&self) -> &[u8] {
        self.buffer.as_deref().unwrap_or_default()
    }

    pub fn release_buffer(&mut self, buffers: &ByteBufferPool) {
        if let Some(buffer) = self.buffer.take() {
            buffers.release(buffer);
        }
    }

    pub fn release(&mut self, buffers: &ByteBufferPool) {
        if let Some(deflater) = self.deflater.take() {
            deflater.release();
        }
        self.release_buffer(buffers);
    }
}

/// What the driver does after a [`GzipWrite::process`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Forward [`CompressionSession::output`]; `last` ends the response.
    Flush { last: bool },
    /// Nothing to forward, step again.
    Idle,
    /// The write is fully consumed.
    Succeeded,
}

/// One `write` call worth of content being compressed.
#[derive(Debug)]
pub struct GzipWrite {
    content: Option<Bytes>,
    last: bool,
}

impl GzipWrite {
    pub fn new(last: bool, content: Option<Bytes>) -> Self {
        Self { content: content.filter(Buf::has_remaining), last }
    }

    /// Advances compression by at most one output buffer.
    pub fn process(&mut self, session: &mut CompressionSession, buffers: &ByteBufferPool) -> io::Result<Action> {
        let CompressionSession { crc, deflater, buffer, buffer_size, sync_flush } = session;

        let Some(entry) = deflater.as_mut() else {
            if let Some(buffer) = buffer.take() {
                buffers.release(buffer);
            }
            return Ok(Action::Succeeded);
        };

        let fresh = buffer.is_none();
        let buffer = buffer.get_or_insert_with(|| buffers.acquire(*buffer_size));
        if fresh {
            buffer.put_slice(&GZIP_HEADER);
        } else {
            buffer.clear();
        }

        let engine = entry.deflater();
        if !engine.finished() {
            if engine.needs_input() {
                match self.content.take() {
                    Some(content) => {
                        crc.update(&content);
                        engine.set_input(content);
                    }
                    None if self.last => engine.finish(),
                    None if buffer.is_empty() => return Ok(Action::Succeeded),
                    None => return Ok(Action::Flush { last: false }),
                }
            }
            engine.deflate(buffer, *sync_flush)?;
        }

        if engine.finished() && buffer.capacity() - buffer.len() >= TRAILER_LEN {
            buffer.put_u32_le(crc.sum());
            buffer.put_u32_le(crc.amount());
            if let Some(entry) = deflater.take() {
                entry.release();
            }
            return Ok(Action::Flush { last: true });
        }

        if buffer.is_empty() { Ok(Action::Idle) } else { Ok(Action::Flush { last: false }) }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::Compression;
    use flate2::read::GzDecoder;

    use super::*;
    use crate::gzip::pool::DeflaterPool;

    fn run(session: &mut CompressionSession, buffers: &ByteBufferPool, write: &mut GzipWrite) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            match write.process(session, buffers).unwrap() {
                Action::Flush { last } => {
                    out.extend_from_slice(session.output());
                    if last {
                        return out;
                    }
                }
                Action::Idle => {}
                Action::Succeeded => return out,
            }
        }
    }

    #[test]
    fn produces_a_complete_member() {
        let pool = DeflaterPool::new(1, Compression::default());
        let buffers = ByteBufferPool::default();
        let mut session = CompressionSession::new(64, false);
        session.start(pool.acquire().unwrap());

        let mut stream = run(&mut session, &buffers, &mut GzipWrite::new(false, Some(Bytes::from("hello, "))));
        stream.extend(run(&mut session, &buffers, &mut GzipWrite::new(true, Some(Bytes::from("gzip world")))));

        assert!(!session.is_active());
        assert_eq!(pool.checked_out(), 0);
        assert_eq!(&stream[..10], &GZIP_HEADER);

        let crc = u32::from_le_bytes(stream[stream.len() - 8..stream.len() - 4].try_into().unwrap());
        let size = u32::from_le_bytes(stream[stream.len() - 4..].try_into().unwrap());
        assert_eq!(size, 17);
        let mut expected = Crc::new();
        expected.update(b"hello, gzip world");
        assert_eq!(crc, expected.sum());

        let mut decoded = String::new();
        GzDecoder::new(&stream[..]).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, "hello, gzip world");
    }

    #[test]
    fn header_goes_out_with_the_first_buffer() {
        let pool = DeflaterPool::new(1, Compression::default());
        let buffers = ByteBufferPool::default();
        let mut session = CompressionSession::new(64, false);
        session.start(pool.acquire().unwrap());

        let out = run(&mut session, &buffers, &mut GzipWrite::new(false, Some(Bytes::from("abc"))));
        assert!(out.starts_with(&GZIP_HEADER));
        assert!(session.is_active());
    }

    #[test]
    fn without_deflater_nothing_is_produced() {
        let buffers = ByteBufferPool::default();
        let mut session = CompressionSession::new(64, false);
        let mut write = GzipWrite::new(true, Some(Bytes::from("ignored")));
        assert_eq!(write.process(&mut session, &buffers).unwrap(), Action::Succeeded);
    }
}
