//! Sinks the archive builder writes into.

use crate::archive::error::ArchiveResult;
use bytes::Bytes;
use std::io::{self, BufWriter, Write};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;

pub(crate) trait ArchiveSink: Write {
    /// Bytes already delivered when the consumer went away, if it did
    fn disconnected(&self) -> Option<u64> {
        None
    }
}

impl ArchiveSink for BufWriter<NamedTempFile> {}

/// Cuts the compressed byte stream into fixed-size chunks and hands each
/// one to the consumer as soon as it is full.
///
/// Must only be used from a blocking thread: every full chunk is sent with
/// `blocking_send`, which parks until the channel has room.
pub(crate) struct ChunkWriter {
    tx: mpsc::Sender<ArchiveResult<Bytes>>,
    buffer: Vec<u8>,
    chunk_size: usize,
    bytes_sent: u64,
    chunks_sent: u64,
    disconnected: bool,
}

impl ChunkWriter {
    pub(crate) fn new(tx: mpsc::Sender<ArchiveResult<Bytes>>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tx,
            buffer: Vec::with_capacity(chunk_size),
            chunk_size,
            bytes_sent: 0,
            chunks_sent: 0,
            disconnected: false,
        }
    }

    pub(crate) fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub(crate) fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    fn send_chunk(&mut self) -> io::Result<()> {
        let data = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.chunk_size));
        let len = data.len() as u64;

        if self.tx.blocking_send(Ok(Bytes::from(data))).is_err() {
            self.disconnected = true;
            return Err(consumer_gone());
        }

        self.bytes_sent += len;
        self.chunks_sent += 1;
        Ok(())
    }

    /// Send the trailing partial chunk, if any
    pub(crate) fn finish(&mut self) -> io::Result<()> {
        if !self.buffer.is_empty() {
            self.send_chunk()?;
        }
        Ok(())
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.disconnected {
            return Err(consumer_gone());
        }

        let take = (self.chunk_size - self.buffer.len()).min(data.len());
        self.buffer.extend_from_slice(&data[..take]);

        if self.buffer.len() == self.chunk_size {
            self.send_chunk()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial chunks are only released by `finish`
        Ok(())
    }
}

impl ArchiveSink for ChunkWriter {
    fn disconnected(&self) -> Option<u64> {
        self.disconnected.then_some(self.bytes_sent)
    }
}

fn consumer_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer disconnected")
}
