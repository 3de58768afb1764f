//! Synthetic deal payloads
//!
//! A [`Payload`] is a promise of `len` bytes drawn from a cryptographically
//! strong RNG. Bytes are produced while writing, one chunk at a time, so piece
//! sizes in the hundreds of MiB never sit in memory at once. A payload is
//! consumed by writing it and cannot be replayed.

use rand::RngCore;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Size of each generated chunk
pub const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug)]
pub struct Payload {
    len: u64,
}

impl Payload {
    /// A fresh random payload of exactly `len` bytes
    pub fn random(len: u64) -> Self {
        Self { len }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stream the payload into `writer`, returning the number of bytes written
    pub async fn write_to<W>(self, writer: &mut W) -> std::io::Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; chunk_len(self.len)];
        let mut remaining = self.len;

        while remaining > 0 {
            let n = chunk_len(remaining);
            fill_random(&mut buf[..n]);
            writer.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }

        writer.flush().await?;
        Ok(self.len)
    }

    /// Materialize the whole payload in memory
    ///
    /// Intended for small pieces (tests, test-proofs networks). Fails when
    /// the length does not fit in the address space.
    pub fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        let len = usize::try_from(self.len).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                format!("payload of {} bytes does not fit in memory", self.len),
            )
        })?;
        let mut bytes = vec![0u8; len];
        fill_random(&mut bytes);
        Ok(bytes)
    }
}

/// Bytes to generate next, capped at one chunk
fn chunk_len(remaining: u64) -> usize {
    usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE))
}

// `ThreadRng` is a reseeding CSPRNG; it is not `Send`, so it never lives across an await.
fn fill_random(buf: &mut [u8]) {
    rand::rng().fill_bytes(buf);
}
