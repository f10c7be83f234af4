//! Looping chunk reader over the audio source
//!
//! The cursor owns the file handle for the lifetime of the broadcast and is
//! mutated only by the scheduler tick, so the position needs no lock.

use std::io::SeekFrom;
use std::path::Path;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{Error, Result};

/// Sequential reader over a fixed audio source with wraparound at EOF.
#[derive(Debug)]
pub struct AudioCursor {
    file: File,
    position: u64,
    len: u64,
}

impl AudioCursor {
    /// Open the audio source.
    ///
    /// The file is opened exactly once; the handle is released when the
    /// cursor is dropped at shutdown.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|source| Error::AudioOpen {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file
            .metadata()
            .await
            .map_err(|source| Error::AudioOpen {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        Ok(Self {
            file,
            position: 0,
            len,
        })
    }

    /// Read the next chunk of up to `chunk_size` bytes.
    ///
    /// At end-of-file this resets the position to 0 and returns an empty
    /// chunk for the current tick instead of immediately re-reading from
    /// the start; the caller treats the empty chunk as "wraparound, skip
    /// this tick". A short chunk at the tail of the file is returned as-is.
    /// I/O errors leave the position unchanged so the next call retries
    /// from the same offset.
    pub async fn next_chunk(&mut self, chunk_size: usize) -> Result<Bytes> {
        self.file
            .seek(SeekFrom::Start(self.position))
            .await
            .map_err(Error::AudioRead)?;

        let mut buf = vec![0u8; chunk_size];
        let mut filled = 0;
        while filled < chunk_size {
            let n = self
                .file
                .read(&mut buf[filled..])
                .await
                .map_err(Error::AudioRead)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.position = 0;
            return Ok(Bytes::new());
        }

        self.position += filled as u64;
        buf.truncate(filled);
        Ok(Bytes::from(buf))
    }

    /// Current read offset into the source.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
