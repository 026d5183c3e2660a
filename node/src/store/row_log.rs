// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Append-only row log.
//!
//! Backs the in-memory tables when a data directory is configured. Every
//! append is fsync'd before the caller touches memory, and a reopened log is
//! replayed in full.
//!
//! # File Format
//! ```text
//! [Header: 16 bytes][Frame][Frame]...
//! Header: magic u32 | version u32 | reserved u64
//! Frame:  len u32 | crc32 u32 | bincode payload (len bytes)
//! ```
//!
//! A bad checksum or a short frame fails the open; the log is never
//! silently truncated on open. A batch that fails midway is cut back to the
//! last durable length before the error is returned, so a retry never
//! duplicates frames.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;

use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const MAGIC: u32 = 0x4C44_4752; // LDGR
const VERSION: u32 = 1;
const HEADER_LEN: usize = 16;
const FRAME_HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum RowLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid header")]
    InvalidHeader,

    #[error("Log truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("Checksum mismatch at offset {offset}")]
    ChecksumMismatch { offset: usize },

    #[error("Log left in an unknown state by a failed append")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, RowLogError>;

fn header_bytes() -> [u8; HEADER_LEN] {
    let mut bytes = [0u8; HEADER_LEN];
    bytes[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    bytes[4..8].copy_from_slice(&VERSION.to_le_bytes());
    bytes
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(word)
}

fn checksum(payload: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Decodes every frame of a log image, header included.
fn decode_all<R: DeserializeOwned>(buf: &[u8]) -> Result<Vec<R>> {
    if buf.len() < HEADER_LEN {
        return Err(RowLogError::InvalidHeader);
    }
    if read_u32(buf, 0) != MAGIC || read_u32(buf, 4) != VERSION {
        return Err(RowLogError::InvalidHeader);
    }

    let mut rows = Vec::new();
    let mut offset = HEADER_LEN;
    while offset < buf.len() {
        if buf.len() - offset < FRAME_HEADER_LEN {
            return Err(RowLogError::Truncated { offset });
        }
        let len = read_u32(buf, offset) as usize;
        let crc = read_u32(buf, offset + 4);
        let start = offset + FRAME_HEADER_LEN;
        let end = start.checked_add(len).ok_or(RowLogError::Truncated { offset })?;
        if end > buf.len() {
            return Err(RowLogError::Truncated { offset });
        }

        let payload = &buf[start..end];
        if checksum(payload) != crc {
            return Err(RowLogError::ChecksumMismatch { offset });
        }
        let (row, _) = bincode::serde::decode_from_slice::<R, _>(payload, bincode::config::standard())
            .map_err(|e| RowLogError::Serialization(e.to_string()))?;
        rows.push(row);
        offset = end;
    }
    Ok(rows)
}

/// Reads a whole log without opening it for writing.
pub fn read_log<R: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<R>> {
    let buf = std::fs::read(path.as_ref())?;
    decode_all(&buf)
}

pub struct RowLog<R> {
    file: File,
    /// Length of the durable prefix.
    len: u64,
    count: u64,
    poisoned: bool,
    #[cfg(test)]
    fail_next_sync: bool,
    _row: PhantomData<fn(R)>,
}

impl<R: Serialize + DeserializeOwned> RowLog<R> {
    /// Opens or creates a log and returns it with every row already in it.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<R>)> {
        let path = path.as_ref().to_path_buf();

        let rows = if path.exists() {
            read_log(&path)?
        } else {
            let mut file = File::create(&path)?;
            file.write_all(&header_bytes())?;
            file.sync_all()?;
            Vec::new()
        };

        let file = OpenOptions::new().append(true).open(&path)?;
        let len = file.metadata()?.len();

        Ok((
            Self {
                file,
                len,
                count: rows.len() as u64,
                poisoned: false,
                #[cfg(test)]
                fail_next_sync: false,
                _row: PhantomData,
            },
            rows,
        ))
    }

    pub fn append(&mut self, row: &R) -> Result<()> {
        self.append_all(std::slice::from_ref(row))
    }

    /// Writes a batch and fsyncs once. Returns only after the batch is durable.
    /// On failure nothing of the batch remains in the file.
    pub fn append_all(&mut self, rows: &[R]) -> Result<()> {
        if self.poisoned {
            return Err(RowLogError::Poisoned);
        }

        let mut batch = Vec::new();
        for row in rows {
            let payload = bincode::serde::encode_to_vec(row, bincode::config::standard())
                .map_err(|e| RowLogError::Serialization(e.to_string()))?;
            let len = u32::try_from(payload.len())
                .map_err(|_| RowLogError::Serialization(format!("row too large: {} bytes", payload.len())))?;

            batch.extend_from_slice(&len.to_le_bytes());
            batch.extend_from_slice(&checksum(&payload).to_le_bytes());
            batch.extend_from_slice(&payload);
        }
        if batch.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.write_durable(&batch) {
            self.rollback();
            return Err(e.into());
        }

        self.len += batch.len() as u64;
        self.count += rows.len() as u64;
        Ok(())
    }

    fn write_durable(&mut self, batch: &[u8]) -> std::io::Result<()> {
        self.file.write_all(batch)?;
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_sync) {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "sync failed"));
        }
        self.file.sync_all()
    }

    /// Cuts the file back to the durable prefix.
    fn rollback(&mut self) {
        let cut = self.file.set_len(self.len).and_then(|_| self.file.sync_all());
        if let Err(e) = cut {
            tracing::error!("Could not roll back row log to {} bytes: {}", self.len, e);
            self.poisoned = true;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Makes the next append fail after its bytes reach the file.
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }
}
