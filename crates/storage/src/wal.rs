// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only record store indexed by a 64-bit sequence number, persisted
//! as a single segment file per generation.
//!
//! The segment file is named after its base index (the index of its first
//! entry) as a 20-digit zero-padded decimal, e.g. `00000000000000000006`.
//! `truncate_front` produces a new generation: the surviving entries are
//! rewritten to a temp file, fsynced, and renamed over the old segment name
//! so a crash mid-truncate never leaves a half-written segment live.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const BASE_WIDTH: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("wal segment is corrupt: {0}")]
    Corrupt(String),
    #[error("wal is closed")]
    Closed,
    #[error("index {index} out of range [{first}, {last}]")]
    OutOfRange { index: u64, first: u64, last: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Wal {
    dir: PathBuf,
    base: u64,
    entries: Vec<Vec<u8>>,
    file: Option<File>,
    closed: bool,
}

impl Wal {
    /// Opens `path`, creating the directory if missing and recovering any
    /// prior segment file. A directory with more than one segment file, or
    /// a segment file that doesn't parse as a sequence of length-prefixed
    /// records, is rejected as [`WalError::Corrupt`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        let dir = path.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut segments = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.len() == BASE_WIDTH && name.bytes().all(|b| b.is_ascii_digit()) {
                let base: u64 = name
                    .parse()
                    .map_err(|_| WalError::Corrupt(format!("bad segment name {name}")))?;
                segments.push((base, entry.path()));
            } else if name.ends_with(".tmp") {
                let _ = fs::remove_file(entry.path());
            }
        }

        if segments.is_empty() {
            return Ok(Self {
                dir,
                base: 0,
                entries: Vec::new(),
                file: None,
                closed: false,
            });
        }
        if segments.len() > 1 {
            return Err(WalError::Corrupt(format!(
                "expected exactly one segment file, found {}",
                segments.len()
            )));
        }

        let (base, segment_path) = segments.remove(0);
        let mut buf = Vec::new();
        File::open(&segment_path)?.read_to_end(&mut buf)?;
        let entries = decode_segment(&buf)?;
        if entries.is_empty() {
            return Err(WalError::Corrupt(
                "segment file has no records".to_string(),
            ));
        }

        let file = OpenOptions::new().append(true).open(&segment_path)?;
        Ok(Self {
            dir,
            base,
            entries,
            file: Some(file),
            closed: false,
        })
    }

    pub fn first_index(&self) -> u64 {
        if self.entries.is_empty() {
            0
        } else {
            self.base
        }
    }

    pub fn last_index(&self) -> u64 {
        if self.entries.is_empty() {
            0
        } else {
            self.base + self.entries.len() as u64 - 1
        }
    }

    /// Durably appends `bytes` at `index`, which must equal
    /// `last_index() + 1`.
    pub fn write(&mut self, index: u64, bytes: &[u8]) -> Result<(), WalError> {
        self.ensure_open()?;
        let expected = self.last_index() + 1;
        if index != expected {
            return Err(WalError::OutOfRange {
                index,
                first: self.first_index(),
                last: self.last_index(),
            });
        }

        if self.file.is_none() {
            self.base = index;
            let path = self.segment_path(self.base);
            self.file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)?,
            );
        }

        let file = match &mut self.file {
            Some(file) => file,
            None => return Err(WalError::Corrupt("segment file missing after open".into())),
        };
        write_record(file, bytes)?;
        file.sync_all()?;
        self.entries.push(bytes.to_vec());
        Ok(())
    }

    pub fn read(&self, index: u64) -> Result<Vec<u8>, WalError> {
        self.ensure_open()?;
        let (first, last) = (self.first_index(), self.last_index());
        if self.entries.is_empty() || index < first || index > last {
            return Err(WalError::OutOfRange { index, first, last });
        }
        Ok(self.entries[(index - self.base) as usize].clone())
    }

    /// Removes every entry with index `< index`. The entry at `index` is
    /// retained as the new first entry; `truncate_front(last_index()+1)`
    /// synthesizes a single empty trailing entry so the log always keeps an
    /// anchor for the next index.
    pub fn truncate_front(&mut self, index: u64) -> Result<(), WalError> {
        self.ensure_open()?;
        let (first, last) = (self.first_index(), self.last_index());
        if index < first || index > last + 1 {
            return Err(WalError::OutOfRange {
                index,
                first,
                last,
            });
        }
        if index == first {
            return Ok(());
        }

        let mut new_entries: Vec<Vec<u8>> = if index <= last {
            self.entries[(index - self.base) as usize..].to_vec()
        } else {
            Vec::new()
        };
        if new_entries.is_empty() {
            new_entries.push(Vec::new());
        }

        let old_path = if self.entries.is_empty() {
            None
        } else {
            Some(self.segment_path(self.base))
        };
        let new_base = index;
        let new_path = self.segment_path(new_base);
        let tmp_path = self.dir.join(format!("{new_base:0width$}.tmp", width = BASE_WIDTH));

        {
            let mut tmp = File::create(&tmp_path)?;
            for entry in &new_entries {
                write_record(&mut tmp, entry)?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &new_path)?;
        sync_dir(&self.dir)?;

        if let Some(old_path) = old_path {
            if old_path != new_path {
                if let Err(e) = fs::remove_file(&old_path) {
                    tracing::warn!(path = %old_path.display(), error = %e, "failed to remove truncated wal segment");
                }
            }
        }

        self.file = Some(OpenOptions::new().append(true).open(&new_path)?);
        self.base = new_base;
        self.entries = new_entries;
        Ok(())
    }

    /// Idempotent: closing twice, or any operation after closing, is
    /// reported as [`WalError::Closed`] rather than panicking.
    pub fn close(&mut self) {
        self.closed = true;
        self.file = None;
    }

    fn ensure_open(&self) -> Result<(), WalError> {
        if self.closed {
            Err(WalError::Closed)
        } else {
            Ok(())
        }
    }

    fn segment_path(&self, base: u64) -> PathBuf {
        self.dir.join(format!("{base:0width$}", width = BASE_WIDTH))
    }
}

fn write_record(file: &mut File, payload: &[u8]) -> std::io::Result<()> {
    file.write_all(&(payload.len() as u32).to_le_bytes())?;
    file.write_all(payload)?;
    Ok(())
}

fn decode_segment(buf: &[u8]) -> Result<Vec<Vec<u8>>, WalError> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < buf.len() {
        if pos + 4 > buf.len() {
            return Err(WalError::Corrupt("truncated record length".to_string()));
        }
        let len_bytes: [u8; 4] = match buf[pos..pos + 4].try_into() {
            Ok(b) => b,
            Err(_) => return Err(WalError::Corrupt("truncated record length".to_string())),
        };
        let len = u32::from_le_bytes(len_bytes) as usize;
        pos += 4;
        if pos + len > buf.len() {
            return Err(WalError::Corrupt("truncated record payload".to_string()));
        }
        entries.push(buf[pos..pos + len].to_vec());
        pos += len;
    }
    Ok(entries)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
