// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL event journal with group commit.
//!
//! One line per event: `{"seq":N,"event":{...}}`. Events are buffered
//! in memory and flushed with a single fsync either on the flush
//! interval or when the buffer fills. Unprocessed entries are kept in a
//! memory queue, so the engine's read path never touches disk.
//!
//! A corrupt tail (torn write from a crash) is rotated to `.bak` and the
//! journal continues from the last parseable entry.

use rvt_core::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Flush interval for group commit
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Maximum buffered entries before a flush is forced
const FLUSH_THRESHOLD: usize = 64;

/// Errors from journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("journal/checkpoint mismatch: {0}")]
    Inconsistent(String),
}

#[derive(Serialize)]
struct RecordRef<'a> {
    seq: u64,
    event: &'a Event,
}

#[derive(Deserialize)]
struct Record {
    seq: u64,
    event: Event,
}

/// One journal entry with its sequence number.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only event journal.
pub struct Journal {
    file: File,
    path: PathBuf,
    /// Next sequence number is `write_seq + 1`.
    write_seq: u64,
    /// Highest sequence the engine has finished handling.
    processed_seq: u64,
    /// Entries appended (or recovered) but not yet handed to the engine.
    unprocessed: VecDeque<JournalEntry>,
    /// Serialized lines awaiting the next group commit.
    buffer: Vec<Vec<u8>>,
    last_flush: Instant,
}

impl Journal {
    /// Open or create a journal. `processed_seq` comes from the
    /// checkpoint (0 without one); entries after it are queued for the
    /// engine.
    pub fn open(path: &Path, processed_seq: u64) -> Result<Self, JournalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = open_append(path)?;
        let scan = scan_lines(&file)?;

        if scan.corrupt_at.is_some() {
            // Torn tail: rotate the damaged file away and rewrite the
            // parseable prefix.
            let bak = rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak.display(),
                kept = scan.entries.len(),
                "corrupt journal tail, rotating"
            );
            drop(file);
            std::fs::rename(path, &bak)?;
            let mut fresh = File::create(path)?;
            for entry in &scan.entries {
                write_record(&mut fresh, entry.seq, &entry.event)?;
            }
            fresh.sync_all()?;
            drop(fresh);
            file = open_append(path)?;
        }

        let write_seq = scan.entries.last().map_or(0, |e| e.seq);
        if processed_seq > write_seq {
            return Err(JournalError::Inconsistent(format!(
                "checkpoint seq {processed_seq} is ahead of journal seq {write_seq}"
            )));
        }

        let unprocessed =
            scan.entries.into_iter().filter(|e| e.seq > processed_seq).collect::<VecDeque<_>>();

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq,
            processed_seq,
            unprocessed,
            buffer: Vec::new(),
            last_flush: Instant::now(),
        })
    }

    /// Append an event. Durable only after the next [`Self::flush`].
    pub fn append(&mut self, event: &Event) -> Result<u64, JournalError> {
        self.write_seq += 1;
        let seq = self.write_seq;
        self.buffer.push(serde_json::to_vec(&RecordRef { seq, event })?);
        self.unprocessed.push_back(JournalEntry { seq, event: event.clone() });
        Ok(seq)
    }

    /// Whether the group-commit window has closed.
    pub fn needs_flush(&self) -> bool {
        !self.buffer.is_empty()
            && (self.last_flush.elapsed() >= FLUSH_INTERVAL
                || self.buffer.len() >= FLUSH_THRESHOLD)
    }

    /// Write all buffered entries with a single fsync.
    pub fn flush(&mut self) -> Result<(), JournalError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        for mut line in self.buffer.drain(..) {
            line.push(b'\n');
            self.file.write_all(&line)?;
        }
        self.file.sync_all()?;
        self.last_flush = Instant::now();
        Ok(())
    }

    /// Next entry the engine has not handled, if any.
    pub fn next_unprocessed(&mut self) -> Option<JournalEntry> {
        self.unprocessed.pop_front()
    }

    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    /// Current on-disk size plus unflushed bytes (compaction threshold).
    pub fn approx_len(&self) -> u64 {
        let on_disk = self.file.metadata().map(|m| m.len()).unwrap_or(0);
        on_disk + self.buffer.iter().map(|l| l.len() as u64 + 1).sum::<u64>()
    }

    /// Drop entries at or before `seq` (they are covered by a
    /// checkpoint). Rewrites the file atomically.
    pub fn compact_through(&mut self, seq: u64) -> Result<(), JournalError> {
        self.flush()?;

        let kept: Vec<JournalEntry> =
            scan_lines(&self.file)?.entries.into_iter().filter(|e| e.seq > seq).collect();

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            for entry in &kept {
                write_record(&mut file, entry.seq, &entry.event)?;
            }
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        self.file = open_append(&self.path)?;
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File, io::Error> {
    OpenOptions::new().create(true).read(true).append(true).open(path)
}

fn write_record(file: &mut File, seq: u64, event: &Event) -> Result<(), JournalError> {
    let mut line = serde_json::to_vec(&RecordRef { seq, event })?;
    line.push(b'\n');
    file.write_all(&line)?;
    Ok(())
}

struct Scan {
    entries: Vec<JournalEntry>,
    /// Byte offset of the first unparseable line, if one was hit.
    corrupt_at: Option<u64>,
}

/// Read every parseable entry from the start of the file, stopping at
/// the first corrupt line.
fn scan_lines(file: &File) -> Result<Scan, JournalError> {
    let mut reader = BufReader::new(file.try_clone()?);
    reader.seek(SeekFrom::Start(0))?;

    let mut entries = Vec::new();
    let mut offset = 0u64;
    let mut line = String::new();

    loop {
        line.clear();
        let read = match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Ok(Scan { entries, corrupt_at: Some(offset) });
            }
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if !trimmed.is_empty() {
            match serde_json::from_str::<Record>(trimmed) {
                Ok(record) => {
                    entries.push(JournalEntry { seq: record.seq, event: record.event })
                }
                Err(_) => return Ok(Scan { entries, corrupt_at: Some(offset) }),
            }
        }
        offset += read as u64;
    }

    Ok(Scan { entries, corrupt_at: None })
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = std::fs::remove_file(&oldest);
    }
    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = std::fs::rename(&src, bak(n + 1));
        }
    }
    bak(1)
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
