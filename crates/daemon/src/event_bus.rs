// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for daemon communication.
//!
//! Events are appended to the ledger journal before the engine sees
//! them, enabling crash recovery via checkpoint + replay. Appends are
//! buffered and group-committed (~10ms durability window) by the flush
//! task.

use parking_lot::Mutex;
use rvt_core::Event;
use rvt_storage::{Journal, JournalEntry, JournalError};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sending half: journal-append plus an engine wake.
#[derive(Clone)]
pub struct EventBus {
    journal: Arc<Mutex<Journal>>,
    wake_tx: mpsc::Sender<()>,
}

/// Receiving half, owned by the engine loop.
pub struct EventReader {
    journal: Arc<Mutex<Journal>>,
    wake_rx: mpsc::Receiver<()>,
}

impl EventBus {
    pub fn new(journal: Journal) -> (Self, EventReader) {
        let journal = Arc::new(Mutex::new(journal));
        let (wake_tx, wake_rx) = mpsc::channel(1);
        (Self { journal: Arc::clone(&journal), wake_tx }, EventReader { journal, wake_rx })
    }

    /// Append an event (durable after the next flush). Returns its seq.
    pub fn send(&self, event: Event) -> Result<u64, JournalError> {
        let seq = self.journal.lock().append(&event)?;
        // Non-blocking wake; a full channel means the engine is already awake
        let _ = self.wake_tx.try_send(());
        Ok(seq)
    }

    /// Flush buffered appends with a single fsync.
    pub fn flush(&self) -> Result<(), JournalError> {
        self.journal.lock().flush()
    }

    pub fn needs_flush(&self) -> bool {
        self.journal.lock().needs_flush()
    }
}

impl EventReader {
    /// Wait for and return the next unprocessed entry. `None` when every
    /// sender is gone.
    pub async fn recv(&mut self) -> Option<JournalEntry> {
        loop {
            if let Some(entry) = self.journal.lock().next_unprocessed() {
                return Some(entry);
            }
            self.wake_rx.recv().await?;
        }
    }

    pub fn mark_processed(&self, seq: u64) {
        self.journal.lock().mark_processed(seq);
    }

    pub fn journal(&self) -> Arc<Mutex<Journal>> {
        Arc::clone(&self.journal)
    }
}
