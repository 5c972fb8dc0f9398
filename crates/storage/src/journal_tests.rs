// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rvt_core::{ChangeId, Event};
use std::io::Write as _;
use tempfile::tempdir;

fn purge_event(id: &str) -> Event {
    Event::ChangePurged { change_id: ChangeId::from_string(id) }
}

#[test]
fn open_creates_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.log");

    let journal = Journal::open(&path, 0).unwrap();

    assert!(path.exists());
    assert_eq!(journal.write_seq(), 0);
    assert_eq!(journal.processed_seq(), 0);
}

#[test]
fn append_assigns_sequences_and_flush_persists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.log");
    let mut journal = Journal::open(&path, 0).unwrap();

    assert_eq!(journal.append(&purge_event("ssh_1")).unwrap(), 1);
    assert_eq!(journal.append(&purge_event("ssh_2")).unwrap(), 2);
    journal.flush().unwrap();

    assert!(std::fs::metadata(&path).unwrap().len() > 0);
}

#[test]
fn unprocessed_entries_drain_in_order() {
    let dir = tempdir().unwrap();
    let mut journal = Journal::open(&dir.path().join("l.log"), 0).unwrap();

    journal.append(&purge_event("ssh_1")).unwrap();
    journal.append(&purge_event("ssh_2")).unwrap();

    assert_eq!(journal.next_unprocessed().unwrap().seq, 1);
    assert_eq!(journal.next_unprocessed().unwrap().seq, 2);
    assert!(journal.next_unprocessed().is_none());
}

#[test]
fn reopen_resumes_after_processed_seq() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.log");
    {
        let mut journal = Journal::open(&path, 0).unwrap();
        for i in 1..=3 {
            journal.append(&purge_event(&format!("ssh_{i}"))).unwrap();
        }
        journal.flush().unwrap();
    }

    let mut journal = Journal::open(&path, 2).unwrap();
    assert_eq!(journal.write_seq(), 3);
    let entry = journal.next_unprocessed().unwrap();
    assert_eq!(entry.seq, 3);
    assert!(journal.next_unprocessed().is_none());
}

#[test]
fn checkpoint_ahead_of_journal_is_inconsistent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.log");
    {
        let mut journal = Journal::open(&path, 0).unwrap();
        journal.append(&purge_event("ssh_1")).unwrap();
        journal.flush().unwrap();
    }

    assert!(matches!(Journal::open(&path, 5), Err(JournalError::Inconsistent(_))));
}

#[test]
fn corrupt_tail_is_rotated_and_prefix_kept() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.log");
    {
        let mut journal = Journal::open(&path, 0).unwrap();
        journal.append(&purge_event("ssh_1")).unwrap();
        journal.flush().unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":2,\"event\":{\"type\":\"chan").unwrap();
    }

    let mut journal = Journal::open(&path, 0).unwrap();

    assert_eq!(journal.write_seq(), 1);
    assert_eq!(journal.next_unprocessed().unwrap().seq, 1);
    assert!(path.with_extension("bak").exists());
}

#[test]
fn compact_drops_checkpointed_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.log");
    let mut journal = Journal::open(&path, 0).unwrap();
    for i in 1..=4 {
        journal.append(&purge_event(&format!("ssh_{i}"))).unwrap();
    }
    journal.flush().unwrap();

    journal.compact_through(3).unwrap();

    let reopened = Journal::open(&path, 3).unwrap();
    assert_eq!(reopened.write_seq(), 4);

    let mut fresh = Journal::open(&path, 0).unwrap();
    let first = fresh.next_unprocessed().unwrap();
    assert_eq!(first.seq, 4);
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("l.log");
    std::fs::write(&path, "x").unwrap();

    for _ in 0..4 {
        let bak = rotate_bak_path(&path);
        std::fs::write(bak, "old").unwrap();
    }

    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.2").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());
}
