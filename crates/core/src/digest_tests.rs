// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn digest_is_stable_for_identical_bytes() {
    assert_eq!(digest_bytes(b"PermitRootLogin no\n"), digest_bytes(b"PermitRootLogin no\n"));
}

#[test]
fn digest_differs_for_different_bytes() {
    assert_ne!(digest_bytes(b"a"), digest_bytes(b"b"));
}

#[test]
fn known_vector() {
    // sha256 of the empty string
    assert_eq!(
        digest_bytes(b"").as_str(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn short_truncates_to_twelve() {
    let d = digest_bytes(b"x");
    assert_eq!(d.short().len(), 12);
    assert!(d.as_str().starts_with(d.short()));
}

#[test]
fn serde_round_trip_is_transparent() {
    let d = digest_bytes(b"payload");
    let json = serde_json::to_string(&d).unwrap();
    assert_eq!(json, format!("\"{}\"", d.as_str()));
    let back: ContentDigest = serde_json::from_str(&json).unwrap();
    assert_eq!(back, d);
}
