// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control protocol for daemon communication.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload

mod request;
mod response;
mod wire;

pub use request::{ChangeFilter, Request};
pub use response::{
    summarize, ChangeDetail, ChangeSummary, CheckItem, ErrorBody, ErrorKind, Payload, Response,
    SelfTestReport, SnapshotSummary, StatusInfo,
};
pub use wire::{read_message, write_message, ProtocolError};

#[cfg(test)]
mod property_tests;
