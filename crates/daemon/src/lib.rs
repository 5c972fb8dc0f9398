// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RevertIT Daemon library
//!
//! This module exposes the control-socket protocol types for use by CLI
//! clients.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod protocol;

pub use protocol::{
    ChangeDetail, ChangeFilter, ChangeSummary, CheckItem, ErrorBody, ErrorKind, Payload,
    ProtocolError, Request, Response, SelfTestReport, SnapshotSummary, StatusInfo,
};
