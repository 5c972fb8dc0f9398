// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;

/// Exit code contract: 2 daemon unreachable, 3 not found,
/// 4 not confirmable, 5 everything else.
pub const EXIT_UNREACHABLE: i32 = 2;
pub const EXIT_NOT_FOUND: i32 = 3;
pub const EXIT_NOT_CONFIRMABLE: i32 = 4;
pub const EXIT_FAILURE: i32 = 5;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}
