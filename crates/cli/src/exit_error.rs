// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type that carries the shim's process exit code.
//!
//! The session logic returns `ExitError` instead of calling
//! `std::process::exit()` directly, allowing `main()` to handle process
//! termination after cleanup has run. The shim's whole exit surface is
//! two codes: 0 for success and graceful cancellation, [`CONFIG`] for
//! everything that stops an offload attempt — configuration, pod
//! resolution, and job lifecycle failures alike.

use std::fmt;

/// Exit code for configuration, resolution, and lifecycle failures.
pub const CONFIG: i32 = 1;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// A failure that terminates the offload attempt with [`CONFIG`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(CONFIG, message)
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod exit_error_tests;
