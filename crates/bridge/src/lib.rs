// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kt-bridge: the network bridge between the PMS pod and the remote
//! transcode job.
//!
//! Two independent services, deployed together:
//!
//! - [`tunnel`] — a byte-transparent duplex TCP relay, so the remote
//!   transcoder can reach the PMS instance as if it were local.
//! - [`package`] — an ad hoc codec distribution protocol: the shim serves
//!   its codec directory as one streamed tar archive over HTTP, and the
//!   launcher downloads and unpacks it before the transcoder starts.

pub mod package;
pub mod tunnel;

pub use package::{fetch_package, PackageError};
pub use tunnel::TunnelError;
