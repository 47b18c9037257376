// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kt-core: pure transforms shared by the kube-transcode shim and the
//! transcode launcher.
//!
//! Everything in this crate is side-effect free: argument rewriting,
//! environment list handling, and the FFmpeg quoting dialect. The
//! Kubernetes-facing pieces live in `kt-offload`; network plumbing lives
//! in `kt-bridge`.

pub mod args;
pub mod env;
pub mod ffmpeg;

pub use args::{needs_bypass, Rewriter};
pub use env::{filter_pod_env, split_entry, split_environ};
