// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! kt-offload: Kubernetes job offloading for the kube-transcode shim.
//!
//! Resolves the PMS pod into an immutable [`metadata::PmsMetadata`]
//! descriptor, builds a run-to-completion Job from it ([`spec::build_job`]),
//! drives the job to a terminal state ([`watch::wait_for_completion`]), and
//! deletes it on the way out ([`cleanup::delete_job`]).

pub mod cleanup;
pub mod metadata;
pub mod spec;
pub mod watch;

pub use cleanup::delete_job;
pub use metadata::{MetadataError, Overrides, PmsMetadata};
pub use spec::{build_job, SpecError};
pub use watch::{job_phase, wait_for_completion, JobPhase, WaitError};
