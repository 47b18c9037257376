// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcode job cleanup.

use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, DeleteParams};
use tracing::{info, warn};

/// Delete the transcode job with background propagation.
///
/// Runs on the way out no matter how the wait ended; the governing token
/// may already be cancelled, so callers invoke this outside any
/// cancellation scope. A delete failure is logged, never allowed to mask
/// the wait's own outcome.
pub async fn delete_job(jobs: &Api<Job>, name: &str) {
    let dp = DeleteParams::background();
    match jobs.delete(name, &dp).await {
        Ok(_) => info!(job = name, "transcode job deleted"),
        Err(e) => warn!(job = name, error = %e, "failed to clean up transcode job"),
    }
}
