// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment list handling for the remote job.
//!
//! The shim forwards its own environment to the remote transcoder almost
//! verbatim. Two identity variables only have meaning inside the PMS pod
//! and are dropped; `FFMPEG_EXTERNAL_LIBS` is stored by Plex in the FFmpeg
//! quoting dialect and is unescaped before forwarding.

use crate::ffmpeg;

/// Identity variables that describe the PMS pod itself, not the transcode.
const DROPPED_KEYS: [&str; 2] = ["POD_NAME", "POD_NAMESPACE"];

/// Codec library path variable carrying FFmpeg-dialect escaping.
pub const FFMPEG_EXTERNAL_LIBS: &str = "FFMPEG_EXTERNAL_LIBS";

/// Split a single `KEY=VALUE` entry on the first `=` only, so values may
/// themselves contain `=`. An entry with no `=` yields an empty value.
pub fn split_entry(entry: &str) -> (String, String) {
    match entry.split_once('=') {
        Some((k, v)) => (k.to_string(), v.to_string()),
        None => (entry.to_string(), String::new()),
    }
}

/// Split a full `KEY=VALUE` environment list into pairs, preserving order.
pub fn split_environ<I, S>(environ: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    environ.into_iter().map(|e| split_entry(e.as_ref())).collect()
}

/// Filter an environment for the remote job: drop pod identity variables
/// and unescape the codec library path. Order is otherwise preserved.
pub fn filter_pod_env(vars: Vec<(String, String)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter(|(k, _)| !DROPPED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| {
            if k == FFMPEG_EXTERNAL_LIBS {
                let unescaped = ffmpeg::unescape(&v);
                (k, unescaped)
            } else {
                (k, v)
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod env_tests;
