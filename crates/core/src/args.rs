// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transcoder argument rewriting.
//!
//! Plex invokes its transcoder with callback URLs that assume the
//! transcoder runs next to the server (`http://127.0.0.1:32400`). When the
//! transcode is offloaded, those URLs must point at a service address that
//! is routable from inside the cluster. The rewrite happens here, before
//! launch — the tunnel itself never inspects payload bytes.

use regex::Regex;
use std::sync::LazyLock;

/// Loopback prefix the Plex transcoder bakes into callback URLs.
const LOOPBACK_PREFIX: &str = "http://127.0.0.1:32400";

/// Flags whose following argument carries a callback/reporting URL.
const URL_FLAGS: [&str; 3] = ["-progressurl", "-manifest_name", "-segment_list"];

/// Flags whose following argument is a log level.
const LOGLEVEL_FLAGS: [&str; 2] = ["-loglevel", "-loglevel_plex"];

/// EAE audio codecs that the transcoder can only handle in-place.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static EAE_CODEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(e?ac3|truehd|mlp)_eae$").expect("constant regex pattern is valid")
});

/// Rewrites a transcoder invocation for execution inside the remote job.
#[derive(Debug, Clone)]
pub struct Rewriter {
    /// Routable replacement for the loopback PMS address, including scheme
    /// (e.g. `http://plex-svc:32400`).
    pub pms_internal_address: String,
}

impl Rewriter {
    pub fn new(pms_internal_address: impl Into<String>) -> Self {
        Self { pms_internal_address: pms_internal_address.into() }
    }

    /// Rewrite an argument list. Returns a new list; the input is never
    /// modified.
    ///
    /// Flag/value pairing is positional: the value for a flag at index `i`
    /// is the argument at `i + 1`. A flag appearing as the final argument
    /// has no value to rewrite and is left alone.
    pub fn args(&self, args: &[String]) -> Vec<String> {
        let mut out = args.to_vec();
        for (i, arg) in args.iter().enumerate() {
            if i + 1 >= out.len() {
                continue;
            }
            if URL_FLAGS.contains(&arg.as_str()) {
                out[i + 1] = out[i + 1].replacen(LOOPBACK_PREFIX, &self.pms_internal_address, 1);
            } else if LOGLEVEL_FLAGS.contains(&arg.as_str()) {
                out[i + 1] = "debug".to_string();
            }
        }
        out
    }

    /// Rewrite the environment for the remote transcoder.
    ///
    /// Currently the identity transform; kept as the extension point so
    /// callers pair every `args` rewrite with an `env` rewrite.
    pub fn env(&self, env: &[(String, String)]) -> Vec<(String, String)> {
        env.to_vec()
    }
}

/// Whether the invocation uses an EAE codec and must run in-place against
/// the original transcoder binary instead of being offloaded.
pub fn needs_bypass(args: &[String]) -> bool {
    args.iter().any(|a| EAE_CODEC.is_match(a))
}

#[cfg(test)]
#[path = "args_tests.rs"]
mod args_tests;
