// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FFmpeg quoting dialect.
//!
//! FFmpeg path options use a shell-like quoting scheme: a `'...'` run is
//! taken literally, and `\c` escapes the single character `c`. Plex stores
//! `FFMPEG_EXTERNAL_LIBS` in this dialect, so the shim unescapes it before
//! use and the launcher re-escapes it before handing it back to FFmpeg.

use regex::Regex;
use std::sync::LazyLock;

// Allow expect here as the regexes are compile-time verified to be valid
#[allow(clippy::expect_used)]
static UNESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"('(?P<s>[^']*)'|\\(?P<c>.))").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\\|')").expect("constant regex pattern is valid"));

/// Resolve FFmpeg-dialect escapes to the raw string.
pub fn unescape(s: &str) -> String {
    UNESCAPE.replace_all(s, "${s}${c}").into_owned()
}

/// Add FFmpeg-dialect escaping to a raw string.
pub fn escape(s: &str) -> String {
    ESCAPE.replace_all(s, r"\$1").into_owned()
}

#[cfg(test)]
#[path = "ffmpeg_tests.rs"]
mod ffmpeg_tests;
