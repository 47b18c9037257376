// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[parameterized(
    simple = { "ENV=val", "ENV", "val" },
    equals_in_value = { "ENV=val=ue", "ENV", "val=ue" },
    empty_value = { "ENV=", "ENV", "" },
    no_separator = { "ENV", "ENV", "" },
)]
fn splits_on_first_equals(entry: &str, key: &str, value: &str) {
    assert_eq!(split_entry(entry), (key.to_string(), value.to_string()));
}

#[test]
fn splits_whole_environ_in_order() {
    let got = split_environ(["ENV=val", "ENV2=val2"]);
    assert_eq!(got, pairs(&[("ENV", "val"), ("ENV2", "val2")]));
}

#[test]
fn splits_empty_environ() {
    assert_eq!(split_environ(Vec::<String>::new()), vec![]);
}

proptest! {
    // Splitting on the first `=` must reproduce the original key/value
    // pairs even when values themselves contain `=`.
    #[test]
    fn split_roundtrips(key in "[A-Z_][A-Z0-9_]{0,15}", value in "[ -~]{0,32}") {
        let entry = format!("{key}={value}");
        prop_assert_eq!(split_entry(&entry), (key, value));
    }
}

#[parameterized(
    drops_pod_name = {
        &[("POD_NAME", "pms"), ("SHELL", "/bin/false")],
        &[("SHELL", "/bin/false")]
    },
    drops_pod_namespace = {
        &[("SHELL", "/bin/false"), ("POD_NAMESPACE", "pms")],
        &[("SHELL", "/bin/false")]
    },
    drops_both = {
        &[("POD_NAME", "pms"), ("SHELL", "/bin/false"), ("POD_NAMESPACE", "pms")],
        &[("SHELL", "/bin/false")]
    },
    nothing_to_drop = {
        &[("SHELL", "/bin/false")],
        &[("SHELL", "/bin/false")]
    },
    empty = { &[], &[] },
    unescapes_codec_path = {
        &[("FFMPEG_EXTERNAL_LIBS", "/path\\ to/codec")],
        &[("FFMPEG_EXTERNAL_LIBS", "/path to/codec")]
    },
)]
fn filters_pod_env(input: &[(&str, &str)], want: &[(&str, &str)]) {
    assert_eq!(filter_pod_env(pairs(input)), pairs(want));
}
