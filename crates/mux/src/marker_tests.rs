// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn generate_is_unique_per_command() {
    let a = ExitMarker::generate("echo hello");
    let b = ExitMarker::generate("echo hello");
    assert_ne!(a.hash(), b.hash());
    assert_eq!(a.hash().len(), 16);
    assert!(a.hash().chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn template_shape() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    assert_eq!(marker.template(), "__EXIT__aabbccdd00112233__$?__");
}

#[test]
fn append_to_builds_echo_suffix() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    assert_eq!(
        marker.append_to("echo hello"),
        "echo hello; echo \"__EXIT__aabbccdd00112233__$?__\""
    );
}

#[parameterized(
    zero = { "0", 0 },
    nonzero = { "17", 17 },
    negative_ish = { "127", 127 },
)]
fn find_exit_code_parses_expanded_marker(code_str: &str, code: i32) {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = format!("hello\n__EXIT__aabbccdd00112233__{}__\n", code_str);
    assert_eq!(marker.find_exit_code(&text), Some(code));
}

#[test]
fn template_form_is_not_completion() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    // The echoed command line contains the template with a literal $?
    let text = "echo hello; echo \"__EXIT__aabbccdd00112233__$?__\"\n";
    assert_eq!(marker.find_exit_code(text), None);
}

#[test]
fn echoed_template_then_expansion_found() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "echo hello; echo \"__EXIT__aabbccdd00112233__$?__\"\nhello\n__EXIT__aabbccdd00112233__0__\n";
    assert_eq!(marker.find_exit_code(text), Some(0));
}

#[test]
fn other_hashes_are_ignored() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "__EXIT__ffffffffffffffff__0__\n";
    assert_eq!(marker.find_exit_code(text), None);
}

#[test]
fn marker_found_mid_line_among_noise() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "some output__EXIT__aabbccdd00112233__3__trailing";
    assert_eq!(marker.find_exit_code(text), Some(3));
}

#[test]
fn strip_removes_expanded_marker_lines() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "hello\n__EXIT__aabbccdd00112233__0__\nworld\n";
    let stripped = marker.strip(text);
    assert_eq!(stripped, "hello\nworld\n");
    assert!(!stripped.contains("__EXIT__"));
}

#[test]
fn strip_removes_echoed_template_scaffolding() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "$ echo hello; echo \"__EXIT__aabbccdd00112233__$?__\"\nhello\n__EXIT__aabbccdd00112233__0__\n";
    let stripped = marker.strip(text);
    assert!(!stripped.contains("__EXIT__"), "got: {stripped}");
    assert!(stripped.contains("$ echo hello\n"));
    assert!(stripped.contains("hello\n"));
}

#[test]
fn strip_preserves_unrelated_text() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "no markers here\nat all";
    assert_eq!(marker.strip(text), text);
}

#[test]
fn strip_handles_marker_interleaved_with_output() {
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    let text = "tail__EXIT__aabbccdd00112233__0__more";
    assert_eq!(marker.strip(text), "tailmore");
}
