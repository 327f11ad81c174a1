// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn config_override_wins() {
    assert_eq!(login_shell_name(Some("zsh")), "zsh");
}

#[test]
fn fallback_is_shell_basename_or_bash() {
    // Whatever $SHELL holds, the result is a bare name, not a path
    let name = login_shell_name(None);
    assert!(!name.is_empty());
    assert!(!name.contains('/'));
}
