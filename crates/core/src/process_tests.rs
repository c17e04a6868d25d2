// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    stopped     = { ProcessState::Stopped, false },
    starting    = { ProcessState::Starting, true },
    running     = { ProcessState::Running, true },
    stopping    = { ProcessState::Stopping, true },
    failed      = { ProcessState::Failed, false },
    disabled    = { ProcessState::Disabled, false },
    quarantined = { ProcessState::Quarantined, false },
)]
fn has_pid_matches_lifecycle(state: ProcessState, expected: bool) {
    assert_eq!(state.has_pid(), expected);
}

#[test]
fn start_is_accepted_from_stopped_and_failed_only() {
    assert!(ProcessState::Stopped.can_start());
    assert!(ProcessState::Failed.can_start());
    for state in [
        ProcessState::Starting,
        ProcessState::Running,
        ProcessState::Stopping,
        ProcessState::Disabled,
        ProcessState::Quarantined,
    ] {
        assert!(!state.can_start(), "{state} should not accept start");
    }
}

#[test]
fn state_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ProcessState::Quarantined).unwrap(),
        r#""quarantined""#
    );
    let back: ProcessState = serde_json::from_str(r#""stopping""#).unwrap();
    assert_eq!(back, ProcessState::Stopping);
}
