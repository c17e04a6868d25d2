// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pg-adapters: OS facade and notification sinks for ProcessGuard.
//!
//! Everything the supervisor needs from the host OS (spawning, signalling,
//! `/proc`-style sampling) and every outbound notification transport lives
//! behind the traits in this crate, so the engine can be driven by fakes.

pub mod notify;
pub mod os;

pub use notify::{
    DesktopSink, EmailConfig, EmailSink, NoOpSink, NotifyError, NotifySink, SlackSink, WebhookSink,
};
pub use os::{
    Child, OsAdapter, OsError, SampleError, SignalKind, SpawnError, SpawnRequest, UnixOsAdapter,
};

#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeSink;
#[cfg(any(test, feature = "test-support"))]
pub use os::FakeOsAdapter;
