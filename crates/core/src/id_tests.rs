// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

crate::define_id! {
    /// Test-only ID type.
    pub struct TestId;
}

#[test]
fn define_id_roundtrip_and_display() {
    let id = TestId::new("alpha-1234");
    assert_eq!(id.as_str(), "alpha-1234");
    assert_eq!(id.to_string(), "alpha-1234");
    assert_eq!(id, "alpha-1234");
    assert_eq!(TestId::from("alpha-1234"), id);
}

#[test]
fn short_truncates_long_ids() {
    let id = TestId::new("abcdefghij");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(32), "abcdefghij");
    assert_eq!("xy".short(8), "xy");
}

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn sequential_gen_counts_up() {
    let gen = SequentialIdGen::new("alert");
    assert_eq!(gen.next(), "alert-1");
    assert_eq!(gen.next(), "alert-2");
    // Clones share the counter
    let clone = gen.clone();
    assert_eq!(clone.next(), "alert-3");
}
