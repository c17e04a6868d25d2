// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;

fn sample(cpu: f64) -> MetricSample {
    MetricSample {
        taken_at: Utc::now(),
        cpu_percent: cpu,
        rss_bytes: 1024,
        memory_percent: cpu / 2.0,
        threads: 4,
        open_files: 10,
        connections: 2,
        uptime_seconds: 0.0,
    }
}

#[test]
fn ring_fills_then_overwrites_oldest() {
    let mut ring = SampleRing::new(3);
    assert!(ring.is_empty());

    for cpu in [1.0, 2.0, 3.0] {
        ring.push(sample(cpu));
    }
    assert_eq!(ring.len(), 3);
    let cpus: Vec<f64> = ring.iter().map(|s| s.cpu_percent).collect();
    assert_eq!(cpus, vec![1.0, 2.0, 3.0]);

    ring.push(sample(4.0));
    assert_eq!(ring.len(), 3, "capacity is fixed");
    let cpus: Vec<f64> = ring.iter().map(|s| s.cpu_percent).collect();
    assert_eq!(cpus, vec![2.0, 3.0, 4.0]);
}

#[test]
fn latest_tracks_most_recent_push() {
    let mut ring = SampleRing::new(2);
    assert!(ring.latest().is_none());

    ring.push(sample(1.0));
    assert_eq!(ring.latest().unwrap().cpu_percent, 1.0);

    ring.push(sample(2.0));
    ring.push(sample(3.0));
    assert_eq!(ring.latest().unwrap().cpu_percent, 3.0);
}

#[test]
fn rolling_mean_requires_full_window() {
    let mut ring = SampleRing::new(10);
    ring.push(sample(50.0));
    ring.push(sample(70.0));
    assert_eq!(ring.rolling_mean(3, |s| s.cpu_percent), None);

    ring.push(sample(90.0));
    let mean = ring.rolling_mean(3, |s| s.cpu_percent).unwrap();
    assert!((mean - 70.0).abs() < f64::EPSILON);
}

#[test]
fn rolling_mean_uses_most_recent_samples() {
    let mut ring = SampleRing::new(4);
    for cpu in [10.0, 20.0, 30.0, 40.0, 50.0, 60.0] {
        ring.push(sample(cpu));
    }
    // Ring now holds 30, 40, 50, 60; mean of last 2 is 55
    let mean = ring.rolling_mean(2, |s| s.cpu_percent).unwrap();
    assert!((mean - 55.0).abs() < f64::EPSILON);
}

#[test]
fn clear_resets_the_ring() {
    let mut ring = SampleRing::new(2);
    ring.push(sample(1.0));
    ring.push(sample(2.0));
    ring.push(sample(3.0));
    ring.clear();
    assert!(ring.is_empty());
    assert!(ring.latest().is_none());

    ring.push(sample(9.0));
    let cpus: Vec<f64> = ring.iter().map(|s| s.cpu_percent).collect();
    assert_eq!(cpus, vec![9.0]);
}

#[test]
fn zero_capacity_is_clamped_to_one() {
    let mut ring = SampleRing::new(0);
    assert_eq!(ring.capacity(), 1);
    ring.push(sample(1.0));
    ring.push(sample(2.0));
    assert_eq!(ring.len(), 1);
    assert_eq!(ring.latest().unwrap().cpu_percent, 2.0);
}
