// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn deps(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// db <- api <- web (api requires db, web requires api)
fn three_tier() -> DependencyGraph {
    let mut g = DependencyGraph::new();
    g.insert("db", &[]).unwrap();
    g.insert("api", &deps(&["db"])).unwrap();
    g.insert("web", &deps(&["api"])).unwrap();
    g
}

#[test]
fn dependencies_and_dependents_are_inverse_views() {
    let g = three_tier();
    assert_eq!(g.dependencies("api"), deps(&["db"]));
    assert_eq!(g.dependents("db"), deps(&["api"]));
    assert_eq!(g.dependents("web"), Vec::<String>::new());
}

#[test]
fn closure_walks_reverse_edges_transitively() {
    let g = three_tier();
    assert_eq!(g.dependents_closure("db"), deps(&["api", "web"]));
    assert_eq!(g.dependents_closure("api"), deps(&["web"]));
    assert!(g.dependents_closure("web").is_empty());
}

#[test]
fn closure_handles_diamonds_without_duplicates() {
    let mut g = DependencyGraph::new();
    g.insert("base", &[]).unwrap();
    g.insert("left", &deps(&["base"])).unwrap();
    g.insert("right", &deps(&["base"])).unwrap();
    g.insert("top", &deps(&["left", "right"])).unwrap();

    let closure = g.dependents_closure("base");
    assert_eq!(closure.len(), 3);
    for name in ["left", "right", "top"] {
        assert!(closure.iter().any(|n| n == name), "missing {name}");
    }
}

#[test]
fn direct_cycle_is_rejected_and_rolled_back() {
    let mut g = DependencyGraph::new();
    g.insert("a", &deps(&["b"])).unwrap();
    let err = g.insert("b", &deps(&["a"])).unwrap_err();
    assert_eq!(err, ConfigError::DependencyCycle("b".to_string()));
    assert!(!g.contains("b"), "failed insert must not persist");
}

#[test]
fn indirect_cycle_is_rejected() {
    let mut g = DependencyGraph::new();
    g.insert("a", &deps(&["b"])).unwrap();
    g.insert("b", &deps(&["c"])).unwrap();
    assert!(matches!(
        g.insert("c", &deps(&["a"])),
        Err(ConfigError::DependencyCycle(_))
    ));
}

#[test]
fn reinsert_rollback_restores_previous_edges() {
    let mut g = three_tier();
    // Tightening db -> web would close a cycle; old (empty) deps survive.
    assert!(g.insert("db", &deps(&["web"])).is_err());
    assert_eq!(g.dependencies("db"), Vec::<String>::new());
    assert_eq!(g.dependents_closure("db"), deps(&["api", "web"]));
}

#[test]
fn topo_order_places_dependencies_first() {
    let g = three_tier();
    let order = g.topo_order();
    let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
    assert!(pos("db") < pos("api"));
    assert!(pos("api") < pos("web"));
    assert_eq!(order.len(), 3);
}

#[test]
fn topo_order_keeps_registration_order_for_independents() {
    let mut g = DependencyGraph::new();
    g.insert("zeta", &[]).unwrap();
    g.insert("alpha", &[]).unwrap();
    assert_eq!(g.topo_order(), deps(&["zeta", "alpha"]));
}

#[test]
fn remove_detaches_node() {
    let mut g = three_tier();
    g.remove("web");
    assert!(!g.contains("web"));
    assert_eq!(g.dependents_closure("db"), deps(&["api"]));
}
