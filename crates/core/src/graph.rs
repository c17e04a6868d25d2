// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph over process names.
//!
//! Edges point from a process to what it requires. The graph is kept
//! acyclic: every insert runs a topological probe and is rolled back on a
//! cycle. Cascade shutdown walks the reverse edges.

use crate::error::ConfigError;
use indexmap::IndexMap;

/// Directed acyclic graph of process dependencies.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// name -> direct dependencies, in registration order.
    deps: IndexMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }

    /// Add a node with its direct dependencies.
    ///
    /// Fails with `DependencyCycle` (and leaves the graph unchanged) when
    /// the new edges would close a cycle. Dependencies on names not yet in
    /// the graph are allowed here; the registry checks existence.
    pub fn insert(&mut self, name: &str, deps: &[String]) -> Result<(), ConfigError> {
        let previous = self
            .deps
            .insert(name.to_string(), deps.to_vec());
        if self.find_cycle_from(name) {
            // Roll back
            match previous {
                Some(old) => {
                    self.deps.insert(name.to_string(), old);
                }
                None => {
                    self.deps.shift_remove(name);
                }
            }
            return Err(ConfigError::DependencyCycle(name.to_string()));
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) {
        self.deps.shift_remove(name);
    }

    /// Direct dependencies of `name`.
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.deps.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Processes that directly depend on `name`.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.deps
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == name))
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// All processes whose transitive dependency closure contains `name`,
    /// excluding `name` itself. BFS over reverse edges; breadth order.
    pub fn dependents_closure(&self, name: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut queue: Vec<String> = vec![name.to_string()];
        let mut qi = 0;
        while qi < queue.len() {
            let current = queue[qi].clone();
            qi += 1;
            for dependent in self.dependents(&current) {
                if dependent != name && !out.contains(&dependent) {
                    out.push(dependent.clone());
                    queue.push(dependent);
                }
            }
        }
        out
    }

    /// Names in start order: every process appears after its dependencies.
    ///
    /// The graph is acyclic by construction, so this always covers every
    /// node. Ties keep registration order.
    pub fn topo_order(&self) -> Vec<String> {
        let mut order = Vec::with_capacity(self.deps.len());
        let mut placed: Vec<&str> = Vec::with_capacity(self.deps.len());
        let mut remaining: Vec<&str> = self.deps.keys().map(String::as_str).collect();

        while !remaining.is_empty() {
            let mut progressed = false;
            let mut next_remaining = Vec::with_capacity(remaining.len());
            for name in remaining {
                let ready = self
                    .dependencies(name)
                    .iter()
                    // Dependencies outside the graph cannot gate ordering
                    .all(|d| placed.contains(&d.as_str()) || !self.contains(d));
                if ready {
                    placed.push(name);
                    order.push(name.to_string());
                    progressed = true;
                } else {
                    next_remaining.push(name);
                }
            }
            if !progressed {
                // Unreachable for an acyclic graph; bail rather than spin.
                for name in next_remaining {
                    order.push(name.to_string());
                }
                break;
            }
            remaining = next_remaining;
        }
        order
    }

    /// DFS from `start` along dependency edges looking for a path back to
    /// `start`.
    fn find_cycle_from(&self, start: &str) -> bool {
        let mut stack: Vec<&str> = self
            .dependencies(start)
            .iter()
            .map(String::as_str)
            .collect();
        let mut seen: Vec<&str> = Vec::new();
        while let Some(current) = stack.pop() {
            if current == start {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            for dep in self.dependencies(current) {
                stack.push(dep);
            }
        }
        false
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
