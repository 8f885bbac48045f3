// attest-core/src/domain/graph/dag.rs

use crate::domain::error::DomainError;
use crate::domain::runbook::ArtifactDefinition;
use std::collections::{BTreeMap, BTreeSet};

/// Dependency graph over flattened artifact ids.
///
/// Built once per plan and validated before any component runs. Edges point
/// from an artifact to the artifacts it consumes.
#[derive(Debug, Clone)]
pub struct ExecutionDag {
    /// node -> its direct dependencies.
    dependencies: BTreeMap<String, BTreeSet<String>>,

    /// node -> its direct dependents (reverse edges).
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl ExecutionDag {
    pub fn build(artifacts: &BTreeMap<String, ArtifactDefinition>) -> Self {
        let dependencies: BTreeMap<String, BTreeSet<String>> = artifacts
            .iter()
            .map(|(id, definition)| {
                (
                    id.clone(),
                    definition.dependencies().iter().cloned().collect(),
                )
            })
            .collect();
        Self::from_dependencies(dependencies)
    }

    pub fn from_dependencies(dependencies: BTreeMap<String, BTreeSet<String>>) -> Self {
        let mut dependents: BTreeMap<String, BTreeSet<String>> = dependencies
            .keys()
            .map(|id| (id.clone(), BTreeSet::new()))
            .collect();

        for (node, deps) in &dependencies {
            for dep in deps {
                // Edges to unknown ids are kept; the planner reports them as
                // reference errors with better context than the graph could.
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .insert(node.clone());
            }
        }

        Self {
            dependencies,
            dependents,
        }
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &String> {
        self.dependencies.keys()
    }

    /// Cycle detection via Kahn's algorithm: any node left with a positive
    /// residual in-degree sits on a cycle. O(V+E).
    pub fn validate(&self) -> Result<(), DomainError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(id, deps)| {
                let known = deps
                    .iter()
                    .filter(|d| self.dependencies.contains_key(*d))
                    .count();
                (id.as_str(), known)
            })
            .collect();

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut resolved = 0;
        while let Some(current) = queue.pop() {
            resolved += 1;
            if let Some(dependents) = self.dependents.get(current) {
                for dependent in dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push(dependent);
                        }
                    }
                }
            }
        }

        if resolved != self.dependencies.len() {
            let stuck: Vec<&str> = in_degree
                .iter()
                .filter(|&(_, &degree)| degree > 0)
                .map(|(id, _)| *id)
                .collect();
            return Err(DomainError::CircularDependency {
                nodes: stuck.join(", "),
            });
        }
        Ok(())
    }

    /// All transitive dependents of `id`, excluding `id` itself. Used to
    /// propagate skips when an optional artifact fails.
    pub fn transitive_dependents(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            if let Some(dependents) = self.dependents.get(&current) {
                for dependent in dependents {
                    if seen.insert(dependent.clone()) {
                        frontier.push(dependent.clone());
                    }
                }
            }
        }
        seen
    }

    /// Stateful topological iterator. Call order: `get_ready` hands out every
    /// node whose dependencies are all done; `done` unlocks dependents;
    /// `is_active` is false once every node has been marked done.
    pub fn create_sorter(&self) -> TopoSorter {
        let mut ready = BTreeSet::new();
        let mut in_degree = BTreeMap::new();
        for (id, deps) in &self.dependencies {
            let known = deps
                .iter()
                .filter(|d| self.dependencies.contains_key(*d))
                .count();
            if known == 0 {
                ready.insert(id.clone());
            }
            in_degree.insert(id.clone(), known);
        }

        TopoSorter {
            in_degree,
            dependents: self.dependents.clone(),
            ready,
            remaining: self.dependencies.len(),
        }
    }
}

#[derive(Debug)]
pub struct TopoSorter {
    in_degree: BTreeMap<String, usize>,
    dependents: BTreeMap<String, BTreeSet<String>>,
    ready: BTreeSet<String>,
    remaining: usize,
}

impl TopoSorter {
    /// Drains and returns the nodes that became ready since the last call.
    pub fn get_ready(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.ready)
    }

    /// Marks a node complete, making dependents with no other outstanding
    /// dependencies available to the next `get_ready` call.
    pub fn done(&mut self, id: &str) {
        self.remaining = self.remaining.saturating_sub(1);
        let Some(dependents) = self.dependents.get(id).cloned() else {
            return;
        };
        for dependent in dependents {
            if let Some(degree) = self.in_degree.get_mut(&dependent) {
                *degree = degree.saturating_sub(1);
                if *degree == 0 {
                    self.ready.insert(dependent);
                }
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }
}
