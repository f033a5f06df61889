// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::task_info::TaskDescriptor;
use crate::errors::{BootdagError, Result};
use crate::types::TaskId;

static NO_TASKS: BTreeSet<TaskId> = BTreeSet::new();

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Forward edges: tasks that must finalize before this one can run.
    deps: BTreeSet<TaskId>,
    /// Reverse edges: tasks that list this one as a prerequisite.
    dependents: BTreeSet<TaskId>,
}

/// In-memory dependency graph keyed by task id.
///
/// The forward (`dependencies_of`) and reverse (`dependents_of`) maps are
/// exact transposes of each other. Building the graph checks that every
/// referenced id exists, but does not check for cycles; call
/// [`DagGraph::find_cycle`] for that.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskId, DagNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

impl DagGraph {
    /// Build forward and reverse adjacency from the descriptors' declared
    /// dependencies.
    ///
    /// Fails on a repeated task id or on a dependency naming a task that is
    /// not part of `tasks`.
    pub fn build(tasks: &[TaskDescriptor]) -> Result<Self> {
        let mut nodes: BTreeMap<TaskId, DagNode> = BTreeMap::new();

        // First pass: one node per task, with its dependency set.
        for task in tasks {
            if nodes.contains_key(task.id()) {
                return Err(BootdagError::DuplicateTaskId(task.id().to_string()));
            }
            nodes.insert(
                task.id().to_string(),
                DagNode {
                    deps: task.dependency_ids().clone(),
                    dependents: BTreeSet::new(),
                },
            );
        }

        // Second pass: transpose into dependents.
        for task in tasks {
            for dep in task.dependency_ids() {
                match nodes.get_mut(dep) {
                    Some(dep_node) => {
                        dep_node.dependents.insert(task.id().to_string());
                    }
                    None => {
                        return Err(BootdagError::UnknownDependency {
                            task: task.id().to_string(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        debug!(tasks = nodes.len(), "dependency graph built");
        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All task ids, in ascending order.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// What `id` waits on.
    pub fn dependencies_of(&self, id: &str) -> &BTreeSet<TaskId> {
        self.nodes.get(id).map(|n| &n.deps).unwrap_or(&NO_TASKS)
    }

    /// Who waits on `id`.
    pub fn dependents_of(&self, id: &str) -> &BTreeSet<TaskId> {
        self.nodes.get(id).map(|n| &n.dependents).unwrap_or(&NO_TASKS)
    }

    /// Tasks with no prerequisites: the initial dispatch set.
    pub fn entry_tasks(&self) -> Vec<TaskId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.deps.is_empty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Depth-first search with three-coloring over every node.
    ///
    /// Returns the first cycle found, following forward edges, with the
    /// starting task repeated at the end (`A -> B -> A` means A waits on B
    /// and B waits on A).
    pub fn find_cycle(&self) -> Option<Vec<TaskId>> {
        let mut color: HashMap<&str, Color> = self
            .nodes
            .keys()
            .map(|id| (id.as_str(), Color::Unvisited))
            .collect();

        for root in self.nodes.keys() {
            if color.get(root.as_str()) != Some(&Color::Unvisited) {
                continue;
            }

            let mut stack = vec![(root.as_str(), self.dependencies_of(root).iter())];
            color.insert(root.as_str(), Color::InProgress);

            loop {
                let Some((node, deps)) = stack.last_mut() else {
                    break;
                };
                let node: &str = *node;

                match deps.next() {
                    Some(next) => match color.get(next.as_str()) {
                        Some(Color::InProgress) => {
                            let start = stack
                                .iter()
                                .position(|(id, _)| *id == next.as_str())
                                .unwrap_or(0);
                            let mut path: Vec<TaskId> =
                                stack[start..].iter().map(|(id, _)| id.to_string()).collect();
                            path.push(next.clone());
                            return Some(path);
                        }
                        Some(Color::Unvisited) => {
                            color.insert(next.as_str(), Color::InProgress);
                            stack.push((next.as_str(), self.dependencies_of(next).iter()));
                        }
                        Some(Color::Done) | None => {}
                    },
                    None => {
                        color.insert(node, Color::Done);
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    /// A topological order (prerequisites first), computed with `petgraph`.
    ///
    /// Used for diagnostics such as the CLI dry-run.
    pub fn topological_order(&self) -> Result<Vec<TaskId>> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(id.as_str());
        }
        for (id, node) in self.nodes.iter() {
            for dep in node.deps.iter() {
                graph.add_edge(dep.as_str(), id.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
            Err(cycle) => {
                let path = self
                    .find_cycle()
                    .unwrap_or_else(|| vec![cycle.node_id().to_string()]);
                Err(BootdagError::CircularDependency(path))
            }
        }
    }
}
