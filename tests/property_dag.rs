mod common;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use bootdag::dag::{DagGraph, TaskRegistry};
use bootdag::{TaskDescriptor, TaskStatus};
use bootdag_test_utils::RUN_TIMEOUT;
use bootdag_test_utils::builders::{ExecutionLog, recording_task};
use common::{assert_started_after, new_scheduler};
use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use proptest::prelude::*;

fn name(i: usize) -> String {
    format!("task_{i}")
}

/// Dependency lists for an acyclic graph: task N may only depend on tasks
/// `0..N`.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    if i == 0 {
                        BTreeSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect()
        })
    })
}

#[derive(Debug, Clone, Copy)]
struct TaskShape {
    outcome: TaskStatus,
    tolerates_timeout: bool,
}

fn shape_strategy() -> impl Strategy<Value = TaskShape> {
    (
        prop_oneof![
            Just(TaskStatus::Succeeded),
            Just(TaskStatus::Failed),
            Just(TaskStatus::TimedOut),
        ],
        any::<bool>(),
    )
        .prop_map(|(outcome, tolerates_timeout)| TaskShape {
            outcome,
            tolerates_timeout,
        })
}

proptest! {
    /// Drive the registry by hand, finalizing ready tasks in a random order,
    /// and check every release decision the cascade makes.
    #[test]
    fn cascade_releases_only_after_every_prerequisite_finalized(
        deps in dag_strategy(12),
        shapes in proptest::collection::vec(shape_strategy(), 12),
        picks in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let n = deps.len();
        let tasks: Vec<TaskDescriptor> = deps
            .iter()
            .enumerate()
            .map(|(i, ds)| {
                TaskDescriptor::new(name(i), || Ok(()))
                    .depends_on_all(ds.iter().map(|&d| name(d)))
                    .allow_continue_on_timeout(shapes[i].tolerates_timeout)
            })
            .collect();
        let registry = TaskRegistry::build(tasks).unwrap();

        let mut ready: Vec<String> = registry.entry_tasks();
        let mut finalized: BTreeMap<String, TaskStatus> = BTreeMap::new();
        let mut released: HashSet<String> = ready.iter().cloned().collect();
        let mut suppressed: HashSet<String> = HashSet::new();
        let mut pick = picks.iter().cycle();

        while !ready.is_empty() {
            let idx = pick.next().copied().unwrap_or(0) % ready.len();
            let task = ready.swap_remove(idx);
            let i: usize = task["task_".len()..].parse().unwrap();

            prop_assert!(registry.states().try_begin(&task));
            prop_assert!(!registry.states().try_begin(&task), "double dispatch of {}", task);
            let outcome = shapes[i].outcome;
            prop_assert!(registry.states().try_finalize(&task, outcome));
            prop_assert!(!registry.states().try_finalize(&task, TaskStatus::Succeeded));
            finalized.insert(task.clone(), outcome);

            let step = registry.cascade(&task, outcome);
            for dependent in &step.released {
                prop_assert!(released.insert(dependent.clone()), "{} released twice", dependent);
                for dep in registry.graph().dependencies_of(dependent) {
                    prop_assert!(finalized.contains_key(dep), "{} released before {}", dependent, dep);
                }
                ready.push(dependent.clone());
            }
            for dependent in &step.suppressed {
                prop_assert!(suppressed.insert(dependent.clone()));
            }
        }

        // Whatever never ran is pending and was held back (directly or
        // transitively) by a timed-out prerequisite.
        for i in 0..n {
            let task = name(i);
            let gated_here = deps[i]
                .iter()
                .any(|&d| finalized.get(&name(d)) == Some(&TaskStatus::TimedOut))
                && !shapes[i].tolerates_timeout;
            let upstream_missing = deps[i].iter().any(|&d| !finalized.contains_key(&name(d)));

            if finalized.contains_key(&task) {
                prop_assert!(!gated_here, "{} ran despite a timed-out prerequisite", task);
            } else {
                prop_assert_eq!(registry.states().status(&task), Some(TaskStatus::Pending));
                prop_assert!(gated_here || upstream_missing);
                prop_assert_eq!(suppressed.contains(&task), gated_here && !upstream_missing);
            }
        }
    }

    /// Cycle detection agrees with petgraph on arbitrary directed graphs.
    #[test]
    fn find_cycle_agrees_with_petgraph(
        n in 1usize..8,
        edges in proptest::collection::vec((0usize..8, 0usize..8), 0..16),
    ) {
        let mut deps: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        let mut reference: DiGraphMap<usize, ()> = DiGraphMap::new();
        for i in 0..n {
            reference.add_node(i);
        }
        for (from, to) in edges {
            let (from, to) = (from % n, to % n);
            deps[from].insert(to);
            reference.add_edge(from, to, ());
        }

        let tasks: Vec<TaskDescriptor> = deps
            .iter()
            .enumerate()
            .map(|(i, ds)| {
                TaskDescriptor::new(name(i), || Ok(())).depends_on_all(ds.iter().map(|&d| name(d)))
            })
            .collect();
        let graph = DagGraph::build(&tasks).unwrap();
        let cycle = graph.find_cycle();

        prop_assert_eq!(cycle.is_some(), is_cyclic_directed(&reference));

        if let Some(path) = cycle {
            prop_assert!(path.len() >= 2);
            prop_assert_eq!(path.first(), path.last());
            for pair in path.windows(2) {
                prop_assert!(graph.dependencies_of(&pair[0]).contains(&pair[1]));
            }
            prop_assert!(graph.topological_order().is_err());
        } else {
            prop_assert_eq!(graph.topological_order().unwrap().len(), n);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Real runs across both lanes: every task starts after its
    /// prerequisites finished, and runs exactly once.
    #[test]
    fn live_runs_respect_dependencies(
        deps in dag_strategy(8),
        on_main in proptest::collection::vec(any::<bool>(), 8),
        work_ms in proptest::collection::vec(0u64..3, 8),
    ) {
        let log = ExecutionLog::new();
        let scheduler = new_scheduler();
        let tasks: Vec<TaskDescriptor> = deps
            .iter()
            .enumerate()
            .map(|(i, ds)| {
                let task = recording_task(&name(i), Duration::from_millis(work_ms[i]), &log)
                    .depends_on_all(ds.iter().map(|&d| name(d)));
                if on_main[i] { task.on_main_lane() } else { task }
            })
            .collect();

        scheduler.register(tasks).unwrap();
        scheduler.start().unwrap();
        prop_assert!(scheduler.wait_for_all_complete(RUN_TIMEOUT));

        for (i, ds) in deps.iter().enumerate() {
            prop_assert_eq!(log.count(&name(i)), 1);
            for &d in ds {
                assert_started_after(&log, &name(i), &name(d));
            }
        }
        prop_assert!(scheduler.statuses().values().all(|s| *s == TaskStatus::Succeeded));
    }
}
