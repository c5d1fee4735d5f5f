// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Dependency graph between systems
//!
//! The [`TaskGroup`] is derived once from the system signatures and reused by
//! every step. It stores, per system, the inverse of the declared dependency
//! relation (the successors) and the counter of outstanding predecessors that
//! the step executor decrements as tasks complete.
//!
//! Construction is also the configuration validation pass: unknown ids,
//! cycles and conflicting component access between unordered systems are all
//! rejected here, before any step runs.

use crate::error::ConfigError;
use crate::signature::{SystemId, SystemSignature};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scheduler-side wrapper around one system
#[derive(Debug)]
pub struct Task {
    predecessor_count: usize,
    successors: Vec<SystemId>,
    /// Predecessors that have not arrived yet in the current step
    pending: AtomicUsize,
}

impl Task {
    /// Number of declared predecessors
    pub fn predecessor_count(&self) -> usize {
        self.predecessor_count
    }

    /// Systems that list this one as a dependency
    pub fn successors(&self) -> &[SystemId] {
        &self.successors
    }

    pub(crate) fn pending(&self) -> &AtomicUsize {
        &self.pending
    }
}

/// Fixed collection of tasks built from the system signatures
#[derive(Debug)]
pub struct TaskGroup {
    tasks: Vec<Task>,
    roots: Vec<SystemId>,
    order: Vec<SystemId>,
    /// `reachable[a][b]` is true when `b` transitively depends on `a`
    reachable: Vec<Vec<bool>>,
}

impl TaskGroup {
    /// Build and validate the task group
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a dependency or component id is
    /// unknown, a system reads and mutates the same component, a strategy
    /// has a zero-sized parameter, the dependencies contain a cycle, or two
    /// systems that may run concurrently conflict on a component.
    pub fn build(systems: &[SystemSignature], component_count: usize) -> Result<Self, ConfigError> {
        for signature in systems {
            validate_signature(signature, systems.len(), component_count)?;
        }

        let mut successors = vec![Vec::new(); systems.len()];
        for (index, signature) in systems.iter().enumerate() {
            for dependency in signature.dependencies() {
                successors[dependency.index()].push(SystemId::new(index));
            }
        }

        let order = topological_order(systems, &successors)?;
        let reachable = reachability(&order, &successors);
        check_conflicts(systems, &reachable)?;

        let tasks: Vec<Task> = systems
            .iter()
            .zip(successors)
            .map(|(signature, successors)| Task {
                predecessor_count: signature.dependencies().len(),
                successors,
                pending: AtomicUsize::new(signature.dependencies().len()),
            })
            .collect();
        let roots = order
            .iter()
            .copied()
            .filter(|id| tasks[id.index()].predecessor_count == 0)
            .collect();

        Ok(TaskGroup {
            tasks,
            roots,
            order,
            reachable,
        })
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the group holds no task
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task of a system
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this group.
    pub fn task(&self, id: SystemId) -> &Task {
        &self.tasks[id.index()]
    }

    /// Tasks with no predecessors, runnable as soon as a step starts
    pub fn roots(&self) -> &[SystemId] {
        &self.roots
    }

    /// Systems that depend directly on `id`
    pub fn successors_of(&self, id: SystemId) -> &[SystemId] {
        self.task(id).successors()
    }

    /// Number of direct dependencies of `id`
    pub fn predecessor_count_of(&self, id: SystemId) -> usize {
        self.task(id).predecessor_count()
    }

    /// A valid sequential execution order
    pub fn topological_order(&self) -> &[SystemId] {
        &self.order
    }

    /// Whether `before` is guaranteed to finish before `after` starts
    pub fn is_ordered(&self, before: SystemId, after: SystemId) -> bool {
        self.reachable[before.index()][after.index()]
    }

    /// Restore every counter to its predecessor count
    ///
    /// Called while no step is in flight.
    pub fn reset(&self) {
        for task in &self.tasks {
            task.pending.store(task.predecessor_count, Ordering::Relaxed);
        }
    }
}

fn validate_signature(
    signature: &SystemSignature,
    system_count: usize,
    component_count: usize,
) -> Result<(), ConfigError> {
    let name = || signature.name().to_string();

    if let Some(&dependency) = signature
        .dependencies()
        .iter()
        .find(|d| d.index() >= system_count)
    {
        return Err(ConfigError::UnknownDependency {
            system: name(),
            dependency,
        });
    }
    if let Some(component) = signature
        .access()
        .all()
        .find(|c| c.index() >= component_count)
    {
        return Err(ConfigError::UnknownComponent {
            system: name(),
            component,
        });
    }
    if let Some(component) = signature.access().overlap() {
        return Err(ConfigError::ReadAndMutate {
            system: name(),
            component,
        });
    }
    signature
        .parallelism()
        .validate()
        .map_err(|reason| ConfigError::InvalidStrategy {
            system: name(),
            reason,
        })
}

/// Kahn traversal. Whatever cannot be reached by repeatedly removing nodes
/// with no remaining in-edges sits on or behind a cycle.
fn topological_order(
    systems: &[SystemSignature],
    successors: &[Vec<SystemId>],
) -> Result<Vec<SystemId>, ConfigError> {
    let mut in_degree: Vec<usize> = systems.iter().map(|s| s.dependencies().len()).collect();
    let mut queue: VecDeque<SystemId> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(index, _)| SystemId::new(index))
        .collect();

    let mut order = Vec::with_capacity(systems.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for successor in &successors[id.index()] {
            let degree = &mut in_degree[successor.index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(*successor);
            }
        }
    }

    if order.len() != systems.len() {
        let systems = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree > 0)
            .map(|(index, _)| systems[index].name().to_string())
            .collect();
        return Err(ConfigError::Cycle { systems });
    }
    Ok(order)
}

fn reachability(order: &[SystemId], successors: &[Vec<SystemId>]) -> Vec<Vec<bool>> {
    let n = order.len();
    let mut reachable = vec![vec![false; n]; n];
    // Reverse topological order: every successor's row is final before it is merged.
    for id in order.iter().rev() {
        let mut row = vec![false; n];
        for successor in &successors[id.index()] {
            row[successor.index()] = true;
            for (target, &hit) in reachable[successor.index()].iter().enumerate() {
                row[target] |= hit;
            }
        }
        reachable[id.index()] = row;
    }
    reachable
}

fn check_conflicts(systems: &[SystemSignature], reachable: &[Vec<bool>]) -> Result<(), ConfigError> {
    for (a, first) in systems.iter().enumerate() {
        for (b, second) in systems.iter().enumerate().skip(a + 1) {
            if reachable[a][b] || reachable[b][a] {
                continue;
            }
            if let Some(component) = first.access().conflicts_with(second.access()) {
                return Err(ConfigError::AccessConflict {
                    first: first.name().to_string(),
                    second: second.name().to_string(),
                    component,
                });
            }
        }
    }
    Ok(())
}
