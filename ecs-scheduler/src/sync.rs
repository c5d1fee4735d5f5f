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
//! Atomic-counter task synchronization
//!
//! Each task carries a counter of predecessors that have not finished yet.
//! When a task completes it *arrives*: every successor's counter is
//! decremented with a single `fetch_sub`, and the one thread that takes a
//! counter from one to zero is the one that dispatches the successor. A
//! second counter tracks how many tasks of the step are still outstanding;
//! taking it to zero wakes the thread blocked on the step.
//!
//! # Memory ordering
//!
//! Decrements use `AcqRel`. The release half publishes everything the
//! arriving task wrote; the acquire half, performed by the thread that
//! observes zero, makes the writes of *every* predecessor visible before the
//! successor starts.

use crate::graph::TaskGroup;
use crate::signature::SystemId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};

/// Terminal state reached by a [`Blocker`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerState {
    /// Work is still in flight
    Running,
    /// Every task completed
    Done,
    /// The step was abandoned after a failure
    Aborted,
}

/// Blocking wait primitive for the thread that started a step
#[derive(Debug)]
pub struct Blocker {
    state: Mutex<BlockerState>,
    signal: Condvar,
}

impl Blocker {
    /// A blocker in the running state
    pub fn new() -> Self {
        Blocker {
            state: Mutex::new(BlockerState::Running),
            signal: Condvar::new(),
        }
    }

    /// Move to a terminal state and wake the waiter
    ///
    /// The first terminal state wins; later calls are ignored.
    pub fn finish(&self, outcome: BlockerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == BlockerState::Running {
            *state = outcome;
            self.signal.notify_all();
        }
    }

    /// Block until a terminal state is reached and return it
    pub fn wait(&self) -> BlockerState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while *state == BlockerState::Running {
            state = self.signal.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
        *state
    }

    /// Current state without blocking
    pub fn state(&self) -> BlockerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Blocker {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-step synchronization over a [`TaskGroup`]
///
/// Resets the group's counters on creation, so exactly one instance may exist
/// per group at a time.
#[derive(Debug)]
pub struct StepCounter<'g> {
    group: &'g TaskGroup,
    remaining: AtomicUsize,
    started: Vec<AtomicBool>,
    arrived: Vec<AtomicBool>,
    blocker: Blocker,
}

impl<'g> StepCounter<'g> {
    /// Seed a new step: every counter goes back to its predecessor count
    pub fn new(group: &'g TaskGroup) -> Self {
        group.reset();
        let counter = StepCounter {
            group,
            remaining: AtomicUsize::new(group.len()),
            started: (0..group.len()).map(|_| AtomicBool::new(false)).collect(),
            arrived: (0..group.len()).map(|_| AtomicBool::new(false)).collect(),
            blocker: Blocker::new(),
        };
        if group.is_empty() {
            counter.blocker.finish(BlockerState::Done);
        }
        counter
    }

    /// Tasks runnable before any work has been done
    pub fn seeds(&self) -> &'g [SystemId] {
        self.group.roots()
    }

    /// Record that `id` is about to run
    ///
    /// # Panics
    ///
    /// Panics if a predecessor of `id` has not arrived yet or if `id` was
    /// already started during this step.
    pub fn begin(&self, id: SystemId) {
        let pending = self.group.task(id).pending().load(Ordering::Acquire);
        assert_eq!(
            pending, 0,
            "{} started with {} predecessor(s) still running",
            id, pending
        );
        let already = self.started[id.index()].swap(true, Ordering::Relaxed);
        assert!(!already, "{} dispatched twice in one step", id);
    }

    /// Signal that `id` has completed
    ///
    /// `on_runnable` is called once for each successor whose last
    /// outstanding predecessor was `id`. Returns `true` when this arrival
    /// completed the step.
    ///
    /// # Panics
    ///
    /// Panics if `id` arrives twice in the same step or if a successor's
    /// counter would drop below zero.
    pub fn arrive(&self, id: SystemId, mut on_runnable: impl FnMut(SystemId)) -> bool {
        let already = self.arrived[id.index()].swap(true, Ordering::Relaxed);
        assert!(!already, "{} arrived twice in one step", id);

        for &successor in self.group.successors_of(id) {
            let previous = self
                .group
                .task(successor)
                .pending()
                .fetch_sub(1, Ordering::AcqRel);
            assert!(previous > 0, "{} counter underflow on arrival of {}", successor, id);
            if previous == 1 {
                on_runnable(successor);
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.blocker.finish(BlockerState::Done);
            true
        } else {
            false
        }
    }

    /// Abandon the step and wake the waiter
    pub fn abort(&self) {
        self.blocker.finish(BlockerState::Aborted);
    }

    /// Whether the step was abandoned
    pub fn is_aborted(&self) -> bool {
        self.blocker.state() == BlockerState::Aborted
    }

    /// Tasks that have not arrived yet
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Block until every task arrived or the step was aborted
    pub fn wait(&self) -> BlockerState {
        self.blocker.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::SystemSignature;
    use std::sync::Arc;
    use std::thread;

    fn diamond() -> TaskGroup {
        let systems = vec![
            SystemSignature::new("a"),
            SystemSignature::new("b").depends_on(SystemId::new(0)),
            SystemSignature::new("c").depends_on(SystemId::new(0)),
            SystemSignature::new("d")
                .depends_on(SystemId::new(1))
                .depends_on(SystemId::new(2)),
        ];
        TaskGroup::build(&systems, 0).unwrap()
    }

    #[test]
    fn test_arrival_releases_successors_in_order() {
        let group = diamond();
        let step = StepCounter::new(&group);
        assert_eq!(step.seeds(), &[SystemId::new(0)]);

        let mut runnable = Vec::new();
        step.begin(SystemId::new(0));
        step.arrive(SystemId::new(0), |s| runnable.push(s));
        assert_eq!(runnable, vec![SystemId::new(1), SystemId::new(2)]);

        runnable.clear();
        step.arrive(SystemId::new(1), |s| runnable.push(s));
        assert!(runnable.is_empty(), "d still waits on c");
        step.arrive(SystemId::new(2), |s| runnable.push(s));
        assert_eq!(runnable, vec![SystemId::new(3)]);

        assert!(step.arrive(SystemId::new(3), |_| {}));
        assert_eq!(step.remaining(), 0);
        assert_eq!(step.wait(), BlockerState::Done);
    }

    #[test]
    fn test_counters_are_reset_between_steps() {
        let group = diamond();
        for _ in 0..3 {
            let step = StepCounter::new(&group);
            let mut queue = step.seeds().to_vec();
            while let Some(id) = queue.pop() {
                step.begin(id);
                step.arrive(id, |s| queue.push(s));
            }
            assert_eq!(step.wait(), BlockerState::Done);
        }
    }

    #[test]
    #[should_panic(expected = "arrived twice")]
    fn test_double_arrival_panics() {
        let group = diamond();
        let step = StepCounter::new(&group);
        step.arrive(SystemId::new(0), |_| {});
        step.arrive(SystemId::new(0), |_| {});
    }

    #[test]
    #[should_panic(expected = "predecessor(s) still running")]
    fn test_early_start_panics() {
        let group = diamond();
        let step = StepCounter::new(&group);
        step.begin(SystemId::new(3));
    }

    #[test]
    fn test_empty_group_is_done_immediately() {
        let group = TaskGroup::build(&[], 0).unwrap();
        let step = StepCounter::new(&group);
        assert_eq!(step.wait(), BlockerState::Done);
    }

    #[test]
    fn test_abort_wakes_waiter() {
        let group = diamond();
        let step = StepCounter::new(&group);
        step.abort();
        assert!(step.is_aborted());
        assert_eq!(step.wait(), BlockerState::Aborted);
    }

    #[test]
    fn test_concurrent_arrivals_release_once() {
        // Many predecessors racing on one successor.
        let fan_in = 8;
        let mut systems: Vec<SystemSignature> = (0..fan_in)
            .map(|i| SystemSignature::new(format!("p{}", i)))
            .collect();
        let mut sink = SystemSignature::new("sink");
        for i in 0..fan_in {
            sink = sink.depends_on(SystemId::new(i));
        }
        systems.push(sink);
        let group = Arc::new(TaskGroup::build(&systems, 0).unwrap());

        for _ in 0..200 {
            let released = AtomicUsize::new(0);
            let step = StepCounter::new(&group);
            thread::scope(|scope| {
                for i in 0..fan_in {
                    let step = &step;
                    let released = &released;
                    scope.spawn(move || {
                        step.arrive(SystemId::new(i), |_| {
                            released.fetch_add(1, Ordering::Relaxed);
                        });
                    });
                }
            });
            assert_eq!(released.load(Ordering::Relaxed), 1);
            assert_eq!(step.remaining(), 1);
        }
    }

    #[test]
    fn test_blocker_across_threads() {
        let blocker = Arc::new(Blocker::new());
        let remote = Arc::clone(&blocker);
        let handle = thread::spawn(move || remote.finish(BlockerState::Done));
        assert_eq!(blocker.wait(), BlockerState::Done);
        handle.join().unwrap();
        blocker.finish(BlockerState::Aborted);
        assert_eq!(blocker.state(), BlockerState::Done, "first outcome wins");
    }
}
