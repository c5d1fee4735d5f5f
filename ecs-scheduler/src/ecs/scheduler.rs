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
//! Step executor
//!
//! Runs every system exactly once per step on the worker pool, starting each
//! one as soon as all of its dependencies have finished rather than in
//! fixed stages.
//!
//! A step goes through `Idle -> Seeding -> Running -> Draining -> Done`:
//! - **Seeding**: counters are reset and every system without dependencies
//!   is submitted.
//! - **Running**: each task runs its system (split into slices by its
//!   strategy), then arrives, submitting the successors it released.
//! - **Draining**: the calling thread blocks until the last task arrives or
//!   a failure aborts the step; in-flight work is then allowed to finish.
//! - **Done**: the caller may read back what the systems wrote.
//!
//! The calling thread must not be a worker of the same pool: it blocks while
//! the step drains.

use crate::ecs::{Entity, SliceData, World};
use crate::error::{ConfigError, StepError, SystemError};
use crate::graph::TaskGroup;
use crate::pool::{Batch, WorkerPool};
use crate::signature::{SignatureList, SystemId, SystemSignature};
use crate::strategy::Slice;
use crate::sync::{BlockerState, StepCounter};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// Lifecycle of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StepPhase {
    /// No step has run yet
    Idle = 0,
    /// Counters are being reset and roots submitted
    Seeding = 1,
    /// Tasks are being dispatched
    Running = 2,
    /// Waiting for the last task
    Draining = 3,
    /// The last step has completed or failed
    Done = 4,
}

impl StepPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => StepPhase::Seeding,
            2 => StepPhase::Running,
            3 => StepPhase::Draining,
            4 => StepPhase::Done,
            _ => StepPhase::Idle,
        }
    }

    /// Whether a step is currently in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(self, StepPhase::Seeding | StepPhase::Running | StepPhase::Draining)
    }
}

impl fmt::Display for StepPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepPhase::Idle => "idle",
            StepPhase::Seeding => "seeding",
            StepPhase::Running => "running",
            StepPhase::Draining => "draining",
            StepPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Why a system stopped
enum Failure {
    Error(SystemError),
    Panic(String),
}

/// Shared state of one in-flight step
struct StepState<'s> {
    world: &'s World,
    counter: StepCounter<'s>,
    failure: Mutex<Option<StepError>>,
    doomed: Mutex<Vec<Entity>>,
}

impl StepState<'_> {
    fn fail(&self, error: StepError) {
        {
            let mut slot = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                warn!(system = %error.system(), %error, "aborting step");
                *slot = Some(error);
            }
        }
        self.counter.abort();
    }
}

/// Aborts the step when a task unwinds outside its system body, so the
/// waiting caller wakes and the batch can re-raise the panic
struct AbortOnUnwind<'a, 'g>(&'a StepCounter<'g>);

impl Drop for AbortOnUnwind<'_, '_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}

/// Dependency-driven parallel executor for a fixed set of systems
pub struct Scheduler {
    signatures: Arc<SignatureList>,
    group: TaskGroup,
    pool: WorkerPool,
    phase: AtomicU8,
    steps: AtomicUsize,
}

impl Scheduler {
    /// Validate the signatures and build the task group
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] raised by [`TaskGroup::build`].
    pub fn new(signatures: Arc<SignatureList>, pool: WorkerPool) -> Result<Self, ConfigError> {
        let group = TaskGroup::build(signatures.systems(), signatures.component_count())?;
        debug!(
            systems = group.len(),
            roots = group.roots().len(),
            "task group built"
        );
        Ok(Scheduler {
            signatures,
            group,
            pool,
            phase: AtomicU8::new(StepPhase::Idle as u8),
            steps: AtomicUsize::new(0),
        })
    }

    /// The validated dependency graph
    pub fn task_group(&self) -> &TaskGroup {
        &self.group
    }

    /// The worker pool systems run on
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Current phase
    pub fn phase(&self) -> StepPhase {
        StepPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Number of steps started so far
    pub fn step_count(&self) -> usize {
        self.steps.load(Ordering::Relaxed)
    }

    /// Run every system once over `world` and block until the step is over
    ///
    /// Entities that systems queued for destruction are appended to
    /// `doomed`, even when the step fails.
    ///
    /// # Errors
    ///
    /// Returns the first system failure. No new system starts after it;
    /// systems and slices already running are allowed to finish.
    ///
    /// # Panics
    ///
    /// Panics if `world` was not built for this scheduler's signature list,
    /// if another step is already in flight on this scheduler, or if a
    /// synchronization invariant is violated. The panic is raised on the
    /// calling thread once the step has drained.
    pub fn execute(&self, world: &World, doomed: &mut Vec<Entity>) -> Result<(), StepError> {
        assert!(
            Arc::ptr_eq(world.signatures(), &self.signatures),
            "world was built for a different signature list"
        );
        let previous = StepPhase::from_u8(self.phase.swap(StepPhase::Seeding as u8, Ordering::AcqRel));
        assert!(!previous.is_in_flight(), "step started while another is {}", previous);
        let step = self.steps.fetch_add(1, Ordering::Relaxed);

        let state = StepState {
            world,
            counter: StepCounter::new(&self.group),
            failure: Mutex::new(None),
            doomed: Mutex::new(Vec::new()),
        };
        debug!(step, seeds = state.counter.seeds().len(), "step seeded");

        self.set_phase(StepPhase::Running);
        let drained = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.scope(|batch| {
                for &id in state.counter.seeds() {
                    self.dispatch(batch, &state, id);
                }
                self.set_phase(StepPhase::Draining);
                state.counter.wait()
            })
        }));
        self.set_phase(StepPhase::Done);
        let outcome = match drained {
            Ok(outcome) => outcome,
            Err(payload) => panic::resume_unwind(payload),
        };

        let StepState {
            counter,
            failure,
            doomed: queued,
            ..
        } = state;
        doomed.append(&mut queued.into_inner().unwrap_or_else(PoisonError::into_inner));

        match failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(error) => Err(error),
            None => {
                assert_eq!(outcome, BlockerState::Done, "step drained without completing");
                assert_eq!(counter.remaining(), 0, "step completed with tasks outstanding");
                debug!(step, "step complete");
                Ok(())
            }
        }
    }

    fn set_phase(&self, phase: StepPhase) {
        self.phase.store(phase as u8, Ordering::Release);
        trace!(%phase, "step phase");
    }

    fn dispatch<'s>(&'s self, batch: &Batch<'_, 's>, state: &'s StepState<'s>, id: SystemId) {
        batch.submit(move |batch| self.run_task(batch, state, id));
    }

    fn run_task<'s>(&'s self, batch: &Batch<'_, 's>, state: &'s StepState<'s>, id: SystemId) {
        let _abort = AbortOnUnwind(&state.counter);
        if state.counter.is_aborted() {
            return;
        }
        state.counter.begin(id);

        let signature = &self.signatures.systems()[id.index()];
        match self.run_system(state, id, signature) {
            Ok(()) => {
                state.counter.arrive(id, |next| self.dispatch(batch, state, next));
            }
            Err(Failure::Error(source)) => state.fail(StepError::SystemFailed {
                system: id,
                name: signature.name().to_string(),
                source,
            }),
            Err(Failure::Panic(message)) => state.fail(StepError::SystemPanicked {
                system: id,
                name: signature.name().to_string(),
                message,
            }),
        }
    }

    /// Partition the system's entities and run every slice, blocking this
    /// task (not the step) until all of them are done.
    fn run_system(&self, state: &StepState<'_>, id: SystemId, signature: &SystemSignature) -> Result<(), Failure> {
        let count = state.world.subscribed_count(id);
        let mut slices = signature
            .parallelism()
            .slices(id, count, self.pool.thread_count());
        debug!(
            system = signature.name(),
            subscribed = count,
            slices = slices.len(),
            "running system"
        );

        if slices.len() == 1 {
            if let Some(slice) = slices.pop() {
                return self.run_slice(state, signature, slice);
            }
        }

        let first_failure: Mutex<Option<Failure>> = Mutex::new(None);
        self.pool.scope(|batch| {
            for slice in slices {
                let first_failure = &first_failure;
                batch.submit(move |_| {
                    if let Err(failure) = self.run_slice(state, signature, slice) {
                        first_failure
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .get_or_insert(failure);
                    }
                });
            }
        });
        match first_failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    fn run_slice(&self, state: &StepState<'_>, signature: &SystemSignature, slice: Slice) -> Result<(), Failure> {
        trace!(
            system = signature.name(),
            slice = slice.index,
            begin = slice.range.start,
            end = slice.range.end,
            "running slice"
        );
        let body = self.signatures.body(slice.system);
        let data = SliceData::new(state.world, signature, slice, &state.doomed);
        match panic::catch_unwind(AssertUnwindSafe(|| body.run(&data))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(Failure::Error(error)),
            Err(payload) => Err(Failure::Panic(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("systems", &self.group.len())
            .field("phase", &self.phase())
            .field("pool", &self.pool)
            .finish()
    }
}
