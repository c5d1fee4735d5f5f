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
//! Inner parallelism strategies
//!
//! A strategy decides how the entities subscribed to one system are cut into
//! contiguous slices. Each slice becomes one unit of work on the worker pool.
//! Whatever the variant, the produced ranges cover `0..count` exactly, in
//! order, with no gaps and no overlaps, so two slices of the same system
//! never touch the same entity.

use crate::signature::SystemId;
use std::ops::Range;

/// How a system's subscribed entities are split across workers
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Run the whole range on the task's own thread
    #[default]
    Serial,

    /// Split into `jobs` slices whose sizes differ by at most one entity
    SplitEvenly {
        /// Target number of slices
        jobs: usize,
    },

    /// Split evenly into as many slices as the worker pool has threads
    SplitEvenlyPerWorker,

    /// Split into slices of `n` entities; the last one may be shorter
    SplitEveryN {
        /// Slice width
        n: usize,
    },

    /// Run serially while fewer than `threshold` entities are subscribed,
    /// otherwise use `inner`
    SerialBelow {
        /// Minimum subscribed count for `inner` to be used
        threshold: usize,
        /// Strategy used at or above the threshold
        inner: Box<Strategy>,
    },
}

impl Strategy {
    /// Split evenly into `jobs` slices
    pub fn split_evenly(jobs: usize) -> Self {
        Strategy::SplitEvenly { jobs }
    }

    /// Split into slices of `n` entities
    pub fn split_every_n(n: usize) -> Self {
        Strategy::SplitEveryN { n }
    }

    /// Use `inner` only once at least `threshold` entities are subscribed
    pub fn serial_below(threshold: usize, inner: Strategy) -> Self {
        Strategy::SerialBelow {
            threshold,
            inner: Box::new(inner),
        }
    }

    /// Check the strategy parameters
    ///
    /// Returns a description of the first invalid parameter.
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Strategy::SplitEvenly { jobs: 0 } => Err("split_evenly needs at least one job"),
            Strategy::SplitEveryN { n: 0 } => Err("split_every_n needs a slice width of at least one"),
            Strategy::SerialBelow { inner, .. } => inner.validate(),
            _ => Ok(()),
        }
    }

    /// Partition `0..count` into slice ranges
    ///
    /// `workers` is the size of the worker pool, used by
    /// [`Strategy::SplitEvenlyPerWorker`]. At least one range is always
    /// returned; with nothing subscribed it is the empty range `0..0`, so the
    /// system body still runs once per step.
    pub fn partition(&self, count: usize, workers: usize) -> Vec<Range<usize>> {
        if count == 0 {
            return vec![0..0];
        }
        match self {
            Strategy::Serial => vec![0..count],
            Strategy::SplitEvenly { jobs } => split_evenly(count, *jobs),
            Strategy::SplitEvenlyPerWorker => split_evenly(count, workers),
            Strategy::SplitEveryN { n } => split_every_n(count, *n),
            Strategy::SerialBelow { threshold, inner } => {
                if count < *threshold {
                    vec![0..count]
                } else {
                    inner.partition(count, workers)
                }
            }
        }
    }

    /// Build the slice descriptors for one system
    pub fn slices(&self, system: SystemId, count: usize, workers: usize) -> Vec<Slice> {
        self.partition(count, workers)
            .into_iter()
            .enumerate()
            .map(|(index, range)| Slice { system, index, range })
            .collect()
    }
}

/// Even division: every slice gets `count / jobs` entities and the first
/// `count % jobs` slices take one extra. Empty slices are not emitted.
fn split_evenly(count: usize, jobs: usize) -> Vec<Range<usize>> {
    let jobs = jobs.max(1);
    let per_split = count / jobs;
    let remainder = count % jobs;

    let mut ranges = Vec::with_capacity(jobs.min(count));
    let mut begin = 0;
    for split in 0..jobs {
        let len = per_split + usize::from(split < remainder);
        if len == 0 {
            break;
        }
        ranges.push(begin..begin + len);
        begin += len;
    }
    debug_assert_eq!(begin, count);
    ranges
}

/// Fixed-width slices; the last one holds whatever is left.
fn split_every_n(count: usize, n: usize) -> Vec<Range<usize>> {
    let n = n.max(1);
    (0..count)
        .step_by(n)
        .map(|begin| begin..(begin + n).min(count))
        .collect()
}

/// One contiguous slice of a system's subscribed entities for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// System the slice belongs to
    pub system: SystemId,
    /// Position of the slice within the system's partition
    pub index: usize,
    /// Half-open range over the system's subscribed-entity indices
    pub range: Range<usize>,
}

impl Slice {
    /// Number of entities in the slice
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Whether the slice covers no entity
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
