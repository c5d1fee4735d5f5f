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
//! Partition properties of every inner parallelism strategy
//!
//! Ranges must tile `0..count` in order with no gaps or overlaps, and the
//! observed slices at runtime must match the computed partition.

use ecs_scheduler::{Context, PoolConfig, SignatureList, Strategy, SystemId, SystemSignature};
use std::ops::Range;
use std::sync::{Arc, Mutex};

fn strategies() -> Vec<Strategy> {
    vec![
        Strategy::Serial,
        Strategy::split_evenly(1),
        Strategy::split_evenly(3),
        Strategy::split_evenly(8),
        Strategy::split_evenly(64),
        Strategy::SplitEvenlyPerWorker,
        Strategy::split_every_n(1),
        Strategy::split_every_n(5),
        Strategy::split_every_n(128),
        Strategy::serial_below(50, Strategy::split_evenly(4)),
    ]
}

fn assert_tiles(ranges: &[Range<usize>], count: usize) {
    assert!(!ranges.is_empty());
    if count == 0 {
        assert_eq!(ranges, &[0..0]);
        return;
    }
    assert_eq!(ranges[0].start, 0);
    assert_eq!(ranges[ranges.len() - 1].end, count);
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
    }
    assert!(ranges.iter().all(|r| !r.is_empty()));
}

#[test]
fn test_every_strategy_tiles_the_range() {
    for strategy in strategies() {
        for count in 0..300 {
            for workers in [1, 2, 7, 16] {
                let ranges = strategy.partition(count, workers);
                assert_tiles(&ranges, count);
            }
        }
    }
}

#[test]
fn test_split_evenly_sizes() {
    for jobs in 1..20 {
        for count in 1..200 {
            let ranges = Strategy::split_evenly(jobs).partition(count, 1);
            assert_eq!(ranges.len(), jobs.min(count));
            let lens: Vec<usize> = ranges.iter().map(|r| r.len()).collect();
            let max = *lens.iter().max().unwrap();
            let min = *lens.iter().min().unwrap();
            assert!(max - min <= 1);
            // Larger slices come first.
            assert!(lens.windows(2).all(|w| w[0] >= w[1]));
        }
    }
}

#[test]
fn test_split_every_n_sizes() {
    let ranges = Strategy::split_every_n(64).partition(130, 4);
    assert_eq!(ranges, vec![0..64, 64..128, 128..130]);

    let ranges = Strategy::split_every_n(10).partition(100, 4);
    assert_eq!(ranges.len(), 10);
    assert!(ranges.iter().all(|r| r.len() == 10));
}

#[test]
fn test_per_worker_uses_pool_size() {
    let ranges = Strategy::SplitEvenlyPerWorker.partition(1000, 8);
    assert_eq!(ranges.len(), 8);
    assert!(ranges.iter().all(|r| r.len() == 125));
}

#[test]
fn test_serial_below_threshold() {
    let strategy = Strategy::serial_below(100, Strategy::split_every_n(10));
    assert_eq!(strategy.partition(99, 4), vec![0..99]);
    assert_eq!(strategy.partition(100, 4).len(), 10);
}

#[test]
fn test_runtime_slices_match_partition() {
    #[derive(Debug, Clone, Copy)]
    struct Item;

    let threads = 3;
    let count = 257;
    for strategy in strategies() {
        let seen: Arc<Mutex<Vec<(usize, Range<usize>, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let mut list = SignatureList::new();
        let item = list.component::<Item>("item");
        let recorder = Arc::clone(&seen);
        let system: SystemId = list.system(
            SystemSignature::new("record").read(item).strategy(strategy.clone()),
            move |data| {
                recorder
                    .lock()
                    .unwrap()
                    .push((data.slice_index(), data.range(), data.entities().len()));
                Ok(())
            },
        );
        let mut context = Context::new(list, PoolConfig::new(threads)).unwrap();
        context
            .step(|proxy| {
                for _ in 0..count {
                    let e = proxy.create_entity();
                    proxy.add_component(item, e, Item).unwrap();
                }
            })
            .unwrap();
        seen.lock().unwrap().clear();
        context.step(|_| ()).unwrap();
        assert_eq!(context.world().subscribed_count(system), count);

        let mut observed = seen.lock().unwrap().clone();
        observed.sort_by_key(|(index, ..)| *index);
        let expected = strategy.partition(count, threads);
        assert_eq!(observed.len(), expected.len(), "{:?}", strategy);
        for ((index, range, len), want) in observed.into_iter().zip(expected) {
            assert_eq!(range, want, "{:?} slice {}", strategy, index);
            assert_eq!(len, want.len());
        }
    }
}
