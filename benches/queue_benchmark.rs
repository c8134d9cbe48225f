// Copyright 2026 Spool Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Benchmarks for the ring-buffer queue.
//!
//! Measures:
//! - Single element add latency at several payload sizes
//! - Add/remove cycle cost on a warm queue that wraps in place
//! - Head peek latency

use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use spool::{QueueFile, QueueFileBuilder};
use tempfile::TempDir;

/// Payload sizes to benchmark (bytes)
const PAYLOAD_SIZES: &[usize] = &[64, 256, 1024, 4096];

/// Number of elements written per throughput iteration
const BATCH_SIZE: usize = 1_000;

fn create_queue(temp_dir: &TempDir, zero: bool) -> QueueFile {
    QueueFileBuilder::new(temp_dir.path().join("bench-queue"))
        .zero(zero)
        .build()
        .expect("Failed to create queue")
}

fn generate_payload(size: usize) -> Vec<u8> {
    vec![0xABu8; size]
}

// =============================================================================
// Add Latency
// =============================================================================

/// Benchmark single element add latency. Every add commits with an fsync,
/// so this is dominated by the sync cost.
fn bench_add_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_latency");
    group.sample_size(20);

    for &size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut queue = create_queue(&temp_dir, true);
            let payload = generate_payload(size);

            b.iter(|| {
                queue.add(black_box(&payload)).unwrap();
            });
        });
    }

    group.finish();
}

// =============================================================================
// Steady-State Cycling
// =============================================================================

/// Benchmark an add/remove cycle on a pre-filled queue. The file stays at
/// its grown size and the element positions wrap around in place.
fn bench_add_remove_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_remove_cycle");
    group.sample_size(20);

    for &size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut queue = create_queue(&temp_dir, false);
            let payload = generate_payload(size);
            for _ in 0..16 {
                queue.add(&payload).unwrap();
            }

            b.iter(|| {
                queue.add(black_box(&payload)).unwrap();
                queue.remove().unwrap();
            });
        });
    }

    group.finish();
}

/// Benchmark filling and draining a fresh queue, including file growth.
fn bench_fill_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_drain");
    group.sample_size(10);

    let size = 256;
    let total_bytes = (size * BATCH_SIZE) as u64;
    group.throughput(Throughput::Bytes(total_bytes));
    group.bench_function(BenchmarkId::from_parameter(size), |b| {
        b.iter_batched(
            || {
                let temp_dir = TempDir::new().unwrap();
                let queue = create_queue(&temp_dir, false);
                let payload = generate_payload(size);
                (temp_dir, queue, payload)
            },
            |(temp_dir, mut queue, payload)| {
                for _ in 0..BATCH_SIZE {
                    queue.add(black_box(&payload)).unwrap();
                }
                queue.remove_n(BATCH_SIZE).unwrap();
                drop(temp_dir);
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

// =============================================================================
// Reads
// =============================================================================

/// Benchmark peeking the head element.
fn bench_peek(c: &mut Criterion) {
    let mut group = c.benchmark_group("peek");

    for &size in PAYLOAD_SIZES {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let mut queue = create_queue(&temp_dir, true);
            queue.add(&generate_payload(size)).unwrap();

            b.iter(|| {
                black_box(queue.peek().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_add_latency,
    bench_add_remove_cycle,
    bench_fill_drain,
    bench_peek
);
criterion_main!(benches);
