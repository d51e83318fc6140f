//! Performance benchmarks for the lock-free queue
//!
//! Compares `LockFreeQueue` against:
//! - crossbeam::queue::SegQueue (segmented lock-free queue, epoch reclamation)
//! - std::sync::Mutex<VecDeque> (the coarse-lock baseline)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam::queue::SegQueue;
use msqueue::{Config, LockFreeQueue};
use std::collections::VecDeque;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

const OPERATIONS_PER_THREAD: usize = 50_000;
const BATCH_SIZES: &[usize] = &[1, 16, 256];
const THREAD_COUNTS: &[usize] = &[1, 2, 4, 8];

/// Minimal common surface so every contender runs the same workload.
trait BenchQueue<T>: Send + Sync {
    fn push(&self, value: T);
    fn pop(&self) -> Option<T>;
}

impl<T: Send> BenchQueue<T> for LockFreeQueue<T> {
    fn push(&self, value: T) {
        self.enqueue(value);
    }

    fn pop(&self) -> Option<T> {
        self.dequeue()
    }
}

impl<T: Send> BenchQueue<T> for SegQueue<T> {
    fn push(&self, value: T) {
        SegQueue::push(self, value);
    }

    fn pop(&self) -> Option<T> {
        SegQueue::pop(self)
    }
}

impl<T: Send> BenchQueue<T> for Mutex<VecDeque<T>> {
    fn push(&self, value: T) {
        self.lock().unwrap().push_back(value);
    }

    fn pop(&self) -> Option<T> {
        self.lock().unwrap().pop_front()
    }
}

type Factory = fn() -> Arc<dyn BenchQueue<usize>>;

fn msqueue() -> Arc<dyn BenchQueue<usize>> {
    Arc::new(LockFreeQueue::new())
}

fn msqueue_no_pool() -> Arc<dyn BenchQueue<usize>> {
    Arc::new(LockFreeQueue::with_config(Config::new().with_pool_capacity(0)))
}

fn crossbeam_seg() -> Arc<dyn BenchQueue<usize>> {
    Arc::new(SegQueue::new())
}

fn mutex_vecdeque() -> Arc<dyn BenchQueue<usize>> {
    Arc::new(Mutex::new(VecDeque::new()))
}

fn contenders() -> [(&'static str, Factory); 4] {
    [
        ("msqueue", msqueue),
        ("msqueue_no_pool", msqueue_no_pool),
        ("crossbeam_seg", crossbeam_seg),
        ("mutex_vecdeque", mutex_vecdeque),
    ]
}

// Single-threaded benchmarks
fn bench_single_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_thread_enqueue_dequeue");

    for &size in BATCH_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        for (name, make) in contenders() {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                let queue = make();
                b.iter(|| {
                    for i in 0..size {
                        queue.push(black_box(i));
                    }
                    for _ in 0..size {
                        black_box(queue.pop());
                    }
                })
            });
        }
    }

    group.finish();
}

fn run_producers_consumers(queue: Arc<dyn BenchQueue<usize>>, threads: usize, per_thread: usize) {
    let barrier = Arc::new(Barrier::new(threads * 2));
    let mut handles = Vec::with_capacity(threads * 2);

    for producer in 0..threads {
        let queue = Arc::clone(&queue);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            for i in 0..per_thread {
                queue.push(black_box(producer * per_thread + i));
            }
        }));
    }

    for _ in 0..threads {
        let queue = Arc::clone(&queue);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            barrier.wait();
            let mut received = 0;
            while received < per_thread {
                match queue.pop() {
                    Some(value) => {
                        black_box(value);
                        received += 1;
                    }
                    None => thread::yield_now(),
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// Multi-threaded benchmarks
fn bench_producers_consumers(c: &mut Criterion) {
    let mut group = c.benchmark_group("producers_consumers");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for &threads in THREAD_COUNTS {
        let per_thread = OPERATIONS_PER_THREAD / threads;
        group.throughput(Throughput::Elements((per_thread * threads) as u64));
        for (name, make) in contenders() {
            group.bench_with_input(BenchmarkId::new(name, threads), &threads, |b, &threads| {
                b.iter(|| run_producers_consumers(make(), threads, per_thread))
            });
        }
    }

    group.finish();
}

// Every thread both enqueues and dequeues, so head and tail are both hot
fn bench_high_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("high_contention");
    group.sample_size(20);

    for &threads in THREAD_COUNTS {
        group.throughput(Throughput::Elements((threads * OPERATIONS_PER_THREAD) as u64));
        for (name, make) in contenders() {
            group.bench_with_input(BenchmarkId::new(name, threads), &threads, |b, &threads| {
                b.iter(|| {
                    let queue = make();
                    let barrier = Arc::new(Barrier::new(threads));
                    let handles: Vec<_> = (0..threads)
                        .map(|_| {
                            let queue = Arc::clone(&queue);
                            let barrier = Arc::clone(&barrier);
                            thread::spawn(move || {
                                barrier.wait();
                                for i in 0..OPERATIONS_PER_THREAD / 2 {
                                    queue.push(i);
                                    black_box(queue.pop());
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                })
            });
        }
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_single_thread,
    bench_producers_consumers,
    bench_high_contention
);
criterion_main!(benches);
