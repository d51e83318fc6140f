//! Work queue demo
//!
//! A handful of producer threads submit jobs to a shared `LockFreeQueue`
//! while worker threads pull and run them. Shows the queue's metrics once
//! everything has been processed.
//!
//! ```text
//! cargo run --example work_queue
//! ```

use msqueue::metrics::MetricsCollector;
use msqueue::{Config, LockFreeQueue};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Debug)]
enum Job {
    Sum { from: u64, to: u64 },
    Square(u64),
}

impl Job {
    fn run(&self) -> u64 {
        match *self {
            Job::Sum { from, to } => (from..to).sum(),
            Job::Square(n) => n * n,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let queue = Arc::new(LockFreeQueue::with_config(
        Config::new().with_scan_threshold(16).with_pool_capacity(128),
    ));
    let producers_done = Arc::new(AtomicBool::new(false));
    let total = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let producers: Vec<_> = (0..3u64)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..10_000u64 {
                    let job = if i % 2 == 0 {
                        Job::Sum { from: 0, to: i % 100 }
                    } else {
                        Job::Square(producer * 10_000 + i)
                    };
                    queue.enqueue(job);
                }
            })
        })
        .collect();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let producers_done = Arc::clone(&producers_done);
            let total = Arc::clone(&total);
            thread::spawn(move || {
                let mut processed = 0u64;
                loop {
                    let finished = producers_done.load(Ordering::Acquire);
                    match queue.dequeue() {
                        Some(job) => {
                            total.fetch_add(job.run(), Ordering::Relaxed);
                            processed += 1;
                        }
                        None if finished => break,
                        None => thread::yield_now(),
                    }
                }
                processed
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer panicked");
    }
    producers_done.store(true, Ordering::Release);

    let processed: u64 = workers
        .into_iter()
        .map(|worker| worker.join().expect("worker panicked"))
        .sum();
    queue.reclaim();

    let metrics = queue.metrics();
    println!("processed {} jobs in {:?}", processed, started.elapsed());
    println!("result checksum: {}", total.load(Ordering::Relaxed));
    println!(
        "contention: {:.2}%  empty polls: {:.2}%  recycled nodes: {}",
        metrics.contention_rate(),
        metrics.empty_rate(),
        metrics.nodes_recycled
    );
    println!(
        "retired {} nodes, {} still pending reclamation",
        metrics.nodes_retired,
        metrics.pending_reclamation()
    );
}
