//! Loom model checking for the lock-free queue
//!
//! These tests exhaustively explore thread interleavings (bounded by
//! `LOOM_MAX_PREEMPTIONS`) of the real queue and reclamation code, with
//! scans forced after every retirement so that reclamation races are part of
//! every model.
//!
//! Run with:
//!
//! ```text
//! RUSTFLAGS="--cfg loom" LOOM_MAX_PREEMPTIONS=3 cargo test --profile loom --lib
//! ```

use crate::loom::{model, sync::Arc, thread};
use crate::queue::LockFreeQueue;
use crate::Config;
use std::vec;
use std::vec::Vec;

fn eager_reclaim() -> Config {
    Config::new().with_scan_threshold(1).with_pool_capacity(1)
}

#[test]
fn loom_enqueue_dequeue_fifo() {
    model(|| {
        let queue = Arc::new(LockFreeQueue::with_config(eager_reclaim()));

        let producer = thread::spawn({
            let queue = Arc::clone(&queue);
            move || {
                queue.enqueue(1);
                queue.enqueue(2);
            }
        });

        let mut received = Vec::new();
        for _ in 0..2 {
            if let Some(value) = queue.dequeue() {
                received.push(value);
            }
        }

        producer.join().unwrap();
        received.extend(queue.dequeue_batch(2));
        assert_eq!(received, vec![1, 2]);
        assert_eq!(queue.dequeue(), None);
    });
}

#[test]
fn loom_concurrent_producers() {
    model(|| {
        let queue = Arc::new(LockFreeQueue::with_config(eager_reclaim()));

        let handles: Vec<_> = [10, 20]
            .into_iter()
            .map(|value| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.enqueue(value))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut received = queue.dequeue_batch(3);
        received.sort_unstable();
        assert_eq!(received, vec![10, 20]);
    });
}

#[test]
fn loom_racing_consumers_take_value_once() {
    model(|| {
        let queue = Arc::new(LockFreeQueue::with_config(eager_reclaim()));
        queue.enqueue(7);

        let other = thread::spawn({
            let queue = Arc::clone(&queue);
            move || queue.dequeue()
        });
        let mine = queue.dequeue();
        let theirs = other.join().unwrap();

        match (mine, theirs) {
            (Some(7), None) | (None, Some(7)) => {}
            unexpected => panic!("value lost or duplicated: {:?}", unexpected),
        }
        assert!(queue.is_empty());
    });
}

#[test]
fn loom_dequeue_races_enqueue_and_reclamation() {
    model(|| {
        let queue = Arc::new(LockFreeQueue::with_config(eager_reclaim()));
        queue.enqueue(1);

        let consumer = thread::spawn({
            let queue = Arc::clone(&queue);
            move || {
                let first = queue.dequeue();
                let second = queue.dequeue();
                (first, second)
            }
        });

        // Recycles the node the consumer retires, if the scan allows it.
        queue.enqueue(2);

        let (first, second) = consumer.join().unwrap();
        assert_eq!(first, Some(1));
        let mut rest = queue.dequeue_batch(2);
        if let Some(second) = second {
            rest.insert(0, second);
        }
        assert_eq!(rest, vec![2]);
    });
}
