//! Property-based tests for the lock-free queue using proptest
//!
//! Sequential runs are checked against a `VecDeque` model; concurrent runs
//! are checked for loss, duplication and per-producer ordering.

use crate::queue::LockFreeQueue;
use crate::Config;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::vec::Vec;

#[derive(Debug, Clone)]
enum Op {
    Enqueue(i32),
    Dequeue,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<i32>().prop_map(Op::Enqueue),
        2 => Just(Op::Dequeue),
    ]
}

fn config() -> impl Strategy<Value = Config> {
    (1usize..8, 0usize..4).prop_map(|(scan_threshold, pool_capacity)| {
        Config::new()
            .with_scan_threshold(scan_threshold)
            .with_pool_capacity(pool_capacity)
    })
}

proptest! {
    #[test]
    fn test_matches_sequential_model(
        ops in prop::collection::vec(op(), 0..200),
        config in config(),
    ) {
        let queue = LockFreeQueue::with_config(config);
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Enqueue(value) => {
                    queue.enqueue(value);
                    model.push_back(value);
                }
                Op::Dequeue => {
                    prop_assert_eq!(queue.dequeue(), model.pop_front());
                }
            }
            prop_assert_eq!(queue.len(), model.len());
            prop_assert_eq!(queue.is_empty(), model.is_empty());
        }

        let drained = queue.dequeue_batch(usize::MAX);
        prop_assert_eq!(drained, model.into_iter().collect::<Vec<_>>());
        prop_assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_batches_preserve_order(
        batches in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..20), 1..10)
    ) {
        let queue = LockFreeQueue::new();
        let mut expected = Vec::new();
        for batch in &batches {
            prop_assert_eq!(queue.enqueue_batch(batch.iter().copied()), batch.len());
            expected.extend_from_slice(batch);
        }
        prop_assert_eq!(queue.dequeue_batch(expected.len() + 1), expected);
    }

    #[test]
    fn test_reclamation_keeps_up(
        cycles in 1usize..300,
        config in config(),
    ) {
        let queue = LockFreeQueue::with_config(config);
        for i in 0..cycles {
            queue.enqueue(i);
            prop_assert_eq!(queue.dequeue(), Some(i));
        }
        queue.reclaim();

        // Single-threaded, nothing is ever protected during a scan.
        let metrics = crate::metrics::MetricsCollector::metrics(&queue);
        prop_assert_eq!(metrics.nodes_retired, cycles as u64);
        prop_assert_eq!(metrics.pending_reclamation(), 0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_concurrent_no_loss_no_duplication(
        producers in 1usize..5,
        per_producer in 1usize..300,
        consumers in 1usize..4,
        config in config(),
    ) {
        let queue = Arc::new(LockFreeQueue::with_config(config));

        let producer_handles: Vec<_> = (0..producers)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        queue.enqueue((producer, i));
                    }
                })
            })
            .collect();

        let consumer_handles: Vec<_> = (0..consumers)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut received = Vec::new();
                    for _ in 0..per_producer {
                        if let Some(value) = queue.dequeue() {
                            received.push(value);
                        }
                    }
                    received
                })
            })
            .collect();

        for handle in producer_handles {
            handle.join().unwrap();
        }

        let mut received: Vec<(usize, usize)> = Vec::new();
        for handle in consumer_handles {
            let values = handle.join().unwrap();
            // A single consumer always sees one producer's values in order.
            for producer in 0..producers {
                let from_producer: Vec<_> = values.iter().filter(|v| v.0 == producer).collect();
                prop_assert!(from_producer.windows(2).all(|w| w[0].1 < w[1].1));
            }
            received.extend(values);
        }
        received.extend(queue.dequeue_batch(usize::MAX));

        received.sort_unstable();
        let expected: Vec<_> = (0..producers)
            .flat_map(|producer| (0..per_producer).map(move |i| (producer, i)))
            .collect();
        prop_assert_eq!(received, expected);
    }
}
