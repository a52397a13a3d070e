//! Request queue behaviour: concurrency bound, FIFO start order, isolation of
//! failures.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use imagegen_client::orchestration::{QueueError, RequestQueue};
use tokio::sync::oneshot;

#[tokio::test(start_paused = true)]
async fn in_flight_never_exceeds_max() {
    for max in 1..=4 {
        let queue = RequestQueue::new(max);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut results = Vec::new();
        for i in 0..12usize {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            results.push(queue.submit(move || async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5 + (i as u64 % 3))).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, String>(i)
            }));
        }

        for (i, result) in results.into_iter().enumerate() {
            assert_eq!(result.await.unwrap(), i);
        }
        assert_eq!(peak.load(Ordering::SeqCst), max, "max_concurrent = {}", max);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn bound_holds_on_multi_thread_runtime() {
    let queue = RequestQueue::new(3);
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    // Submit from several tasks at once so dispatch calls overlap.
    let mut submitters = Vec::new();
    for _ in 0..8 {
        let queue = queue.clone();
        let in_flight = in_flight.clone();
        let peak = peak.clone();
        submitters.push(tokio::spawn(async move {
            let mut pending = Vec::new();
            for _ in 0..10 {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                pending.push(queue.submit(move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }));
            }
            for p in pending {
                p.await.unwrap();
            }
        }));
    }
    for s in submitters {
        s.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_slot_starts_in_submission_order() {
    let queue = RequestQueue::new(1);
    let started = Arc::new(Mutex::new(Vec::new()));

    let mut results = Vec::new();
    for name in ["o1", "o2", "o3"] {
        let started = started.clone();
        results.push(queue.submit(move || async move {
            started.lock().unwrap().push(name);
            tokio::task::yield_now().await;
            Ok::<_, String>(name)
        }));
    }
    for result in results {
        result.await.unwrap();
    }

    assert_eq!(*started.lock().unwrap(), vec!["o1", "o2", "o3"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn operations_are_invoked_in_submission_order_on_multi_thread_runtime() {
    let queue = RequestQueue::new(4);
    let invoked = Arc::new(Mutex::new(Vec::new()));

    let mut results = Vec::new();
    for i in 0..200usize {
        let invoked = invoked.clone();
        results.push(queue.submit(move || {
            invoked.lock().unwrap().push(i);
            async move {
                tokio::task::yield_now().await;
                Ok::<_, String>(i)
            }
        }));
    }
    for result in results {
        result.await.unwrap();
    }

    let invoked = invoked.lock().unwrap();
    assert_eq!(*invoked, (0..200).collect::<Vec<_>>());
}

#[tokio::test]
async fn failure_does_not_block_queued_work() {
    let queue = RequestQueue::new(2);
    let (gate_tx, gate_rx) = oneshot::channel::<()>();

    let failing = queue.submit(|| async { Err::<&str, _>("upstream 500".to_string()) });
    let slow = queue.submit(move || async move {
        let _ = gate_rx.await;
        Ok::<_, String>("slow")
    });
    let third = queue.submit(|| async { Ok::<_, String>("third") });

    assert!(matches!(failing.await, Err(QueueError::Operation(ref e)) if e == "upstream 500"));
    // `slow` still holds its slot, so `third` can only finish through the
    // slot the failed operation released.
    assert_eq!(third.await.unwrap(), "third");
    assert_eq!(queue.running(), 1);

    gate_tx.send(()).unwrap();
    assert_eq!(slow.await.unwrap(), "slow");
}

#[tokio::test]
async fn admission_happens_at_submit() {
    let queue = RequestQueue::new(1);
    let ran = Arc::new(AtomicUsize::new(0));

    let counter = ran.clone();
    // The returned future is dropped without being awaited.
    drop(queue.submit(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, String>(())
    }));

    let counter = ran.clone();
    queue
        .submit(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        })
        .await
        .unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn queue_survives_many_failures() {
    let queue = RequestQueue::new(2);
    let mut failures = Vec::new();
    for i in 0..20 {
        failures.push(queue.submit(move || async move { Err::<(), _>(format!("fail {}", i)) }));
    }
    for f in failures {
        assert!(f.await.is_err());
    }
    assert_eq!(queue.submit(|| async { Ok::<_, String>(1) }).await.unwrap(), 1);
}
