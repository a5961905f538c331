//! Integration tests for the bounded scheduler.
//!
//! This test validates:
//! 1. Running tasks never exceed the concurrency limit
//! 2. Tasks start strictly in submission order
//! 3. A failing or panicking task does not disturb its siblings
//! 4. Every handle settles once its operation settles
//! 5. Limit 1 degenerates to a sequential queue, a large limit to full parallelism
//! 6. The two-slot, four-task timeline
//! 7. Cancellation, re-entrant submission, and construction errors
//! 8. Slots come back when the runtime discards a running task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prometheus_bounded_scheduler::builders::SchedulerBuilder;
use prometheus_bounded_scheduler::core::{
    settle_all, InMemoryEventSink, Scheduler, SchedulerError, TaskError, Transition,
};
use prometheus_bounded_scheduler::runtime::TokioSpawner;
use prometheus_bounded_scheduler::util::{init_tracing, TaskState};
use rand::Rng;
use tokio::time::{sleep, Instant};

/// Tracks how many operation bodies are active at once.
#[derive(Clone, Default)]
struct Gauge {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

fn elapsed_ms(origin: Instant) -> u128 {
    origin.elapsed().as_millis()
}

fn assert_near(actual: u128, expected: u128) {
    assert!(
        (expected..=expected + 5).contains(&actual),
        "expected ~{expected}ms, got {actual}ms"
    );
}

/// Handles settle before their slot is released, so on a multi-threaded runtime
/// counters can lag the last awaited handle briefly.
async fn wait_until_idle<S>(scheduler: &Scheduler<S>) {
    while scheduler.running() > 0 || scheduler.pending() > 0 {
        tokio::task::yield_now().await;
    }
}

fn exploding() -> std::future::Ready<anyhow::Result<u32>> {
    panic!("exploded while being invoked")
}

#[tokio::test(start_paused = true)]
async fn test_two_slots_four_tasks_timeline() {
    init_tracing();
    let scheduler = Scheduler::new(2).unwrap();
    let origin = Instant::now();
    let starts = Arc::new(Mutex::new(Vec::new()));
    let finishes = Arc::new(Mutex::new(Vec::new()));

    let durations = [100_u64, 100, 50, 10];
    let handles = scheduler.submit_batch(durations.iter().enumerate().map(|(i, &ms)| {
        let starts = Arc::clone(&starts);
        let finishes = Arc::clone(&finishes);
        move || {
            starts.lock().push((i + 1, elapsed_ms(origin)));
            async move {
                sleep(Duration::from_millis(ms)).await;
                finishes.lock().push((i + 1, elapsed_ms(origin)));
                Ok::<_, anyhow::Error>(i + 1)
            }
        }
    }));

    // T1 and T2 start during submission; T3 and T4 wait for slots.
    assert_eq!(scheduler.running(), 2);
    assert_eq!(scheduler.pending(), 2);

    let outcome = settle_all(handles).await;
    assert!(outcome.all_fulfilled());
    assert_eq!(outcome.into_values(), vec![1, 2, 3, 4]);

    let starts = starts.lock().clone();
    let started: Vec<usize> = starts.iter().map(|(id, _)| *id).collect();
    assert_eq!(started, vec![1, 2, 3, 4]);
    assert_near(starts[0].1, 0);
    assert_near(starts[1].1, 0);
    assert_near(starts[2].1, 100);
    assert_near(starts[3].1, 100);

    let finishes = finishes.lock().clone();
    let order: Vec<usize> = finishes.iter().map(|(id, _)| *id).collect();
    let mut first_two = order[..2].to_vec();
    first_two.sort_unstable();
    assert_eq!(first_two, vec![1, 2]);
    assert_eq!(&order[2..], &[4, 3]);
    assert_near(finishes[0].1, 100);
    assert_near(finishes[1].1, 100);
    assert_near(finishes[2].1, 110);
    assert_near(finishes[3].1, 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_running_never_exceeds_limit() {
    const LIMIT: usize = 3;
    let events = Arc::new(InMemoryEventSink::new(1024));
    let scheduler = SchedulerBuilder::new()
        .name("bound")
        .concurrency_limit(LIMIT)
        .event_sink(events.clone())
        .build()
        .unwrap();

    let durations: Vec<u64> = {
        let mut rng = rand::rng();
        (0..40).map(|_| rng.random_range(1..6)).collect()
    };
    let gauge = Gauge::default();
    let invoked = Arc::new(Mutex::new(Vec::new()));

    let handles = scheduler.submit_batch(durations.into_iter().enumerate().map(|(i, ms)| {
        let gauge = gauge.clone();
        let invoked = Arc::clone(&invoked);
        move || {
            invoked.lock().push(i);
            async move {
                gauge.enter();
                sleep(Duration::from_millis(ms)).await;
                gauge.exit();
                Ok::<_, anyhow::Error>(i)
            }
        }
    }));

    let outcome = settle_all(handles).await;
    assert_eq!(outcome.len(), 40);
    assert!(outcome.all_fulfilled());
    assert!(gauge.peak() <= LIMIT, "peak {} exceeded limit", gauge.peak());

    for event in events.events() {
        assert!(event.running <= LIMIT, "event {event:?} exceeded limit");
    }

    // Admission and invocation both follow submission order.
    let started = events.sequences(Transition::Started);
    assert_eq!(started, (0..40).collect::<Vec<u64>>());
    assert_eq!(*invoked.lock(), (0..40).collect::<Vec<usize>>());

    wait_until_idle(&scheduler).await;
    let stats = scheduler.stats();
    assert_eq!(stats.running, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.fulfilled, 40);
}

#[tokio::test(start_paused = true)]
async fn test_limit_one_is_sequential_queue() {
    let scheduler = Scheduler::new(1).unwrap();
    let origin = Instant::now();
    let gauge = Gauge::default();
    let starts = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..5_u32 {
        let gauge = gauge.clone();
        let starts = Arc::clone(&starts);
        handles.push(scheduler.submit(move || async move {
            starts.lock().push((i, elapsed_ms(origin)));
            gauge.enter();
            sleep(Duration::from_millis(10)).await;
            gauge.exit();
            Ok::<_, anyhow::Error>(i)
        }));
    }

    let outcome = settle_all(handles).await;
    assert_eq!(outcome.into_values(), vec![0, 1, 2, 3, 4]);
    assert_eq!(gauge.peak(), 1);

    let starts = starts.lock().clone();
    for (expected, (id, at)) in starts.into_iter().enumerate() {
        assert_eq!(id as usize, expected);
        assert_near(at, 10 * expected as u128);
    }
}

#[tokio::test(start_paused = true)]
async fn test_large_limit_starts_everything_at_once() {
    let events = Arc::new(InMemoryEventSink::new(64));
    let scheduler = SchedulerBuilder::new()
        .concurrency_limit(8)
        .event_sink(events.clone())
        .build()
        .unwrap();
    let gauge = Gauge::default();

    let handles = scheduler.submit_batch((0..5_u32).map(|i| {
        let gauge = gauge.clone();
        move || async move {
            gauge.enter();
            sleep(Duration::from_millis(50)).await;
            gauge.exit();
            Ok::<_, anyhow::Error>(i)
        }
    }));
    assert_eq!(scheduler.running(), 5);
    assert_eq!(scheduler.pending(), 0);

    let outcome = settle_all(handles).await;
    assert!(outcome.all_fulfilled());
    assert_eq!(gauge.peak(), 5);

    let transitions: Vec<Transition> = events
        .events()
        .into_iter()
        .filter(|e| e.transition != Transition::Submitted)
        .map(|e| e.transition)
        .collect();
    assert!(transitions[..5].iter().all(|t| *t == Transition::Started));
    assert!(transitions[5..].iter().all(|t| *t == Transition::Fulfilled));
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let scheduler = Scheduler::new(2).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    let handles = scheduler.submit_batch((0..10_u32).map(|i| {
        let ran = Arc::clone(&ran);
        move || async move {
            ran.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match i % 3 {
                0 => Ok(i),
                1 => Err(anyhow::anyhow!("task {i} failed")),
                _ => panic!("task {i} panicked"),
            }
        }
    }));

    let outcome = settle_all(handles).await;
    assert_eq!(ran.load(Ordering::SeqCst), 10);
    assert_eq!(
        outcome.fulfilled.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
        vec![0, 3, 6, 9]
    );
    assert_eq!(outcome.rejected.len(), 6);
    for (sequence, err) in &outcome.rejected {
        match sequence % 3 {
            1 => assert!(matches!(err, SchedulerError::Task(TaskError::Failed { .. }))),
            _ => assert!(matches!(err, SchedulerError::Task(TaskError::Panicked { .. }))),
        }
        assert_eq!(err.sequence(), Some(*sequence));
    }

    let stats = scheduler.stats();
    assert_eq!(stats.fulfilled, 4);
    assert_eq!(stats.rejected, 6);
    assert_eq!(stats.running, 0);
}

#[tokio::test]
async fn test_synchronous_panic_is_routed_to_handle() {
    let scheduler = Scheduler::new(1).unwrap();

    let bad = scheduler.submit(exploding);
    let good = scheduler.submit(|| async { Ok::<_, anyhow::Error>(7_u32) });

    let err = bad.await.unwrap_err();
    match err {
        SchedulerError::Task(TaskError::Panicked { sequence, message }) => {
            assert_eq!(sequence, 0);
            assert!(message.contains("exploded while being invoked"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(good.await.unwrap(), 7);
    assert_eq!(scheduler.running(), 0);
}

#[tokio::test]
async fn test_every_handle_settles() {
    let scheduler = Scheduler::new(4).unwrap();
    let handles = scheduler.submit_batch((0..200_u64).map(|i| {
        move || async move {
            for _ in 0..(i % 4) {
                tokio::task::yield_now().await;
            }
            Ok::<_, anyhow::Error>(i * i)
        }
    }));

    let outcome = settle_all(handles).await;
    assert_eq!(outcome.fulfilled.len(), 200);
    for (sequence, value) in outcome.fulfilled {
        assert_eq!(value, sequence * sequence);
    }
    let stats = scheduler.stats();
    assert_eq!(stats.submitted, 200);
    assert_eq!(stats.fulfilled, 200);
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_handle_state_transitions() {
    let scheduler = Scheduler::new(1).unwrap();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    let first = scheduler.submit(move || async move {
        release_rx.await?;
        Ok::<_, anyhow::Error>("first")
    });
    let second = scheduler.submit(|| async { Ok::<_, anyhow::Error>("second") });

    assert_eq!(first.state(), TaskState::Running);
    assert_eq!(second.state(), TaskState::Pending);

    release_tx.send(()).unwrap();
    assert_eq!(first.await.unwrap(), "first");
    assert_eq!(second.await.unwrap(), "second");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_pending_task() {
    let scheduler = Scheduler::new(1).unwrap();
    let ran = Arc::new(Mutex::new(Vec::new()));

    let mut handles = scheduler.submit_batch((0..3_u32).map(|i| {
        let ran = Arc::clone(&ran);
        move || async move {
            sleep(Duration::from_millis(20)).await;
            ran.lock().push(i);
            Ok::<_, anyhow::Error>(i)
        }
    }));
    let third = handles.pop().unwrap();
    let second = handles.pop().unwrap();
    let first = handles.pop().unwrap();

    assert!(!first.cancel(), "running tasks cannot be cancelled");
    assert!(second.cancel());
    assert_eq!(second.state(), TaskState::Cancelled);
    assert_eq!(scheduler.running(), 1);
    assert_eq!(scheduler.pending(), 1);

    assert!(matches!(second.await, Err(SchedulerError::Cancelled(1))));
    assert_eq!(first.await.unwrap(), 0);
    assert_eq!(third.await.unwrap(), 2);
    assert_eq!(*ran.lock(), vec![0, 2]);
    assert_eq!(scheduler.stats().cancelled, 1);
}

#[tokio::test]
async fn test_dropped_handle_does_not_cancel() {
    let scheduler = Scheduler::new(1).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&ran);
    drop(scheduler.submit(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, anyhow::Error>(())
    }));
    let marker = scheduler.submit(|| async { Ok::<_, anyhow::Error>(()) });

    marker.await.unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_task_can_submit_and_await_more_work() {
    let scheduler = Scheduler::new(2).unwrap();

    let inner_scheduler = scheduler.clone();
    let outer = scheduler.submit(move || async move {
        let inner = inner_scheduler.submit(|| async { Ok::<_, anyhow::Error>(41_u32) });
        Ok::<_, anyhow::Error>(inner.await? + 1)
    });

    assert_eq!(outer.await.unwrap(), 42);
}

#[tokio::test]
async fn test_submission_during_invocation_is_queued_in_order() {
    let scheduler = Scheduler::new(1).unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));
    let nested = Arc::new(Mutex::new(None));

    let inner_scheduler = scheduler.clone();
    let inner_order = Arc::clone(&order);
    let nested_slot = Arc::clone(&nested);
    let outer_order = Arc::clone(&order);
    let outer = scheduler.submit(move || {
        // Runs inside the admission pass.
        let handle = inner_scheduler.submit(move || async move {
            inner_order.lock().push("nested");
            Ok::<_, anyhow::Error>(())
        });
        *nested_slot.lock() = Some(handle);
        async move {
            outer_order.lock().push("outer");
            Ok::<_, anyhow::Error>(())
        }
    });

    outer.await.unwrap();
    let handle = nested.lock().take().unwrap();
    handle.await.unwrap();
    assert_eq!(*order.lock(), vec!["outer", "nested"]);
}

#[tokio::test]
async fn test_zero_limit_is_configuration_error() {
    let err = Scheduler::new(0).unwrap_err();
    assert!(matches!(err, SchedulerError::Configuration(_)));
}

#[test]
fn test_new_outside_runtime_is_runtime_error() {
    assert!(matches!(Scheduler::new(1), Err(SchedulerError::Runtime(_))));
    // Configuration problems are reported before the runtime lookup.
    assert!(matches!(Scheduler::new(0), Err(SchedulerError::Configuration(_))));
}

#[test]
fn test_runtime_shutdown_releases_slots() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let spawner = TokioSpawner::new(runtime.handle().clone());
    let scheduler = Scheduler::with_spawner(1, spawner).unwrap();

    let first = scheduler.submit(|| async {
        sleep(Duration::from_secs(60)).await;
        Ok::<_, anyhow::Error>(1)
    });
    let second = scheduler.submit(|| async { Ok::<_, anyhow::Error>(2) });
    assert_eq!(scheduler.pending(), 1);

    runtime.shutdown_background();

    assert!(matches!(
        futures::executor::block_on(first),
        Err(SchedulerError::Dropped(0))
    ));
    assert!(futures::executor::block_on(second).is_err());
    assert_eq!(scheduler.running(), 0);
    assert_eq!(scheduler.pending(), 0);
}
