//! End-to-end tests for building and running startup graphs.
//!
//! Covers ordering across batches, concurrency inside a batch, the critical
//! ready signal, context callbacks, cancellation and failure handling.


use ignite_graph::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use test_utils::{
    Canceller, Disk, ExecutionLog, Failing, Memory, Slot, Step, Storage, Waiter, register_slot,
    slot_id,
};

// ─────────────────────────────────────────────────────────────────────────────
// Ordering
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chain_runs_one_system_per_batch_in_order() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    register_slot(&mut builder, 2, &log)
        .declare_dependency(slot_id(1))
        .unwrap();
    register_slot(&mut builder, 1, &log)
        .declare_dependency(slot_id(0))
        .unwrap();
    register_slot(&mut builder, 0, &log);

    let mut context = builder.build().unwrap();
    assert_eq!(
        context.batches(),
        vec![vec![slot_id(0)], vec![slot_id(1)], vec![slot_id(2)]]
    );

    let report = context.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.batches_executed, 3);
    assert_eq!(report.systems_initialized, 3);
    assert_eq!(
        log.steps(),
        vec![
            Step::Start(slot_id(0)),
            Step::End(slot_id(0)),
            Step::Start(slot_id(1)),
            Step::End(slot_id(1)),
            Step::Start(slot_id(2)),
            Step::End(slot_id(2)),
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn same_batch_systems_run_concurrently() {
    let log = ExecutionLog::new();
    let delay = Duration::from_millis(50);
    let mut builder = GraphBuilder::new();
    builder
        .register(Slot::<0>::new(&log).with_delay(delay))
        .unwrap();
    builder
        .register(Slot::<1>::new(&log).with_delay(delay))
        .unwrap();

    let mut context = builder.build().unwrap();
    assert_eq!(context.batch_count(), 1);
    context.run(&CancellationToken::new()).await.unwrap();

    // Both started before either finished.
    let first_end = log
        .position(&Step::End(slot_id(0)))
        .min(log.position(&Step::End(slot_id(1))))
        .unwrap();
    assert!(log.position(&Step::Start(slot_id(0))).unwrap() < first_end);
    assert!(log.position(&Step::Start(slot_id(1))).unwrap() < first_end);
}

#[tokio::test]
async fn capability_dependency_waits_for_every_provider() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder
        .register(Disk::new(&log, Duration::from_millis(20)))
        .unwrap();
    builder.register(Memory::new(&log, Duration::ZERO)).unwrap();
    register_slot(&mut builder, 0, &log)
        .depends_on_capability::<Storage>()
        .unwrap();

    let mut context = builder.build().unwrap();
    context.run(&CancellationToken::new()).await.unwrap();

    log.assert_ends_before_start(SystemId::of::<Disk>(), slot_id(0));
    log.assert_ends_before_start(SystemId::of::<Memory>(), slot_id(0));
}

#[tokio::test]
async fn removed_capability_lets_dependent_start_early() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register(Disk::new(&log, Duration::ZERO)).unwrap();
    register_slot(&mut builder, 0, &log)
        .depends_on::<Disk>()
        .unwrap()
        .removes_capability::<Storage>()
        .unwrap();

    let context = builder.build().unwrap();
    assert_eq!(context.batch_count(), 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Declared Dependencies
// ─────────────────────────────────────────────────────────────────────────────

struct Cache {
    log: ExecutionLog,
}

impl Initializable for Cache {
    fn initialize<'a>(
        &'a self,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<(), InitError>> {
        Box::pin(async move {
            self.log.record(Step::Start(SystemId::of::<Self>()));
            Ok(())
        })
    }
}

impl DeclareDependencies for Cache {
    fn declared_dependencies(&self) -> Vec<SystemId> {
        vec![slot_id(0), SystemId::capability::<Storage>()]
    }
}

#[tokio::test]
async fn declared_dependencies_are_applied_at_registration() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register_declared(Cache { log: log.clone() }).unwrap();
    register_slot(&mut builder, 0, &log);
    builder.register(Memory::new(&log, Duration::ZERO)).unwrap();

    let mut context = builder.build().unwrap();
    assert_eq!(context.batch_count(), 2);

    context.run(&CancellationToken::new()).await.unwrap();
    log.assert_ends_before_start(slot_id(0), SystemId::of::<Cache>());
    log.assert_ends_before_start(SystemId::of::<Memory>(), SystemId::of::<Cache>());
}

// ─────────────────────────────────────────────────────────────────────────────
// Critical Ready Signal
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn critical_ready_fires_once_after_last_critical_system() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    register_slot(&mut builder, 0, &log).set_critical().unwrap();
    register_slot(&mut builder, 1, &log)
        .declare_dependency(slot_id(0))
        .unwrap()
        .set_critical()
        .unwrap();
    register_slot(&mut builder, 2, &log)
        .declare_dependency(slot_id(1))
        .unwrap();

    let mut context = builder.build().unwrap();
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = Arc::clone(&fired);
        let log = log.clone();
        context.on_critical_ready(move || {
            fired.fetch_add(1, Ordering::SeqCst);
            log.record(Step::Marker("critical-ready"));
        });
    }

    context.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    let marker = log.position(&Step::Marker("critical-ready")).unwrap();
    assert!(log.position(&Step::End(slot_id(1))).unwrap() < marker);
    assert!(marker < log.position(&Step::Start(slot_id(2))).unwrap());
}

#[tokio::test]
async fn critical_ready_handle_wakes_waiting_task() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    register_slot(&mut builder, 0, &log).set_critical().unwrap();
    register_slot(&mut builder, 1, &log)
        .declare_dependency(slot_id(0))
        .unwrap();

    let mut context = builder.build().unwrap();
    let ready = context.critical_ready();
    assert!(!ready.is_ready());
    let waiter = tokio::spawn(ready.clone().wait());

    context.run(&CancellationToken::new()).await.unwrap();

    assert!(waiter.await.unwrap());
    assert!(ready.is_ready());
}

#[tokio::test]
async fn critical_ready_is_not_fired_when_run_fails_first() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register(Failing::new(&log)).unwrap();
    register_slot(&mut builder, 0, &log)
        .depends_on::<Failing>()
        .unwrap()
        .set_critical()
        .unwrap();

    let mut context = builder.build().unwrap();
    let ready = context.critical_ready();

    assert!(context.run(&CancellationToken::new()).await.is_err());
    assert!(!ready.is_ready());
}

// ─────────────────────────────────────────────────────────────────────────────
// Callbacks And Events
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn context_callbacks_observe_every_system() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    for n in 0..3 {
        register_slot(&mut builder, n, &log);
    }

    let mut context = builder.build().unwrap();
    let started = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));
    {
        let started = Arc::clone(&started);
        context.on_system_started(move |_| {
            started.fetch_add(1, Ordering::SeqCst);
        });
        let completed = Arc::clone(&completed);
        context.on_system_completed(move |_| {
            completed.fetch_add(1, Ordering::SeqCst);
        });
    }

    context.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 3);
    assert_eq!(completed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn node_callbacks_registered_before_build_fire_once() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    let marker_log = log.clone();
    register_slot(&mut builder, 0, &log)
        .on_start(move |id| marker_log.record(Step::Marker(id.short_name())));

    let mut context = builder.build().unwrap();
    context.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(log.count(&Step::Marker(slot_id(0).short_name())), 1);
    assert!(
        log.position(&Step::Marker(slot_id(0).short_name())).unwrap()
            < log.position(&Step::Start(slot_id(0))).unwrap()
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Cancellation And Failure
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_stops_at_next_batch_boundary() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register(Canceller).unwrap();
    register_slot(&mut builder, 0, &log);
    register_slot(&mut builder, 1, &log)
        .depends_on::<Canceller>()
        .unwrap();

    let mut context = builder.build().unwrap();
    let err = context.run(&CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, RunError::Cancelled { completed_batches: 1 }));
    assert!(log.ended(slot_id(0)));
    assert!(!log.started(slot_id(1)));
    assert_eq!(context.state(), RunState::Cancelled);
}

#[tokio::test]
async fn system_giving_up_on_cancellation_ends_run_as_cancelled() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register(Waiter::new(&log)).unwrap();
    register_slot(&mut builder, 0, &log)
        .depends_on::<Waiter>()
        .unwrap();

    let mut context = builder.build().unwrap();
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });
    }

    let err = context.run(&cancel).await.unwrap_err();

    assert!(err.is_cancelled(), "unexpected error: {err}");
    assert!(matches!(err, RunError::Cancelled { completed_batches: 0 }));
    assert_eq!(context.state(), RunState::Cancelled);
    assert!(log.started(SystemId::of::<Waiter>()));
    assert!(!log.started(slot_id(0)));
}

#[tokio::test]
async fn failure_without_cancellation_is_not_reported_as_cancelled() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register(Failing::new(&log)).unwrap();

    let mut context = builder.build().unwrap();
    let err = context.run(&CancellationToken::new()).await.unwrap_err();

    assert!(!err.is_cancelled());
    assert_eq!(context.state(), RunState::Failed);
}

#[tokio::test]
async fn failure_skips_later_batches() {
    let log = ExecutionLog::new();
    let mut builder = GraphBuilder::new();
    builder.register(Failing::new(&log)).unwrap();
    register_slot(&mut builder, 0, &log)
        .depends_on::<Failing>()
        .unwrap();

    let mut context = builder.build().unwrap();
    let err = context.run(&CancellationToken::new()).await.unwrap_err();

    match err {
        RunError::SystemFailed { system, source } => {
            assert_eq!(system, SystemId::of::<Failing>());
            assert!(matches!(source, InitError::Failed(msg) if msg == "storage unavailable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!log.started(slot_id(0)));
}

#[tokio::test]
async fn failure_leaves_siblings_running() {
    let log = ExecutionLog::new();
    let delay = Duration::from_millis(30);
    let mut builder = GraphBuilder::new();
    builder.register(Failing::new(&log)).unwrap();
    builder
        .register(Slot::<0>::new(&log).with_delay(delay))
        .unwrap();

    let mut context = builder.build().unwrap();
    assert!(context.run(&CancellationToken::new()).await.is_err());
    assert!(!log.ended(slot_id(0)));

    tokio::time::sleep(delay * 4).await;
    assert!(log.ended(slot_id(0)));
}

#[tokio::test]
async fn empty_graph_completes_immediately() {
    let mut context = GraphBuilder::new().build().unwrap();
    let ready = context.critical_ready();

    let report = context.run(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.batches_executed, 0);
    assert_eq!(report.systems_initialized, 0);
    assert!(ready.is_ready());
}
