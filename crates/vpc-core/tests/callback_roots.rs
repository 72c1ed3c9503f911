//! Gating de callback roots (ON_SUCCESS): arrancan sólo tras el éxito del
//! padre, exactamente una vez, y nunca sobre un padre fallido.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use vpc_core::{ClientSet, HandlerRegistry, InMemoryDomainPort, InMemoryWorkflowStore, Owner, RootBuilder,
               RootStatus, Scheduler, TaskContext, TaskHandler, TaskOutcome, TaskStatus, TaskType, WorkflowNature,
               WorkflowStore, WorkflowTask};

struct CountingHandler {
    calls: Arc<AtomicUsize>,
}

impl TaskHandler for CountingHandler {
    fn run(&self, _ctx: &mut TaskContext<'_>) -> TaskOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        TaskOutcome::success("ok")
    }
}

/// Termina Successful a la segunda invocación (primera queda RunningWait).
struct TwoRoundHandler;
impl TaskHandler for TwoRoundHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let polls = ctx.metadata().get("polls").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        ctx.metadata_set("polls", json!(polls));
        if polls < 2 {
            TaskOutcome::Wait { message: "image export still running".into() }
        } else {
            TaskOutcome::success("exported")
        }
    }
}

struct FailHandler;
impl TaskHandler for FailHandler {
    fn run(&self, _ctx: &mut TaskContext<'_>) -> TaskOutcome {
        TaskOutcome::Failure { message: "capture failed".into() }
    }
}

// P4: el primer task de un callback root jamás se despacha mientras el padre
// no sea Successful; después se despacha exactamente una vez.
#[test]
fn callback_fires_once_after_parent_success() {
    let cb_calls = Arc::new(AtomicUsize::new(0));
    let cb_calls2 = Arc::new(AtomicUsize::new(0));

    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Backup, "SoftlayerBackupInstance", Box::new(TwoRoundHandler));
    registry.register(TaskType::Create, "IBMImage", Box::new(CountingHandler { calls: cb_calls.clone() }));
    registry.register(TaskType::Create, "IBMInstance", Box::new(CountingHandler { calls: cb_calls2.clone() }));
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    // padre: backup que tarda dos ticks; callbacks: captura de imagen y
    // creación de instancia, independientes entre sí
    let mut parent = RootBuilder::new(Owner::new("u1", "p1"), "migrate_vsi", WorkflowNature::Migrate);
    parent.add_task(WorkflowTask::new(TaskType::Backup, "SoftlayerBackupInstance", json!({})));

    let mut cb1 = RootBuilder::new(Owner::new("u1", "p1"), "capture_image", WorkflowNature::Create);
    cb1.add_task(WorkflowTask::new(TaskType::Create, "IBMImage", json!({})));
    let mut cb2 = RootBuilder::new(Owner::new("u1", "p1"), "create_instance", WorkflowNature::Create);
    cb2.add_task(WorkflowTask::new(TaskType::Create, "IBMInstance", json!({})));
    parent.add_callback(cb1);
    parent.add_callback(cb2);

    let parent_id = scheduler.submit(&mut store, parent).expect("submit");

    // tick 1: el padre queda RunningWait; ningún callback corre
    scheduler.tick(&mut store, &mut domain).expect("tick 1");
    assert_eq!(store.root(parent_id).unwrap().status, RootStatus::Running);
    assert_eq!(cb_calls.load(Ordering::SeqCst), 0);
    assert_eq!(cb_calls2.load(Ordering::SeqCst), 0);

    // tick 2: el padre termina y los callbacks (posteriores en el orden de
    // roots) corren en este mismo tick, una vez cada uno
    scheduler.tick(&mut store, &mut domain).expect("tick 2");
    assert_eq!(store.root(parent_id).unwrap().status, RootStatus::Successful);
    assert_eq!(cb_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cb_calls2.load(Ordering::SeqCst), 1);

    // ticks extra: nada se re-dispara
    scheduler.tick(&mut store, &mut domain).expect("tick 3");
    scheduler.tick(&mut store, &mut domain).expect("tick 4");
    assert_eq!(cb_calls.load(Ordering::SeqCst), 1, "callback must fire exactly once");
    assert_eq!(cb_calls2.load(Ordering::SeqCst), 1);

    let parent = store.root(parent_id).unwrap();
    assert!(parent.callbacks_fired);
    for cb_id in parent.callback_ids {
        assert_eq!(store.root(cb_id).unwrap().status, RootStatus::Successful);
    }
}

// Un padre fallido nunca dispara sus callbacks.
#[test]
fn callback_never_fires_on_failed_parent() {
    let cb_calls = Arc::new(AtomicUsize::new(0));
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Backup, "SoftlayerBackupInstance", Box::new(FailHandler));
    registry.register(TaskType::Create, "IBMImage", Box::new(CountingHandler { calls: cb_calls.clone() }));
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    let mut parent = RootBuilder::new(Owner::new("u1", "p1"), "migrate_vsi", WorkflowNature::Migrate);
    let backup = parent.add_task(WorkflowTask::new(TaskType::Backup, "SoftlayerBackupInstance", json!({})));
    let mut cb = RootBuilder::new(Owner::new("u1", "p1"), "capture_image", WorkflowNature::Create);
    cb.add_task(WorkflowTask::new(TaskType::Create, "IBMImage", json!({})));
    parent.add_callback(cb);

    let parent_id = scheduler.submit(&mut store, parent).expect("submit");
    for _ in 0..4 {
        scheduler.tick(&mut store, &mut domain).expect("tick");
    }

    assert_eq!(store.task(backup).unwrap().status, TaskStatus::Failed);
    assert_eq!(store.root(parent_id).unwrap().status, RootStatus::Failed);
    assert_eq!(cb_calls.load(Ordering::SeqCst), 0, "callback must not fire on a failed parent");
    assert!(!store.root(parent_id).unwrap().callbacks_fired);
}
