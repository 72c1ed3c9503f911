//! Reglas de despacho del DAG: fan-out, fan-in y aislamiento de fallos.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use vpc_core::{ClientSet, HandlerRegistry, InMemoryDomainPort, InMemoryWorkflowStore, Owner, RootBuilder,
               RootStatus, Scheduler, TaskContext, TaskHandler, TaskOutcome, TaskStatus, TaskType, WorkflowNature,
               WorkflowStore, WorkflowTask};

/// Handler que termina Successful dejando un result con su resource_type, y
/// anota el orden de despacho en un log compartido.
struct LoggingHandler {
    log: Arc<Mutex<Vec<String>>>,
}

impl TaskHandler for LoggingHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        self.log.lock().unwrap().push(ctx.task.resource_type.clone());
        TaskOutcome::Success { result: Some(json!({"from": ctx.task.resource_type})),
                               resource_id: Some(format!("r-{}", ctx.task.resource_type)),
                               message: "done".into() }
    }
}

/// Handler que espera N invocaciones antes de terminar (simula un recurso
/// remoto que tarda en estar listo).
struct SlowHandler {
    rounds: usize,
    log: Arc<Mutex<Vec<String>>>,
}

impl TaskHandler for SlowHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        self.log.lock().unwrap().push(ctx.task.resource_type.clone());
        let seen = ctx.metadata().get("polls").and_then(|v| v.as_u64()).unwrap_or(0) as usize + 1;
        ctx.metadata_set("polls", json!(seen));
        if seen < self.rounds {
            TaskOutcome::Wait { message: "still provisioning".into() }
        } else {
            TaskOutcome::Success { result: Some(json!({"from": ctx.task.resource_type})),
                                   resource_id: None,
                                   message: "ready".into() }
        }
    }
}

struct FailHandler;
impl TaskHandler for FailHandler {
    fn run(&self, _ctx: &mut TaskContext<'_>) -> TaskOutcome {
        TaskOutcome::Failure { message: "provider reported a definitive error".into() }
    }
}

/// Fan-in que agrega los results de TODOS sus predecesores sin tocar ningún
/// proveedor.
struct AggregateHandler {
    expected_predecessors: usize,
}

impl TaskHandler for AggregateHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let results = ctx.predecessor_results();
        if results.len() != self.expected_predecessors {
            return TaskOutcome::Failure { message: format!("expected {} predecessor results, got {}",
                                                           self.expected_predecessors,
                                                           results.len()) };
        }
        let sources: Vec<&str> = results.iter().filter_map(|r| r["from"].as_str()).collect();
        TaskOutcome::Success { result: Some(json!({"aggregated": sources})),
                               resource_id: None,
                               message: "aggregated".into() }
    }
}

// P1: una task con N predecesores nunca se despacha antes de que los N sean
// Successful, y se despacha apenas el último lo es (mismo tick, sin wake-up
// perdido).
#[test]
fn fan_in_waits_for_all_predecessors() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Sync, "UsageFast", Box::new(LoggingHandler { log: log.clone() }));
    registry.register(TaskType::Sync, "UsageSlow", Box::new(SlowHandler { rounds: 3, log: log.clone() }));
    registry.register(TaskType::Sync, "Recommendations", Box::new(AggregateHandler { expected_predecessors: 2 }));
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    let mut b = RootBuilder::new(Owner::new("u1", "p1"), "usage_sync", WorkflowNature::Sync);
    let fast = b.add_task(WorkflowTask::new(TaskType::Sync, "UsageFast", json!({})));
    let slow = b.add_task(WorkflowTask::new(TaskType::Sync, "UsageSlow", json!({})));
    let fan_in = b.add_task(WorkflowTask::new(TaskType::Sync, "Recommendations", json!({})));
    b.chain(fast, fan_in).expect("edge fast");
    b.chain(slow, fan_in).expect("edge slow");

    let root_id = scheduler.submit(&mut store, b).expect("submit");

    // tick 1: fast termina, slow queda en espera -> fan-in NO se despacha
    scheduler.tick(&mut store, &mut domain).expect("tick 1");
    assert!(!log.lock().unwrap().iter().any(|e| e == "Recommendations"),
            "fan-in must not run while a predecessor is pending");
    let fan_in_task = store.task(fan_in).unwrap();
    assert_eq!(fan_in_task.status, TaskStatus::Initiated);

    // tick 2: slow sigue esperando
    scheduler.tick(&mut store, &mut domain).expect("tick 2");
    assert!(!log.lock().unwrap().iter().any(|e| e == "Recommendations"));

    // tick 3: slow termina y el fan-in corre EN ESTE MISMO tick
    scheduler.tick(&mut store, &mut domain).expect("tick 3");
    let entries = log.lock().unwrap().clone();
    let slow_last = entries.iter().rposition(|e| e == "UsageSlow").unwrap();
    let agg_pos = entries.iter().position(|e| e == "Recommendations").expect("fan-in ran");
    assert!(agg_pos > slow_last, "fan-in runs after its last predecessor");

    assert_eq!(store.root(root_id).unwrap().status, RootStatus::Successful);
}

// P2: un fan-in despachado lee el result de cada predecesor sin re-consultar
// ningún proveedor.
#[test]
fn fan_in_sees_all_predecessor_results() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Sync, "UsageA", Box::new(LoggingHandler { log: log.clone() }));
    registry.register(TaskType::Sync, "UsageB", Box::new(LoggingHandler { log: log.clone() }));
    registry.register(TaskType::Sync, "UsageC", Box::new(LoggingHandler { log: log.clone() }));
    registry.register(TaskType::Sync, "Recommendations", Box::new(AggregateHandler { expected_predecessors: 3 }));
    // ClientSet vacío: si el fan-in intentara hablar con un proveedor fallaría
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    let mut b = RootBuilder::new(Owner::new("u1", "p1"), "usage_sync", WorkflowNature::Sync);
    let a = b.add_task(WorkflowTask::new(TaskType::Sync, "UsageA", json!({})));
    let b2 = b.add_task(WorkflowTask::new(TaskType::Sync, "UsageB", json!({})));
    let c = b.add_task(WorkflowTask::new(TaskType::Sync, "UsageC", json!({})));
    let fan_in = b.add_task(WorkflowTask::new(TaskType::Sync, "Recommendations", json!({})));
    for pred in [a, b2, c] {
        b.chain(pred, fan_in).expect("edge");
    }

    let root_id = scheduler.submit(&mut store, b).expect("submit");
    let status = scheduler.run_root(&mut store, &mut domain, root_id, 5).expect("run");
    assert_eq!(status, RootStatus::Successful);

    let fan_in_task = store.task(fan_in).unwrap();
    let aggregated = fan_in_task.result.unwrap();
    let mut sources: Vec<String> = aggregated["aggregated"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    sources.sort();
    assert_eq!(sources, vec!["UsageA", "UsageB", "UsageC"]);
}

// P3: el fallo de una rama no impide que las ramas hermanas terminen; el
// root queda Failed recién cuando nada más puede progresar.
#[test]
fn failure_is_isolated_to_its_branch() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Create, "Source", Box::new(LoggingHandler { log: log.clone() }));
    registry.register(TaskType::Create, "BadBranch", Box::new(FailHandler));
    registry.register(TaskType::Create, "BadChild", Box::new(LoggingHandler { log: log.clone() }));
    registry.register(TaskType::Create, "GoodSlow", Box::new(SlowHandler { rounds: 2, log: log.clone() }));
    registry.register(TaskType::Create, "GoodChild", Box::new(LoggingHandler { log: log.clone() }));
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    // source -> {bad -> bad_child, good -> good_child}
    let mut b = RootBuilder::new(Owner::new("u1", "p1"), "mixed", WorkflowNature::Create);
    let source = b.add_task(WorkflowTask::new(TaskType::Create, "Source", json!({})));
    let bad = b.add_task(WorkflowTask::new(TaskType::Create, "BadBranch", json!({})));
    let bad_child = b.add_task(WorkflowTask::new(TaskType::Create, "BadChild", json!({})));
    let good = b.add_task(WorkflowTask::new(TaskType::Create, "GoodSlow", json!({})));
    let good_child = b.add_task(WorkflowTask::new(TaskType::Create, "GoodChild", json!({})));
    b.chain(source, bad).expect("edge");
    b.chain(bad, bad_child).expect("edge");
    b.chain(source, good).expect("edge");
    b.chain(good, good_child).expect("edge");

    let root_id = scheduler.submit(&mut store, b).expect("submit");

    // tick 1: source ok, bad falla, good queda esperando -> el root sigue
    // Running porque la rama buena puede progresar
    scheduler.tick(&mut store, &mut domain).expect("tick 1");
    assert_eq!(store.task(bad).unwrap().status, TaskStatus::Failed);
    assert_eq!(store.root(root_id).unwrap().status, RootStatus::Running);

    // tick 2: good termina y good_child corre; recién ahí no queda progreso
    scheduler.tick(&mut store, &mut domain).expect("tick 2");
    assert_eq!(store.task(good_child).unwrap().status, TaskStatus::Successful);
    assert_eq!(store.task(bad_child).unwrap().status, TaskStatus::Initiated,
               "descendants of a failed task are never started");
    assert_eq!(store.root(root_id).unwrap().status, RootStatus::Failed);
}

// El cortocircuito por cuenta inválida no invoca al handler.
#[test]
fn invalid_account_short_circuits_dispatch() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);
    struct CountingHandler;
    impl TaskHandler for CountingHandler {
        fn run(&self, _ctx: &mut TaskContext<'_>) -> TaskOutcome {
            CALLS.fetch_add(1, Ordering::SeqCst);
            TaskOutcome::success("ran")
        }
    }

    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Sync, "IBMInstance", Box::new(CountingHandler));
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();
    // cuenta marcada inválida por un fallo de auth previo
    vpc_core::DomainPort::save(&mut domain,
                               vpc_core::CLOUD_ACCOUNT_KIND,
                               "acc-1",
                               json!({"id": "acc-1", "status": "invalid"}));

    let mut b = RootBuilder::new(Owner::new("u1", "p1"), "sync_instance", WorkflowNature::Sync);
    let t = b.add_task(WorkflowTask::new(TaskType::Sync, "IBMInstance",
                                         json!({"cloud_account_id": "acc-1"})));
    let root_id = scheduler.submit(&mut store, b).expect("submit");
    scheduler.tick(&mut store, &mut domain).expect("tick");

    assert_eq!(CALLS.load(Ordering::SeqCst), 0, "handler must not run for an invalid account");
    let task = store.task(t).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.message.contains("invalid"));
    assert_eq!(store.root(root_id).unwrap().status, RootStatus::Failed);
}
