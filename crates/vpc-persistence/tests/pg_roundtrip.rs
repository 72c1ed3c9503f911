//! Paridad del backend Postgres con el contrato del store.
//!
//! Requiere un Postgres accesible vía DATABASE_URL; sin esa variable los
//! tests se saltean (mismo criterio que el resto de los tests de
//! integración con DB del workspace).

use serde_json::json;
use vpc_core::{ClientSet, HandlerRegistry, Owner, RootBuilder, Scheduler, TaskContext, TaskHandler, TaskOutcome,
               TaskStatus, TaskType, WorkflowNature, WorkflowStore, WorkflowTask};
use vpc_persistence::{build_pool, PgWorkflowStore, PoolProvider};

fn store_from_env() -> Option<PgWorkflowStore<PoolProvider>> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = build_pool(&url, 1, 4).ok()?;
    Some(PgWorkflowStore::new(PoolProvider { pool }))
}

struct Noop;
impl TaskHandler for Noop {
    fn run(&self, _ctx: &mut TaskContext<'_>) -> TaskOutcome {
        TaskOutcome::success("noop")
    }
}

fn scheduler() -> Scheduler {
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Create, "IBMLoadBalancer", Box::new(Noop));
    registry.register(TaskType::CreateWait, "IBMLoadBalancer", Box::new(Noop));
    Scheduler::new(registry, ClientSet::new())
}

#[test]
fn root_and_task_roundtrip() {
    let Some(mut store) = store_from_env() else {
        eprintln!("DATABASE_URL not set; skipping pg roundtrip test");
        return;
    };
    let scheduler = scheduler();

    // marker aleatorio: cada corrida usa una clave de dedup propia
    let request = json!({"name": "lb-pg", "marker": uuid::Uuid::new_v4().to_string()});
    let mut builder = RootBuilder::new(Owner::new("u-pg", "p-pg"), "create_load_balancer", WorkflowNature::Create)
        .fe_request(&request);
    let t1 = builder.add_task(WorkflowTask::new(TaskType::Create, "IBMLoadBalancer",
                                                json!({"resource_data": {"name": "lb-pg"}})));
    let t2 = builder.add_task(WorkflowTask::new(TaskType::CreateWait, "IBMLoadBalancer", json!({})));
    builder.chain(t1, t2).expect("edge");

    let root_id = scheduler.submit(&mut store, builder).expect("submit to pg store");

    // lecturas frescas
    let loaded = store.root(root_id).expect("load root");
    assert_eq!(loaded.workflow_name, "create_load_balancer");
    assert_eq!(loaded.task_ids.len(), 2);
    let loaded_tasks = store.tasks_of_root(root_id).expect("load tasks");
    assert_eq!(loaded_tasks.len(), 2);
    assert_eq!(loaded_tasks[0].id, t1, "task order follows root declaration");

    // dedup en vuelo: el mismo request se rechaza mientras el root viva
    let mut dup = RootBuilder::new(Owner::new("u-pg", "p-pg"), "create_load_balancer", WorkflowNature::Create)
        .fe_request(&request);
    dup.add_task(WorkflowTask::new(TaskType::Create, "IBMLoadBalancer", json!({})));
    assert!(matches!(scheduler.submit(&mut store, dup),
                     Err(vpc_core::EngineError::DuplicateRequest(existing)) if existing == root_id));

    // transición + update de task
    let mut task = store.task(t1).expect("load task");
    store.record_transition(task.id, TaskStatus::Initiated, TaskStatus::Running, "");
    task.status = TaskStatus::Running;
    store.save_task(&task).expect("save task");
    assert_eq!(store.task(t1).unwrap().status, TaskStatus::Running);
    let transitions = store.transitions_of_task(t1).expect("transitions");
    assert!(!transitions.is_empty());

    // borrado compensatorio: la task sale del root
    store.delete_task(t2).expect("delete task");
    assert!(store.task(t2).is_err());
    assert_eq!(store.root(root_id).unwrap().task_ids, vec![t1]);
}
