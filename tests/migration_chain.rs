//! Cadena de migración classic VSI -> IBM: backup -> wait (ping+sysprep) y
//! callback de captura/creación, con el tope de 100 iteraciones del wait.

use serde_json::json;
use std::time::Duration;

use vpc_core::{ClientSet, HandlerRegistry, InMemoryWorkflowStore, Owner, RetryPolicy, RootStatus, Scheduler,
               TaskStatus, TaskType, WorkflowStore};
use vpc_domain::{kinds, DomainStore};
use vpc_providers::{BackupInstanceWaitHandler, CreateResourceHandler, CreateWaitHandler, IssueCreateHandler,
                    SimulatedCloudClient, MAX_PING_ITERATIONS};
use vpcplus_rust::workflow::{migrate_classic_instance_root, IBM_CONNECTION, SOFTLAYER_CONNECTION};

fn registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Backup,
                      "SoftlayerBackupInstance",
                      Box::new(IssueCreateHandler::new(SOFTLAYER_CONNECTION, "create_backup_instance")));
    registry.register(TaskType::CreateWait,
                      "SoftlayerBackupInstance",
                      Box::new(BackupInstanceWaitHandler::new(SOFTLAYER_CONNECTION)));
    registry.register(TaskType::Create,
                      kinds::IMAGE,
                      Box::new(IssueCreateHandler::new(IBM_CONNECTION, "create_image")));
    registry.register(TaskType::CreateWait,
                      kinds::IMAGE,
                      Box::new(CreateWaitHandler::new(IBM_CONNECTION)));
    registry.register(TaskType::Create,
                      kinds::INSTANCE,
                      Box::new(CreateResourceHandler::new(IBM_CONNECTION, "create_instance")));
    registry
}

fn scheduler(softlayer_polls: u64, ibm_polls: u64) -> Scheduler {
    let policy = RetryPolicy { max_attempts: 3,
                               base_delay: Duration::ZERO,
                               max_delay: Duration::ZERO,
                               jitter: 0.0 };
    let mut clients = ClientSet::new();
    clients.register(SOFTLAYER_CONNECTION, Box::new(SimulatedCloudClient::new(softlayer_polls)), policy.clone());
    clients.register(IBM_CONNECTION, Box::new(SimulatedCloudClient::new(ibm_polls)), policy);
    Scheduler::new(registry(), clients)
}

fn submit_migration(scheduler: &Scheduler, store: &mut InMemoryWorkflowStore) -> uuid::Uuid {
    let builder = migrate_classic_instance_root(Owner::new("u1", "p1"),
                                                "sl-acc",
                                                "ibm-acc",
                                                json!({"id": "vsi-1", "hostname": "web01"}),
                                                json!({"name": "web01-ibm", "profile": {"name": "bx2-2x8"}}))
        .expect("builder");
    scheduler.submit(store, builder).expect("submit")
}

// Camino feliz: el backup se vuelve alcanzable, el padre cierra y el
// callback crea imagen + instancia.
#[test]
fn migration_chain_completes_via_callback() {
    let scheduler = scheduler(2, 1);
    let mut store = InMemoryWorkflowStore::new();
    let mut domain = DomainStore::new();
    let parent_id = submit_migration(&scheduler, &mut store);

    for _ in 0..12 {
        scheduler.tick(&mut store, &mut domain).expect("tick");
    }

    let parent = store.root(parent_id).unwrap();
    assert_eq!(parent.status, RootStatus::Successful);
    let backup_wait = &store.tasks_of_root(parent_id).unwrap()[1];
    assert!(backup_wait.message.contains("sysprep"), "wait half reports ping+sysprep");

    assert_eq!(parent.callback_ids.len(), 1);
    let callback = store.root(parent.callback_ids[0]).unwrap();
    assert_eq!(callback.status, RootStatus::Successful);
    let tasks = store.tasks_of_root(callback.id).unwrap();
    assert_eq!(tasks.len(), 3);
    assert!(tasks.iter().all(|t| t.status == TaskStatus::Successful));
    // la instancia IBM quedó en el inventario local
    assert_eq!(domain.records_of_kind(kinds::INSTANCE).len(), 1);
}

// El backup nunca responde al ping: la task sigue en RUNNING_WAIT tick tras
// tick (el motor no impone timeout) hasta el tope propio del handler.
#[test]
fn unreachable_backup_waits_until_handler_cap() {
    // polls_until_ready enorme: el ping jamás llega dentro del test
    let scheduler = scheduler(1_000_000, 1);
    let mut store = InMemoryWorkflowStore::new();
    let mut domain = DomainStore::new();
    let parent_id = submit_migration(&scheduler, &mut store);

    // muchos ticks antes del tope: sigue esperando, el root sigue Running
    for _ in 0..20 {
        scheduler.tick(&mut store, &mut domain).expect("tick");
    }
    let backup_wait = store.tasks_of_root(parent_id).unwrap()[1].clone();
    assert_eq!(backup_wait.status, TaskStatus::RunningWait);
    assert_eq!(store.root(parent_id).unwrap().status, RootStatus::Running);

    // pasado el tope de iteraciones del handler, falla con mensaje claro y
    // el callback nunca arranca
    for _ in 0..(MAX_PING_ITERATIONS as usize + 5) {
        scheduler.tick(&mut store, &mut domain).expect("tick");
    }
    let backup_wait = store.tasks_of_root(parent_id).unwrap()[1].clone();
    assert_eq!(backup_wait.status, TaskStatus::Failed);
    assert!(backup_wait.message.contains("100 poll iterations"));
    let parent = store.root(parent_id).unwrap();
    assert_eq!(parent.status, RootStatus::Failed);
    let callback = store.root(parent.callback_ids[0]).unwrap();
    assert_eq!(callback.status, RootStatus::Initiated, "callback gated forever on failed parent");
}
