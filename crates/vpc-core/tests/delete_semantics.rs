//! Semántica de borrado: 404 del proveedor = éxito, y el registro local se
//! elimina de inmediato (gana sobre cualquier sync posterior).

use serde_json::{json, Value};
use vpc_core::{ClientSet, CloudClient, HandlerRegistry, InMemoryDomainPort, InMemoryWorkflowStore, Owner,
               ProviderError, RootBuilder, RootStatus, RetryPolicy, Scheduler, TaskContext, TaskHandler,
               TaskOutcome, TaskStatus, TaskType, WorkflowNature, WorkflowStore, WorkflowTask};

/// Proveedor que responde 404 a todo (el recurso ya no existe).
struct GoneClient;
impl CloudClient for GoneClient {
    fn call(&self, _operation: &str, _params: &Value) -> Result<Value, ProviderError> {
        Err(ProviderError::NotFound("instance not found".into()))
    }
    fn get_by_id(&self, _kind: &str, id: &str) -> Result<Value, ProviderError> {
        Err(ProviderError::NotFound(format!("{id} not found")))
    }
}

/// Proveedor que siempre rechaza credenciales.
struct ExpiredCredsClient;
impl CloudClient for ExpiredCredsClient {
    fn call(&self, _operation: &str, _params: &Value) -> Result<Value, ProviderError> {
        Err(ProviderError::AuthInvalid("api key expired".into()))
    }
    fn get_by_id(&self, _kind: &str, _id: &str) -> Result<Value, ProviderError> {
        Err(ProviderError::AuthInvalid("api key expired".into()))
    }
}

/// Handler de borrado genérico: chequea existencia remota; un 404 es
/// Successful (el recurso ya no está) y borra el registro local.
struct DeleteHandler;
impl TaskHandler for DeleteHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider("ibm-cloud") {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: "missing ibm-cloud connection".into() },
        };
        let kind = ctx.task.resource_type.clone();
        let local_id = ctx.metadata().get("local_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let resource_id = ctx.metadata().get("resource_id").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        match provider.get_by_id(&kind, &resource_id) {
            Err(e) if e.is_not_found() => {
                // el recurso remoto ya no existe: borrar el registro local
                ctx.delete_record(&kind, &local_id);
                TaskOutcome::Success { result: None,
                                       resource_id: Some(resource_id),
                                       message: "resource already gone; local record removed".into() }
            }
            Err(e) if e.is_auth_invalid() => {
                if let Some(account) = ctx.account_id().map(str::to_string) {
                    ctx.invalidate_account(&account);
                }
                TaskOutcome::Failure { message: e.provider_message().to_string() }
            }
            Err(e) => TaskOutcome::Failure { message: e.provider_message().to_string() },
            Ok(_) => match provider.call("delete", ctx.metadata()) {
                Ok(_) => TaskOutcome::Wait { message: "delete issued; waiting for 404".into() },
                Err(e) if e.is_not_found() => {
                    ctx.delete_record(&kind, &local_id);
                    TaskOutcome::Success { result: None,
                                           resource_id: Some(resource_id),
                                           message: "deleted".into() }
                }
                Err(e) => TaskOutcome::Failure { message: e.provider_message().to_string() },
            },
        }
    }
}

// P6: una task de borrado que recibe 404 en su chequeo de existencia pasa a
// Successful (no Failed) y elimina el row local.
#[test]
fn delete_treats_not_found_as_success() {
    let mut clients = ClientSet::new();
    clients.register("ibm-cloud", Box::new(GoneClient), RetryPolicy::immediate(2));
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Delete, "IBMInstance", Box::new(DeleteHandler));
    let scheduler = Scheduler::new(registry, clients);

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();
    vpc_core::DomainPort::save(&mut domain, "IBMInstance", "local-1",
                               json!({"resource_id": "r006-i-1", "name": "vm1"}));

    let mut b = RootBuilder::new(Owner::new("u1", "p1"), "delete_instance", WorkflowNature::Delete);
    let t = b.add_task(WorkflowTask::new(TaskType::Delete, "IBMInstance",
                                         json!({"local_id": "local-1", "resource_id": "r006-i-1"})));
    let root_id = scheduler.submit(&mut store, b).expect("submit");
    scheduler.tick(&mut store, &mut domain).expect("tick");

    let task = store.task(t).unwrap();
    assert_eq!(task.status, TaskStatus::Successful, "404 on delete must be success");
    assert!(task.message.contains("gone"));
    assert_eq!(store.root(root_id).unwrap().status, RootStatus::Successful);
    assert!(vpc_core::DomainPort::load(&domain, "IBMInstance", "local-1").is_none(),
            "local record must be removed immediately");
}

// Un AuthInvalid del proveedor falla la task e invalida la cuenta, que corta
// las tasks posteriores de esa cuenta sin invocar handlers.
#[test]
fn auth_invalid_fails_task_and_flips_account() {
    let mut clients = ClientSet::new();
    clients.register("ibm-cloud", Box::new(ExpiredCredsClient), RetryPolicy::immediate(2));
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Delete, "IBMInstance", Box::new(DeleteHandler));
    let scheduler = Scheduler::new(registry, clients);

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    // primera task: falla por credenciales y marca la cuenta inválida
    let mut b1 = RootBuilder::new(Owner::new("u1", "p1"), "delete_instance", WorkflowNature::Delete);
    let t1 = b1.add_task(WorkflowTask::new(TaskType::Delete, "IBMInstance",
                                           json!({"local_id": "l1", "resource_id": "r1",
                                                  "cloud_account_id": "acc-9"})));
    scheduler.submit(&mut store, b1).expect("submit 1");
    scheduler.tick(&mut store, &mut domain).expect("tick 1");

    let task1 = store.task(t1).unwrap();
    assert_eq!(task1.status, TaskStatus::Failed);
    assert_eq!(task1.message, "api key expired", "provider message preserved verbatim");
    let account = vpc_core::DomainPort::load(&domain, vpc_core::CLOUD_ACCOUNT_KIND, "acc-9").expect("account row");
    assert_eq!(account["status"], "invalid");

    // segunda task de la misma cuenta: cortocircuito sin tocar al proveedor
    let mut b2 = RootBuilder::new(Owner::new("u1", "p1"), "delete_instance_2", WorkflowNature::Delete);
    let t2 = b2.add_task(WorkflowTask::new(TaskType::Delete, "IBMInstance",
                                           json!({"local_id": "l2", "resource_id": "r2",
                                                  "cloud_account_id": "acc-9"})));
    scheduler.submit(&mut store, b2).expect("submit 2");
    scheduler.tick(&mut store, &mut domain).expect("tick 2");
    let task2 = store.task(t2).unwrap();
    assert_eq!(task2.status, TaskStatus::Failed);
    assert!(task2.message.contains("short-circuited"));
}
