//! Handlers de creación.
//!
//! Dos formas de la misma operación:
//! - `CreateResourceHandler`: task única resumible (create y luego poll en
//!   la misma task vía RUNNING_WAIT), el patrón del create de load balancer.
//! - `CreateWaitHandler`: la mitad "wait" del par create_X -> create_wait_X,
//!   lee el id remoto del result del predecesor y sólo pollea.
//!
//! El registro de dominio se crea recién cuando el recurso remoto está
//! confirmado listo, nunca antes.

use log::debug;
use serde_json::{json, Value};

use vpc_core::{TaskContext, TaskHandler, TaskOutcome};
use vpc_domain::ResourceRecord;

/// Estados remotos que cuentan como "listo".
fn is_ready_status(status: Option<&str>) -> bool {
    matches!(status, Some("active") | Some("available") | Some("stable") | Some("running"))
}

fn remote_status(body: &Value) -> Option<&str> {
    body.get("provisioning_status")
        .or_else(|| body.get("status"))
        .or_else(|| body.get("lifecycle_state"))
        .and_then(|v| v.as_str())
}

/// Crea el registro de dominio a partir del body remoto confirmado.
fn persist_ready_record(ctx: &mut TaskContext<'_>, body: &Value) -> Result<String, String> {
    let kind = ctx.task.resource_type.clone();
    let cloud_id = ctx.account_id().unwrap_or("unknown").to_string();
    let region = ctx.metadata()
                    .get("region")
                    .and_then(|v| v.as_str())
                    .unwrap_or("us-south")
                    .to_string();
    let record = ResourceRecord::from_remote_json(&kind, &cloud_id, &region, body).map_err(|e| e.to_string())?;
    let local_id = record.id.clone();
    ctx.save_record(&kind, &local_id, record.to_value());
    Ok(local_id)
}

/// Task única resumible: emite el create una vez, luego pollea por id.
pub struct CreateResourceHandler {
    /// Nombre de la conexión cloud a usar.
    pub connection: String,
    /// Operación remota de creación (p. ej. "create_load_balancer").
    pub operation: String,
}

impl CreateResourceHandler {
    pub fn new(connection: impl Into<String>, operation: impl Into<String>) -> Self {
        Self { connection: connection.into(), operation: operation.into() }
    }
}

impl TaskHandler for CreateResourceHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider(&self.connection) {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: format!("missing connection {}", self.connection) },
        };
        let resource_data = match ctx.resource_data().cloned() {
            Some(d) => d,
            None => return TaskOutcome::Failure { message: "task_metadata.resource_data missing".into() },
        };

        // reanudación: con id remoto en metadata sólo se pollea
        let remote_id = ctx.metadata().get("remote_id").and_then(|v| v.as_str()).map(str::to_string);
        let body = match remote_id {
            Some(id) => match provider.get_by_id(&ctx.task.resource_type.clone(), &id) {
                Ok(b) => b,
                Err(e) if e.is_auth_invalid() => return fail_auth(ctx, e),
                Err(e) => return TaskOutcome::Failure { message: e.provider_message().to_string() },
            },
            None => match provider.call(&self.operation, &resource_data) {
                Ok(b) => {
                    if let Some(id) = b.get("id").cloned() {
                        ctx.metadata_set("remote_id", id);
                    }
                    b
                }
                Err(e) if e.is_auth_invalid() => return fail_auth(ctx, e),
                Err(e) => return TaskOutcome::Failure { message: e.provider_message().to_string() },
            },
        };

        if is_ready_status(remote_status(&body)) {
            let resource_id = body.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            match persist_ready_record(ctx, &body) {
                Ok(_) => TaskOutcome::Success { result: Some(body),
                                                resource_id: Some(resource_id),
                                                message: format!("{} active", ctx.task.resource_type) },
                // remoto creado pero el enlace local falló: el próximo
                // discovery lo reconcilia
                Err(e) => TaskOutcome::Failure {
                    message: format!("remote resource {resource_id} created but local record failed ({e}); \
                                      next discovery sync will reconcile"),
                },
            }
        } else {
            debug!("{} {} still provisioning", ctx.task.resource_type, ctx.task.id);
            TaskOutcome::Wait { message: format!("{} provisioning", ctx.task.resource_type) }
        }
    }
}

/// Mitad "create" del par create_X -> create_wait_X: emite el create y
/// termina Successful apenas el proveedor ACEPTA la orden (el recurso puede
/// seguir aprovisionándose). El registro de dominio lo crea la mitad wait al
/// confirmarlo listo.
pub struct IssueCreateHandler {
    pub connection: String,
    pub operation: String,
}

impl IssueCreateHandler {
    pub fn new(connection: impl Into<String>, operation: impl Into<String>) -> Self {
        Self { connection: connection.into(), operation: operation.into() }
    }
}

impl TaskHandler for IssueCreateHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider(&self.connection) {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: format!("missing connection {}", self.connection) },
        };
        let resource_data = match ctx.resource_data().cloned() {
            Some(d) => d,
            None => return TaskOutcome::Failure { message: "task_metadata.resource_data missing".into() },
        };
        // reanudación defensiva: si un intento previo ya emitió el create,
        // no duplicar la orden remota
        if let Some(id) = ctx.metadata().get("remote_id").and_then(|v| v.as_str()) {
            return TaskOutcome::Success { result: Some(json!({"id": id})),
                                          resource_id: Some(id.to_string()),
                                          message: format!("{} create already issued", ctx.task.resource_type) };
        }
        match provider.call(&self.operation, &resource_data) {
            Ok(body) => {
                if let Some(id) = body.get("id").cloned() {
                    ctx.metadata_set("remote_id", id);
                }
                let resource_id = body.get("id").and_then(|v| v.as_str()).map(str::to_string);
                TaskOutcome::Success { result: Some(body),
                                       resource_id,
                                       message: format!("{} create accepted", ctx.task.resource_type) }
            }
            Err(e) if e.is_auth_invalid() => fail_auth(ctx, e),
            Err(e) => TaskOutcome::Failure { message: e.provider_message().to_string() },
        }
    }
}

/// Mitad "wait" del par create_X -> create_wait_X: el predecesor dejó el id
/// remoto en su result, acá sólo se pollea hasta verlo listo.
pub struct CreateWaitHandler {
    pub connection: String,
}

impl CreateWaitHandler {
    pub fn new(connection: impl Into<String>) -> Self {
        Self { connection: connection.into() }
    }
}

impl TaskHandler for CreateWaitHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider(&self.connection) {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: format!("missing connection {}", self.connection) },
        };
        // id remoto: de la propia metadata (re-invocación) o del result del
        // predecesor create
        let remote_id = ctx.metadata()
                           .get("remote_id")
                           .and_then(|v| v.as_str())
                           .map(str::to_string)
                           .or_else(|| {
                               ctx.predecessor_results()
                                  .iter()
                                  .find_map(|r| r.get("id").and_then(|v| v.as_str()).map(str::to_string))
                           });
        let remote_id = match remote_id {
            Some(id) => id,
            None => return TaskOutcome::Failure {
                message: "no remote id available from metadata or predecessor results".into(),
            },
        };
        ctx.metadata_set("remote_id", json!(remote_id.clone()));

        match provider.get_by_id(&ctx.task.resource_type.clone(), &remote_id) {
            Ok(body) if is_ready_status(remote_status(&body)) => match persist_ready_record(ctx, &body) {
                Ok(_) => TaskOutcome::Success { result: Some(body),
                                                resource_id: Some(remote_id),
                                                message: format!("{} ready", ctx.task.resource_type) },
                Err(e) => TaskOutcome::Failure {
                    message: format!("remote resource {remote_id} ready but local record failed ({e}); \
                                      next discovery sync will reconcile"),
                },
            },
            Ok(_) => TaskOutcome::Wait { message: format!("{} not ready yet", ctx.task.resource_type) },
            Err(e) if e.is_auth_invalid() => fail_auth(ctx, e),
            Err(e) => TaskOutcome::Failure { message: e.provider_message().to_string() },
        }
    }
}

/// Fallo por credenciales: la task falla y la cuenta queda inválida.
pub(crate) fn fail_auth(ctx: &mut TaskContext<'_>, error: vpc_core::ProviderError) -> TaskOutcome {
    if let Some(account) = ctx.account_id().map(str::to_string) {
        ctx.invalidate_account(&account);
    }
    TaskOutcome::Failure { message: error.provider_message().to_string() }
}
