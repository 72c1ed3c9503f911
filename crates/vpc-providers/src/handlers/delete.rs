//! Handler de borrado genérico.
//!
//! Regla especial de las tasks con sabor a borrado: un 404 del proveedor es
//! ÉXITO (el recurso ya no existe) y el registro local se elimina en el
//! momento, sin esperar al próximo sync de reconciliación.

use serde_json::json;

use vpc_core::{TaskContext, TaskHandler, TaskOutcome};

use super::create::fail_auth;

pub struct DeleteResourceHandler {
    pub connection: String,
    /// Operación remota de borrado (p. ej. "delete_load_balancer").
    pub operation: String,
}

impl DeleteResourceHandler {
    pub fn new(connection: impl Into<String>, operation: impl Into<String>) -> Self {
        Self { connection: connection.into(), operation: operation.into() }
    }
}

impl TaskHandler for DeleteResourceHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider(&self.connection) {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: format!("missing connection {}", self.connection) },
        };
        let kind = ctx.task.resource_type.clone();
        let resource_id = match ctx.metadata().get("resource_id").and_then(|v| v.as_str()) {
            Some(id) => id.to_string(),
            None => return TaskOutcome::Failure { message: "task_metadata.resource_id missing".into() },
        };
        // registro local, si existe (puede haber sido borrado por un sync)
        let local_id = ctx.find_record_by_resource_id(&kind, &resource_id).map(|(id, _)| id);

        // chequeo de existencia idempotente antes de emitir el delete
        match provider.get_by_id(&kind, &resource_id) {
            Err(e) if e.is_not_found() => {
                if let Some(local_id) = local_id {
                    ctx.delete_record(&kind, &local_id);
                }
                return TaskOutcome::Success { result: None,
                                              resource_id: Some(resource_id),
                                              message: format!("{kind} already gone; local record removed") };
            }
            Err(e) if e.is_auth_invalid() => return fail_auth(ctx, e),
            Err(e) => return TaskOutcome::Failure { message: e.provider_message().to_string() },
            Ok(_) => {}
        }

        match provider.call(&self.operation, &json!({"id": resource_id})) {
            Ok(_) => {
                // delete emitido: la task re-pollea hasta ver el 404
                ctx.metadata_set("delete_issued", json!(true));
                TaskOutcome::Wait { message: format!("{kind} delete issued; polling for 404") }
            }
            Err(e) if e.is_not_found() => {
                if let Some(local_id) = local_id {
                    ctx.delete_record(&kind, &local_id);
                }
                TaskOutcome::Success { result: None,
                                       resource_id: Some(resource_id),
                                       message: format!("{kind} deleted") }
            }
            Err(e) if e.is_auth_invalid() => fail_auth(ctx, e),
            Err(e) => TaskOutcome::Failure { message: e.provider_message().to_string() },
        }
    }
}
