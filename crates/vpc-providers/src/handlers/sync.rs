//! Handlers de sync/discovery: reconcilian el inventario local contra el
//! estado remoto real.

use log::debug;
use serde_json::{json, Value};

use vpc_core::{TaskContext, TaskHandler, TaskOutcome};
use vpc_domain::{payload_checksum, ResourceRecord};

use super::create::fail_auth;

/// Sync puntual de un recurso ya enlazado (`resource_id` conocido).
/// Un 404 remoto elimina el registro local: nunca queda un registro
/// apuntando a un recurso que no existe.
pub struct SyncResourceHandler {
    pub connection: String,
}

impl SyncResourceHandler {
    pub fn new(connection: impl Into<String>) -> Self {
        Self { connection: connection.into() }
    }
}

impl TaskHandler for SyncResourceHandler {
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
        let local = ctx.find_record_by_resource_id(&kind, &resource_id);

        match provider.get_by_id(&kind, &resource_id) {
            Ok(body) => {
                match local {
                    Some((local_id, value)) => {
                        let mut record = match ResourceRecord::from_value(&value) {
                            Ok(r) => r,
                            Err(e) => return TaskOutcome::Failure { message: e.to_string() },
                        };
                        if payload_checksum(&body) == record.checksum {
                            debug!("{kind}/{resource_id} unchanged, sync noop");
                            return TaskOutcome::Success { result: Some(json!({"changed": false})),
                                                          resource_id: Some(resource_id),
                                                          message: format!("{kind} unchanged") };
                        }
                        record.refresh_payload(body);
                        ctx.save_record(&kind, &local_id, record.to_value());
                        TaskOutcome::Success { result: Some(json!({"changed": true})),
                                               resource_id: Some(resource_id),
                                               message: format!("{kind} updated from remote") }
                    }
                    // registro local ausente: prerequisito local perdido, se
                    // reporta en vez de saltear en silencio (indica drift)
                    None => TaskOutcome::Failure {
                        message: format!("local {kind} record for {resource_id} not found; \
                                          state drifted while an operation was in flight"),
                    },
                }
            }
            Err(e) if e.is_not_found() => {
                if let Some((local_id, _)) = local {
                    ctx.delete_record(&kind, &local_id);
                }
                TaskOutcome::Success { result: Some(json!({"changed": true, "removed": true})),
                                       resource_id: Some(resource_id),
                                       message: format!("{kind} gone remotely; local record removed") }
            }
            Err(e) if e.is_auth_invalid() => fail_auth(ctx, e),
            Err(e) => TaskOutcome::Failure { message: e.provider_message().to_string() },
        }
    }
}

/// Discovery por listado: trae todos los recursos de un kind en una región y
/// upserta los registros locales.
pub struct DiscoveryHandler {
    pub connection: String,
    /// Operación remota de listado (p. ej. "list_instances").
    pub operation: String,
}

impl DiscoveryHandler {
    pub fn new(connection: impl Into<String>, operation: impl Into<String>) -> Self {
        Self { connection: connection.into(), operation: operation.into() }
    }
}

impl TaskHandler for DiscoveryHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider(&self.connection) {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: format!("missing connection {}", self.connection) },
        };
        let kind = ctx.task.resource_type.clone();
        // prerequisito local: la región tiene que venir declarada
        let region = match ctx.metadata().get("region").and_then(|v| v.as_str()) {
            Some(r) => r.to_string(),
            None => return TaskOutcome::Failure {
                message: format!("discovery for {kind} without region in task_metadata"),
            },
        };
        let cloud_id = ctx.account_id().unwrap_or("unknown").to_string();

        let listed = match provider.call(&self.operation, &json!({"region": region})) {
            Ok(body) => body,
            Err(e) if e.is_auth_invalid() => return fail_auth(ctx, e),
            Err(e) => return TaskOutcome::Failure { message: e.provider_message().to_string() },
        };
        let items: Vec<Value> = listed.as_array().cloned().unwrap_or_default();
        let mut discovered = 0usize;
        for body in &items {
            match ResourceRecord::from_remote_json(&kind, &cloud_id, &region, body) {
                Ok(record) => {
                    // upsert por resource_id: si ya existe, refrescar en el
                    // mismo registro local
                    let resource_id = record.resource_id.clone().unwrap_or_default();
                    match ctx.find_record_by_resource_id(&kind, &resource_id) {
                        Some((local_id, existing)) => {
                            if let Ok(mut existing) = ResourceRecord::from_value(&existing) {
                                if existing.refresh_payload(body.clone()) {
                                    ctx.save_record(&kind, &local_id, existing.to_value());
                                }
                            }
                        }
                        None => {
                            let local_id = record.id.clone();
                            ctx.save_record(&kind, &local_id, record.to_value());
                        }
                    }
                    discovered += 1;
                }
                Err(e) => debug!("discovery skipped a malformed {kind} body: {e}"),
            }
        }
        TaskOutcome::Success { result: Some(json!({"discovered": discovered})),
                               resource_id: None,
                               message: format!("discovered {discovered} {kind} resource(s) in {region}") }
    }
}
