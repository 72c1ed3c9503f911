//! Handler del backup instance classic (flujo de migración Windows).
//!
//! `create_softlayer_backup_instance` ordena el VSI de backup; esta mitad
//! "wait" pollea ping + sysprep. El contador de iteraciones vive en
//! task_metadata (contrato de reanudación): el motor no impone tope de
//! re-polls, el tope de 100 iteraciones es propio de este handler.

use serde_json::json;

use vpc_core::{TaskContext, TaskHandler, TaskOutcome};

use super::create::fail_auth;

/// Tope de iteraciones de poll de ping+sysprep.
pub const MAX_PING_ITERATIONS: u64 = 100;

pub struct BackupInstanceWaitHandler {
    pub connection: String,
}

impl BackupInstanceWaitHandler {
    pub fn new(connection: impl Into<String>) -> Self {
        Self { connection: connection.into() }
    }
}

impl TaskHandler for BackupInstanceWaitHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let provider = match ctx.provider(&self.connection) {
            Some(p) => p,
            None => return TaskOutcome::Failure { message: format!("missing connection {}", self.connection) },
        };
        let instance_id = ctx.metadata()
                             .get("backup_instance_id")
                             .and_then(|v| v.as_str())
                             .map(str::to_string)
                             .or_else(|| {
                                 ctx.predecessor_results()
                                    .iter()
                                    .find_map(|r| r.get("id").and_then(|v| v.as_str()).map(str::to_string))
                             });
        let instance_id = match instance_id {
            Some(id) => id,
            None => return TaskOutcome::Failure { message: "backup instance id not available".into() },
        };
        ctx.metadata_set("backup_instance_id", json!(instance_id.clone()));

        let iterations = ctx.metadata().get("ping_iterations").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        ctx.metadata_set("ping_iterations", json!(iterations));

        let status = match provider.call("backup_instance_status", &json!({"id": instance_id})) {
            Ok(body) => body,
            Err(e) if e.is_auth_invalid() => return fail_auth(ctx, e),
            Err(e) => return TaskOutcome::Failure { message: e.provider_message().to_string() },
        };
        let ping_ok = status.get("ping").and_then(|v| v.as_bool()).unwrap_or(false);
        let sysprep_done = status.get("sysprep_complete").and_then(|v| v.as_bool()).unwrap_or(false);

        if ping_ok && sysprep_done {
            return TaskOutcome::Success { result: Some(json!({"id": instance_id, "iterations": iterations})),
                                          resource_id: Some(instance_id),
                                          message: "backup instance reachable and sysprep complete".into() };
        }
        if iterations >= MAX_PING_ITERATIONS {
            return TaskOutcome::Failure {
                message: format!("backup instance {instance_id} not reachable after \
                                  {MAX_PING_ITERATIONS} poll iterations"),
            };
        }
        TaskOutcome::Wait { message: format!("waiting for ping+sysprep (iteration {iterations})") }
    }
}
