//! Builders de los DAGs canónicos que la capa de API arma por acción de
//! usuario. El motor no descubre qué tasks necesita una acción: se las
//! entrega esta capa, ya encadenadas.

use serde_json::{json, Value};

use vpc_core::{EngineError, Owner, RootBuilder, TaskType, WorkflowNature, WorkflowTask};
use vpc_domain::kinds;
use vpc_translate::{kind as translated, TranslationOutput};

/// Conexión por defecto hacia IBM VPC.
pub const IBM_CONNECTION: &str = "ibm-cloud";
/// Conexión hacia la infraestructura classic.
pub const SOFTLAYER_CONNECTION: &str = "softlayer";

/// Create de load balancer: un root con una única task CREATE resumible
/// (create y poll en la misma task, HTTP 202 para el caller).
pub fn create_load_balancer_root(owner: Owner, account_id: &str, resource_data: Value) -> RootBuilder {
    let request = json!({"action": "create_load_balancer", "resource_data": resource_data});
    let mut builder = RootBuilder::new(owner, "create_load_balancer", WorkflowNature::Create)
        .fe_request(&request);
    builder.add_task(WorkflowTask::new(TaskType::Create,
                                       kinds::LOAD_BALANCER,
                                       json!({
                                           "resource_data": resource_data,
                                           "cloud_account_id": account_id,
                                       })));
    builder
}

/// Delete genérico de un recurso enlazado.
pub fn delete_resource_root(owner: Owner, account_id: &str, resource_type: &str, resource_id: &str) -> RootBuilder {
    let request = json!({"action": "delete", "resource_type": resource_type, "resource_id": resource_id});
    let mut builder = RootBuilder::new(owner, format!("delete_{resource_type}"), WorkflowNature::Delete)
        .fe_request(&request);
    builder.add_task(WorkflowTask::new(TaskType::Delete,
                                       resource_type,
                                       json!({
                                           "resource_id": resource_id,
                                           "cloud_account_id": account_id,
                                       })));
    builder
}

/// Sync de consumo multi-región con fan-in: N syncs de uso -> una task que
/// genera recomendaciones leyendo los results de todos.
pub fn usage_sync_root(owner: Owner, account_id: &str, regions: &[&str]) -> Result<RootBuilder, EngineError> {
    let request = json!({"action": "usage_sync", "regions": regions});
    let mut builder = RootBuilder::new(owner, "usage_sync", WorkflowNature::FetchCost).fe_request(&request);
    let mut sync_ids = Vec::new();
    for region in regions {
        sync_ids.push(builder.add_task(WorkflowTask::new(TaskType::Consumption,
                                                         "IBMUsageReport",
                                                         json!({
                                                             "region": region,
                                                             "cloud_account_id": account_id,
                                                         }))));
    }
    let fan_in = builder.add_task(WorkflowTask::new(TaskType::FetchCost,
                                                    "IBMRightsizingRecommendation",
                                                    json!({"cloud_account_id": account_id})));
    for sync_id in sync_ids {
        builder.chain(sync_id, fan_in)?;
    }
    Ok(builder)
}

/// Migración de un VSI classic: backup -> wait (ping+sysprep) y, como
/// callback ON_SUCCESS, la cadena captura de imagen -> espera de export ->
/// create de la instancia IBM. El callback no arranca si el backup falla.
pub fn migrate_classic_instance_root(owner: Owner,
                                     softlayer_account: &str,
                                     ibm_account: &str,
                                     classic_instance: Value,
                                     target_instance: Value)
                                     -> Result<RootBuilder, EngineError> {
    let request = json!({"action": "migrate_classic_instance", "source": classic_instance});
    let mut parent = RootBuilder::new(owner.clone(), "migrate_classic_instance", WorkflowNature::Migrate)
        .fe_request(&request);
    let backup = parent.add_task(WorkflowTask::new(TaskType::Backup,
                                                   "SoftlayerBackupInstance",
                                                   json!({
                                                       "resource_data": classic_instance,
                                                       "cloud_account_id": softlayer_account,
                                                   })));
    let backup_wait = parent.add_task(WorkflowTask::new(TaskType::CreateWait,
                                                        "SoftlayerBackupInstance",
                                                        json!({"cloud_account_id": softlayer_account})));
    parent.chain(backup, backup_wait)?;

    let mut capture = RootBuilder::new(owner, "capture_and_create_instance", WorkflowNature::Create);
    let image = capture.add_task(WorkflowTask::new(TaskType::Create,
                                                   kinds::IMAGE,
                                                   json!({
                                                       "resource_data": {"name": "migrated-image"},
                                                       "cloud_account_id": ibm_account,
                                                   })));
    let image_wait = capture.add_task(WorkflowTask::new(TaskType::CreateWait,
                                                        kinds::IMAGE,
                                                        json!({"cloud_account_id": ibm_account})));
    let instance = capture.add_task(WorkflowTask::new(TaskType::Create,
                                                      kinds::INSTANCE,
                                                      json!({
                                                          "resource_data": target_instance,
                                                          "cloud_account_id": ibm_account,
                                                      })));
    capture.chain_sequence(&[image, image_wait, instance])?;
    parent.add_callback(capture);
    Ok(parent)
}

/// Mapea un kind del árbol de traducción al resource_type de dominio.
pub fn domain_kind_for(translated_kind: &str) -> Option<&'static str> {
    match translated_kind {
        translated::VPC => Some(kinds::VPC_NETWORK),
        translated::PUBLIC_GATEWAY => Some(kinds::PUBLIC_GATEWAY),
        translated::SUBNET => Some(kinds::SUBNET),
        translated::NETWORK_ACL => Some(kinds::ACL),
        translated::ROUTE_TABLE => Some(kinds::ROUTE_TABLE),
        translated::SECURITY_GROUP => Some(kinds::SECURITY_GROUP),
        translated::SSH_KEY => Some(kinds::SSH_KEY),
        translated::DEDICATED_HOST => Some(kinds::DEDICATED_HOST),
        translated::PLACEMENT_GROUP => Some(kinds::PLACEMENT_GROUP),
        translated::VOLUME => Some(kinds::VOLUME),
        translated::INSTANCE => Some(kinds::INSTANCE),
        translated::VPN_GATEWAY => Some(kinds::VPN_GATEWAY),
        translated::KUBERNETES_CLUSTER => Some(kinds::KUBERNETES_CLUSTER),
        translated::LOAD_BALANCER => Some(kinds::LOAD_BALANCER),
        _ => None,
    }
}

/// Convierte el árbol de traducción en un root de creación: una task CREATE
/// por recurso, encadenadas en el orden de dependencias que computó el
/// traductor.
pub fn creation_root_from_translation(owner: Owner,
                                      account_id: &str,
                                      workflow_name: &str,
                                      output: &TranslationOutput)
                                      -> Result<RootBuilder, EngineError> {
    let request = json!({"action": workflow_name, "resources": output.total()});
    let mut builder = RootBuilder::new(owner, workflow_name, WorkflowNature::Create).fe_request(&request);
    let mut previous = None;
    for (translated_kind, resource) in output.in_creation_order() {
        let Some(resource_type) = domain_kind_for(translated_kind) else {
            continue;
        };
        let task_id = builder.add_task(WorkflowTask::new(TaskType::Create,
                                                         resource_type,
                                                         json!({
                                                             "resource_data": resource.resource_json,
                                                             "source_id": resource.source_id,
                                                             "cloud_account_id": account_id,
                                                         })));
        if let Some(prev) = previous {
            builder.chain(prev, task_id)?;
        }
        previous = Some(task_id);
    }
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_sync_builds_fan_in() {
        let builder = usage_sync_root(Owner::new("u", "p"), "acc", &["us-south", "us-east", "eu-de"])
            .expect("builder");
        let root = builder.root();
        assert_eq!(root.task_ids.len(), 4);
        assert_eq!(root.nature, WorkflowNature::FetchCost);
    }

    #[test]
    fn migration_has_callback_chain() {
        let builder = migrate_classic_instance_root(Owner::new("u", "p"),
                                                    "sl-acc",
                                                    "ibm-acc",
                                                    json!({"id": "vsi-1"}),
                                                    json!({"name": "vm-target"}))
            .expect("builder");
        assert_eq!(builder.root().task_ids.len(), 2);
    }
}
