//! `WorkflowTask`: un nodo del DAG de ejecución.
//!
//! Las tasks viven en el `WorkflowStore` (arena) y se referencian entre sí
//! por id; `previous`/`next` son listas de ids, nunca punteros con dueño.
//! `task_metadata` es la bolsa JSON de handoff: lleva `resource_data` de
//! entrada y el estado intermedio que una invocación deja legible para la
//! siguiente (contrato de reanudación idempotente).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::status::TaskStatus;

/// Tipo de operación que ejecuta una task. Junto al `resource_type` forma la
/// clave de despacho hacia el registry de handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Create,
    /// Poll posterior a un Create hasta que el recurso remoto esté listo.
    CreateWait,
    Delete,
    DeleteWait,
    Update,
    Validate,
    Sync,
    Discovery,
    Backup,
    Restore,
    Consumption,
    FetchCost,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Create => "create",
            TaskType::CreateWait => "create_wait",
            TaskType::Delete => "delete",
            TaskType::DeleteWait => "delete_wait",
            TaskType::Update => "update",
            TaskType::Validate => "validate",
            TaskType::Sync => "sync",
            TaskType::Discovery => "discovery",
            TaskType::Backup => "backup",
            TaskType::Restore => "restore",
            TaskType::Consumption => "consumption",
            TaskType::FetchCost => "fetch_cost",
        }
    }

    /// Una task "con sabor a borrado" trata el 404 remoto como éxito
    /// (el recurso ya no existe) y elimina el registro local.
    pub fn is_delete_flavored(&self) -> bool {
        matches!(self, TaskType::Delete | TaskType::DeleteWait)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => TaskType::Create,
            "create_wait" => TaskType::CreateWait,
            "delete" => TaskType::Delete,
            "delete_wait" => TaskType::DeleteWait,
            "update" => TaskType::Update,
            "validate" => TaskType::Validate,
            "sync" => TaskType::Sync,
            "discovery" => TaskType::Discovery,
            "backup" => TaskType::Backup,
            "restore" => TaskType::Restore,
            "consumption" => TaskType::Consumption,
            "fetch_cost" => TaskType::FetchCost,
            other => return Err(format!("unknown task type: {other}")),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowTask {
    pub id: Uuid,
    pub root_id: Option<Uuid>,
    pub task_type: TaskType,
    /// Nombre del tipo de entidad de dominio sobre la que opera
    /// (p. ej. "IBMInstance", "IBMLoadBalancer").
    pub resource_type: String,
    pub status: TaskStatus,
    /// Explicación legible del último desenlace (vacío mientras no hay uno).
    pub message: String,
    /// Bolsa JSON opaca: `resource_data`, ids remotos intermedios, contadores
    /// de poll. Lo que una invocación escribe debe ser legible por la
    /// siguiente invocación de la MISMA task y por sus descendientes.
    pub task_metadata: Value,
    /// Payload final consumido por las tasks dependientes (fan-in).
    pub result: Option<Value>,
    /// Id del registro de dominio que esta task produjo u objetivo.
    pub resource_id: Option<String>,
    pub previous: Vec<Uuid>,
    pub next: Vec<Uuid>,
}

impl WorkflowTask {
    pub fn new(task_type: TaskType, resource_type: impl Into<String>, task_metadata: Value) -> Self {
        Self { id: Uuid::new_v4(),
               root_id: None,
               task_type,
               resource_type: resource_type.into(),
               status: TaskStatus::Initiated,
               message: String::new(),
               task_metadata,
               result: None,
               resource_id: None,
               previous: Vec::new(),
               next: Vec::new() }
    }

    /// Acceso cómodo a una clave de primer nivel de `task_metadata`.
    pub fn metadata_get(&self, key: &str) -> Option<&Value> {
        self.task_metadata.get(key)
    }

    /// Inserta/reemplaza una clave de primer nivel en `task_metadata`.
    /// Si la bolsa no era un objeto se promueve a objeto.
    pub fn metadata_set(&mut self, key: &str, value: Value) {
        if !self.task_metadata.is_object() {
            self.task_metadata = Value::Object(Default::default());
        }
        if let Some(obj) = self.task_metadata.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }
}
