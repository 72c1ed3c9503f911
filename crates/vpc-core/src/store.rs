//! Contrato de persistencia del motor y backend en memoria.
//!
//! El motor es stateless entre ticks: todo el estado vive en el store. Los
//! métodos de lectura devuelven COPIAS, modelando la re-lectura por id que un
//! worker multiproceso hace al inicio de cada invocación (nunca confiar en
//! referencias cacheadas). El backend Postgres (`vpc-persistence`) implementa
//! este mismo trait con paridad 1:1.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::model::{WorkflowNature, WorkflowRoot, WorkflowTask};
use crate::status::{RootStatus, TaskStatus};

/// Fila del log de transiciones (auditoría append-only).
#[derive(Debug, Clone)]
pub struct TaskTransition {
    pub seq: u64,
    pub task_id: Uuid,
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub message: String,
    pub ts: DateTime<Utc>,
}

pub trait WorkflowStore {
    fn insert_root(&mut self, root: WorkflowRoot) -> Result<(), EngineError>;
    fn insert_task(&mut self, task: WorkflowTask) -> Result<(), EngineError>;

    /// Re-lee un root por id (copia fresca).
    fn root(&self, id: Uuid) -> Result<WorkflowRoot, EngineError>;
    /// Re-lee una task por id (copia fresca).
    fn task(&self, id: Uuid) -> Result<WorkflowTask, EngineError>;

    fn save_root(&mut self, root: &WorkflowRoot) -> Result<(), EngineError>;
    fn save_task(&mut self, task: &WorkflowTask) -> Result<(), EngineError>;

    /// Borrado compensatorio de una task (rollback tras un create remoto
    /// fallido con persistencia local parcial). Las tasks fallidas normales
    /// NO se borran: se conservan para reporte de errores.
    fn delete_task(&mut self, id: Uuid) -> Result<(), EngineError>;

    /// Todas las tasks asociadas a un root (para derivar estado y fan-in).
    fn tasks_of_root(&self, root_id: Uuid) -> Result<Vec<WorkflowTask>, EngineError>;

    /// Roots no terminales, en orden de creación.
    fn active_roots(&self) -> Vec<Uuid>;

    /// Dedup: root en vuelo con el mismo owner+nature+payload.
    fn find_in_flight_root(&self,
                           user_id: &str,
                           project_id: &str,
                           nature: WorkflowNature,
                           fe_request_hash: &str)
                           -> Option<Uuid>;

    /// Registra una transición de estado en el log de auditoría.
    fn record_transition(&mut self, task_id: Uuid, from: TaskStatus, to: TaskStatus, message: &str);
}

/// Backend en memoria: arena de roots y tasks por id más log de transiciones.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    roots: HashMap<Uuid, WorkflowRoot>,
    tasks: HashMap<Uuid, WorkflowTask>,
    /// Orden de inserción de roots (HashMap no lo conserva).
    root_order: Vec<Uuid>,
    transitions: Vec<TaskTransition>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log completo de transiciones (inspección en tests/CLI).
    pub fn transitions(&self) -> &[TaskTransition] {
        &self.transitions
    }
}

impl WorkflowStore for InMemoryWorkflowStore {
    fn insert_root(&mut self, root: WorkflowRoot) -> Result<(), EngineError> {
        self.root_order.push(root.id);
        self.roots.insert(root.id, root);
        Ok(())
    }

    fn insert_task(&mut self, task: WorkflowTask) -> Result<(), EngineError> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    fn root(&self, id: Uuid) -> Result<WorkflowRoot, EngineError> {
        self.roots.get(&id).cloned().ok_or(EngineError::RootNotFound(id))
    }

    fn task(&self, id: Uuid) -> Result<WorkflowTask, EngineError> {
        self.tasks.get(&id).cloned().ok_or(EngineError::TaskNotFound(id))
    }

    fn save_root(&mut self, root: &WorkflowRoot) -> Result<(), EngineError> {
        match self.roots.get_mut(&root.id) {
            Some(slot) => {
                *slot = root.clone();
                Ok(())
            }
            None => Err(EngineError::RootNotFound(root.id)),
        }
    }

    fn save_task(&mut self, task: &WorkflowTask) -> Result<(), EngineError> {
        match self.tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(())
            }
            None => Err(EngineError::TaskNotFound(task.id)),
        }
    }

    fn delete_task(&mut self, id: Uuid) -> Result<(), EngineError> {
        let task = self.tasks.remove(&id).ok_or(EngineError::TaskNotFound(id))?;
        if let Some(root_id) = task.root_id {
            if let Some(root) = self.roots.get_mut(&root_id) {
                root.task_ids.retain(|t| *t != id);
            }
        }
        Ok(())
    }

    fn tasks_of_root(&self, root_id: Uuid) -> Result<Vec<WorkflowTask>, EngineError> {
        let root = self.roots.get(&root_id).ok_or(EngineError::RootNotFound(root_id))?;
        root.task_ids
            .iter()
            .map(|id| self.tasks.get(id).cloned().ok_or(EngineError::TaskNotFound(*id)))
            .collect()
    }

    fn active_roots(&self) -> Vec<Uuid> {
        self.root_order
            .iter()
            .filter(|id| {
                self.roots
                    .get(id)
                    .map(|r| !matches!(r.status, RootStatus::Successful | RootStatus::Failed))
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }

    fn find_in_flight_root(&self,
                           user_id: &str,
                           project_id: &str,
                           nature: WorkflowNature,
                           fe_request_hash: &str)
                           -> Option<Uuid> {
        self.root_order
            .iter()
            .filter_map(|id| self.roots.get(id))
            .find(|r| {
                !r.status.is_terminal()
                && r.nature == nature
                && r.owner.user_id == user_id
                && r.owner.project_id == project_id
                && r.fe_request_hash.as_deref() == Some(fe_request_hash)
            })
            .map(|r| r.id)
    }

    fn record_transition(&mut self, task_id: Uuid, from: TaskStatus, to: TaskStatus, message: &str) {
        let seq = self.transitions.len() as u64;
        self.transitions.push(TaskTransition { seq,
                                               task_id,
                                               from,
                                               to,
                                               message: message.to_string(),
                                               ts: Utc::now() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Owner, TaskType};
    use serde_json::json;

    #[test]
    fn dedup_matches_in_flight_only() {
        let mut store = InMemoryWorkflowStore::new();
        let req = json!({"cloud_id": "c1"});
        let mut root = WorkflowRoot::new(Owner::new("u1", "p1"), "profile_sync", WorkflowNature::Sync)
            .with_fe_request(&req);
        let hash = root.fe_request_hash.clone().unwrap();
        store.insert_root(root.clone()).unwrap();

        assert_eq!(store.find_in_flight_root("u1", "p1", WorkflowNature::Sync, &hash), Some(root.id));
        // otro owner no matchea
        assert_eq!(store.find_in_flight_root("u2", "p1", WorkflowNature::Sync, &hash), None);

        // terminado -> deja de contar como en vuelo
        root.status = RootStatus::Successful;
        store.save_root(&root).unwrap();
        assert_eq!(store.find_in_flight_root("u1", "p1", WorkflowNature::Sync, &hash), None);
    }

    #[test]
    fn delete_task_detaches_from_root() {
        let mut store = InMemoryWorkflowStore::new();
        let mut root = WorkflowRoot::new(Owner::new("u1", "p1"), "create_instance", WorkflowNature::Create);
        let mut task = WorkflowTask::new(TaskType::Create, "IBMInstance", json!({}));
        task.root_id = Some(root.id);
        root.task_ids.push(task.id);
        let task_id = task.id;
        store.insert_root(root.clone()).unwrap();
        store.insert_task(task).unwrap();

        store.delete_task(task_id).unwrap();
        assert!(store.task(task_id).is_err());
        assert!(store.root(root.id).unwrap().task_ids.is_empty());
    }
}
