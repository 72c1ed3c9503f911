//! Registro de handlers resuelto al arranque.
//!
//! Sustituye el despacho por strings dinámicos: cada (task_type,
//! resource_type) declarado en un DAG debe tener handler registrado ANTES de
//! aceptar el root (`verify_tasks`), conservando la flexibilidad de
//! construir DAGs desde datos.

use std::collections::HashMap;

use crate::errors::EngineError;
use crate::executor::TaskHandler;
use crate::model::{TaskType, WorkflowTask};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub task_type: TaskType,
    pub resource_type: String,
}

impl HandlerKey {
    pub fn new(task_type: TaskType, resource_type: impl Into<String>) -> Self {
        Self { task_type, resource_type: resource_type.into() }
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Box<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self,
                    task_type: TaskType,
                    resource_type: impl Into<String>,
                    handler: Box<dyn TaskHandler>) {
        self.handlers.insert(HandlerKey::new(task_type, resource_type), handler);
    }

    pub fn resolve(&self, task_type: TaskType, resource_type: &str) -> Option<&dyn TaskHandler> {
        self.handlers
            .get(&HandlerKey::new(task_type, resource_type))
            .map(|h| h.as_ref())
    }

    /// Verifica que cada task declarada tenga handler. Se invoca al submit de
    /// un root; un kind sin handler es error de programación del caller, no
    /// una condición recuperable en runtime.
    pub fn verify_tasks<'a>(&self, tasks: impl Iterator<Item = &'a WorkflowTask>) -> Result<(), EngineError> {
        for task in tasks {
            if self.resolve(task.task_type, &task.resource_type).is_none() {
                return Err(EngineError::HandlerMissing { task_type: task.task_type.as_str().to_string(),
                                                         resource_type: task.resource_type.clone() });
            }
        }
        Ok(())
    }
}
