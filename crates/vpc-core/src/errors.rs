//! Errores específicos del motor de orquestación.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub enum EngineError {
    #[error("workflow root not found: {0}")]
    RootNotFound(Uuid),
    #[error("workflow task not found: {0}")]
    TaskNotFound(Uuid),
    #[error("edge would create a cycle: {from} -> {to}")]
    CycleDetected { from: Uuid, to: Uuid },
    #[error("no handler registered for {task_type}/{resource_type}")]
    HandlerMissing { task_type: String, resource_type: String },
    #[error("task already in terminal state")]
    TaskAlreadyTerminal,
    #[error("duplicate in-flight request (root {0})")]
    DuplicateRequest(Uuid),
    #[error("missing local prerequisite: {0}")]
    MissingPrerequisite(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Clasificación gruesa de errores, usada por la capa de persistencia para
/// decidir reintentos y por el log de transiciones para auditoría.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Entrada malformada o grafo inválido: no se creó estado parcial.
    Validation,
    /// Condición transitoria, se recomienda reintentar.
    Transient,
    /// Error definitivo del motor o del proveedor.
    Permanent,
    /// Error de ejecución no clasificado.
    Runtime,
}

/// Mapea un `EngineError` a su clase.
pub fn classify_error(err: &EngineError) -> ErrorClass {
    match err {
        EngineError::CycleDetected { .. }
        | EngineError::HandlerMissing { .. }
        | EngineError::DuplicateRequest(_) => ErrorClass::Validation,
        EngineError::MissingPrerequisite(_) => ErrorClass::Permanent,
        EngineError::RootNotFound(_)
        | EngineError::TaskNotFound(_)
        | EngineError::TaskAlreadyTerminal => ErrorClass::Runtime,
        EngineError::Internal(_) => ErrorClass::Runtime,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn graph_errors_classify_as_validation() {
        let id = Uuid::new_v4();
        assert_eq!(classify_error(&EngineError::CycleDetected { from: id, to: id }), ErrorClass::Validation);
        assert_eq!(classify_error(&EngineError::DuplicateRequest(id)), ErrorClass::Validation);
        assert_eq!(classify_error(&EngineError::MissingPrerequisite("region us-south".into())),
                   ErrorClass::Permanent);
        assert_eq!(classify_error(&EngineError::RootNotFound(id)), ErrorClass::Runtime);
    }
}
