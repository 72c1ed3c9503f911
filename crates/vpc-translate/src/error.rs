//! Errores de traducción.
//!
//! La validación del payload fuente es estricta y al frente: si falla, se
//! devuelve la lista COMPLETA de errores de campo y no se traduce nada (la
//! traducción es puramente en memoria, "abortar" = no emitir resultado).

use serde::Serialize;
use thiserror::Error;

/// Error estructurado de un campo del payload fuente.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Debug, Error)]
pub enum TranslationError {
    /// Payload fuente inválido: parse estricto o cross-references requeridas
    /// ausentes. Lleva todos los errores de campo encontrados.
    #[error("source payload validation failed ({} field error(s))", errors.len())]
    Validation { errors: Vec<FieldError> },
    /// Relación REQUERIDA no resuelta durante la traducción (p. ej. subnet
    /// sin VPC padre en el índice). Las relaciones opcionales se saltean en
    /// silencio, nunca llegan acá.
    #[error("unresolved required reference: {kind} {source_id} needed by {needed_by}")]
    MissingReference {
        kind: String,
        source_id: String,
        needed_by: String,
    },
}

impl TranslationError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        TranslationError::Validation { errors }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            TranslationError::Validation { errors } => errors,
            _ => &[],
        }
    }
}
