//! Índice compartido de recursos ya traducidos.
//!
//! Cada construct se registra al crearse, keyed por su id en el sistema
//! FUENTE; los constructs procesados después resuelven sus foreign keys con
//! un lookup O(1), sin segunda pasada ni lenguaje de consulta. El índice
//! vive lo que dura una corrida de traducción y nunca se persiste.

use indexmap::IndexMap;

use crate::error::TranslationError;

/// Referencia a un recurso ya traducido: kind destino + nombre destino.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedRef {
    pub kind: &'static str,
    pub name: String,
}

#[derive(Default)]
pub struct TranslatedResources {
    by_source_id: IndexMap<String, TranslatedRef>,
}

impl TranslatedResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source_id: impl Into<String>, kind: &'static str, name: impl Into<String>) {
        self.by_source_id
            .insert(source_id.into(), TranslatedRef { kind, name: name.into() });
    }

    /// Relación opcional: ausencia = skip silencioso del que consulta.
    pub fn resolve(&self, source_id: &str) -> Option<&TranslatedRef> {
        self.by_source_id.get(source_id)
    }

    /// Relación requerida: ausencia = fallo duro de traducción.
    pub fn require(&self, source_id: &str, kind: &'static str, needed_by: &str) -> Result<&TranslatedRef, TranslationError> {
        self.resolve(source_id)
            .ok_or_else(|| TranslationError::MissingReference { kind: kind.to_string(),
                                                                source_id: source_id.to_string(),
                                                                needed_by: needed_by.to_string() })
    }

    pub fn len(&self) -> usize {
        self.by_source_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source_id.is_empty()
    }
}
