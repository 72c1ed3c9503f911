//! Store de dominio en memoria compartible entre handlers.
//!
//! Implementa el puerto de dominio del core sobre un `DashMap`, de modo que
//! varios workers puedan leer/escribir registros sin un lock global. La API
//! tipada (`upsert_record`) hace cumplir la unicidad de `resource_id` por
//! cloud+región+kind; el puerto crudo delega en ella.

use dashmap::DashMap;
use log::warn;
use serde_json::Value;

use vpc_core::DomainPort;

use crate::record::ResourceRecord;
use crate::DomainError;

#[derive(Default)]
pub struct DomainStore {
    records: DashMap<(String, String), Value>,
}

impl DomainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Upsert tipado con invariante: un `resource_id` asignado es único por
    /// cloud+región+kind. Un duplicado indica drift (dos registros locales
    /// apuntando al mismo recurso remoto) y se rechaza.
    pub fn upsert_record(&self, record: &ResourceRecord) -> Result<(), DomainError> {
        if let Some(resource_id) = &record.resource_id {
            let clash = self.records.iter().any(|entry| {
                let (kind, id) = entry.key();
                kind == &record.kind
                && id != &record.id
                && entry.value().get("cloud_id").and_then(|v| v.as_str()) == Some(record.cloud_id.as_str())
                && entry.value().get("region").and_then(|v| v.as_str()) == Some(record.region.as_str())
                && entry.value().get("resource_id").and_then(|v| v.as_str()) == Some(resource_id.as_str())
            });
            if clash {
                return Err(DomainError::DuplicateResourceId { kind: record.kind.clone(),
                                                              region: record.region.clone(),
                                                              resource_id: resource_id.clone() });
            }
        }
        self.records
            .insert((record.kind.clone(), record.id.clone()), record.to_value());
        Ok(())
    }

    pub fn get_record(&self, kind: &str, id: &str) -> Option<ResourceRecord> {
        self.records
            .get(&(kind.to_string(), id.to_string()))
            .and_then(|v| ResourceRecord::from_value(v.value()).ok())
    }

    pub fn remove_record(&self, kind: &str, id: &str) {
        self.records.remove(&(kind.to_string(), id.to_string()));
    }

    /// Registros de un kind (para listados de inventario).
    pub fn records_of_kind(&self, kind: &str) -> Vec<ResourceRecord> {
        self.records
            .iter()
            .filter(|entry| entry.key().0 == kind)
            .filter_map(|entry| ResourceRecord::from_value(entry.value()).ok())
            .collect()
    }
}

impl DomainPort for DomainStore {
    fn load(&self, kind: &str, id: &str) -> Option<Value> {
        self.records.get(&(kind.to_string(), id.to_string())).map(|v| v.value().clone())
    }

    fn save(&mut self, kind: &str, id: &str, record: Value) {
        // el puerto crudo no puede devolver error; un payload que no parsea a
        // ResourceRecord (p. ej. CloudAccount) se guarda tal cual
        if let Ok(typed) = ResourceRecord::from_value(&record) {
            if let Err(e) = self.upsert_record(&typed) {
                warn!("rejected domain save {kind}/{id}: {e}");
                return;
            }
            return;
        }
        self.records.insert((kind.to_string(), id.to_string()), record);
    }

    fn delete(&mut self, kind: &str, id: &str) {
        self.remove_record(kind, id);
    }

    fn find_by_resource_id(&self, kind: &str, resource_id: &str) -> Option<(String, Value)> {
        self.records
            .iter()
            .find(|entry| {
                entry.key().0 == kind
                && entry.value().get("resource_id").and_then(|v| v.as_str()) == Some(resource_id)
            })
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
    }
}
