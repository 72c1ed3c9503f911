//! Cliente cloud simulado para demos y tests de integración.
//!
//! Modela lo mínimo que el executor necesita de un SDK real: creates que
//! devuelven `create_pending` y pasan a `active` tras N polls, gets por id
//! idempotentes, deletes que terminan en 404, listados por kind y un modo de
//! rate-limit para ejercitar la política de reintentos.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::{json, Value};

use vpc_core::{CloudClient, ProviderError};

struct SimResource {
    kind: String,
    body: Value,
    /// Polls restantes hasta reportar "active".
    remaining_polls: u64,
}

pub struct SimulatedCloudClient {
    resources: DashMap<String, SimResource>,
    next_id: AtomicU64,
    /// Polls que tarda un recurso recién creado en estar listo.
    polls_until_ready: u64,
    /// Rate limits pendientes de inyectar (cada llamada consume uno).
    rate_limits_left: AtomicU64,
}

impl SimulatedCloudClient {
    pub fn new(polls_until_ready: u64) -> Self {
        Self { resources: DashMap::new(),
               next_id: AtomicU64::new(1),
               polls_until_ready,
               rate_limits_left: AtomicU64::new(0) }
    }

    /// Inyecta `n` respuestas 429 antes de volver a operar normal.
    pub fn inject_rate_limits(&self, n: u64) {
        self.rate_limits_left.store(n, Ordering::SeqCst);
    }

    /// Siembra un recurso ya activo (estado inicial de un escenario).
    pub fn seed(&self, kind: &str, id: &str, body: Value) {
        self.resources.insert(id.to_string(),
                              SimResource { kind: kind.to_string(), body, remaining_polls: 0 });
    }

    pub fn exists(&self, id: &str) -> bool {
        self.resources.contains_key(id)
    }

    fn consume_rate_limit(&self) -> Result<(), ProviderError> {
        let left = self.rate_limits_left.load(Ordering::SeqCst);
        if left > 0 {
            self.rate_limits_left.store(left - 1, Ordering::SeqCst);
            return Err(ProviderError::RateLimited("429 too many requests".into()));
        }
        Ok(())
    }

    fn status_body(&self, id: &str) -> Result<Value, ProviderError> {
        let mut entry = self.resources
                            .get_mut(id)
                            .ok_or_else(|| ProviderError::NotFound(format!("{id} not found")))?;
        let status = if entry.remaining_polls == 0 {
            "active"
        } else {
            entry.remaining_polls -= 1;
            if entry.remaining_polls == 0 {
                "active"
            } else {
                "create_pending"
            }
        };
        let mut body = entry.body.clone();
        body["id"] = json!(id);
        body["status"] = json!(status);
        Ok(body)
    }
}

impl CloudClient for SimulatedCloudClient {
    fn call(&self, operation: &str, params: &Value) -> Result<Value, ProviderError> {
        self.consume_rate_limit()?;
        if let Some(kind) = operation.strip_prefix("create_") {
            let id = format!("sim-{}-{}", kind, self.next_id.fetch_add(1, Ordering::SeqCst));
            self.resources.insert(id.clone(),
                                  SimResource { kind: kind.to_string(),
                                                body: params.clone(),
                                                remaining_polls: self.polls_until_ready });
            let mut body = params.clone();
            body["id"] = json!(id);
            body["status"] = json!(if self.polls_until_ready == 0 { "active" } else { "create_pending" });
            return Ok(body);
        }
        if operation.strip_prefix("delete_").is_some() {
            let id = params.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            return match self.resources.remove(id) {
                Some(_) => Ok(json!({"deleted": id})),
                None => Err(ProviderError::NotFound(format!("{id} not found"))),
            };
        }
        if let Some(kind) = operation.strip_prefix("list_") {
            let items: Vec<Value> = self.resources
                                        .iter()
                                        .filter(|e| e.value().kind == kind)
                                        .map(|e| {
                                            let mut body = e.value().body.clone();
                                            body["id"] = json!(e.key());
                                            body
                                        })
                                        .collect();
            return Ok(Value::Array(items));
        }
        if operation == "backup_instance_status" {
            let id = params.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            let body = self.status_body(id)?;
            let ready = body["status"] == "active";
            return Ok(json!({"id": id, "ping": ready, "sysprep_complete": ready}));
        }
        Err(ProviderError::Fatal(format!("unsupported operation {operation}")))
    }

    fn get_by_id(&self, _resource_kind: &str, resource_id: &str) -> Result<Value, ProviderError> {
        self.consume_rate_limit()?;
        self.status_body(resource_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_poll_reaches_active() {
        let client = SimulatedCloudClient::new(2);
        let created = client.call("create_load_balancer", &json!({"name": "lb1"})).unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "create_pending");
        assert_eq!(client.get_by_id("load_balancer", &id).unwrap()["status"], "create_pending");
        assert_eq!(client.get_by_id("load_balancer", &id).unwrap()["status"], "active");
    }

    #[test]
    fn delete_then_get_is_not_found() {
        let client = SimulatedCloudClient::new(0);
        client.seed("instance", "i-1", json!({"name": "vm"}));
        client.call("delete_instance", &json!({"id": "i-1"})).unwrap();
        assert!(matches!(client.get_by_id("instance", "i-1"), Err(ProviderError::NotFound(_))));
    }

    #[test]
    fn injected_rate_limits_surface_as_429() {
        let client = SimulatedCloudClient::new(0);
        client.inject_rate_limits(1);
        assert!(matches!(client.call("list_instance", &json!({})), Err(ProviderError::RateLimited(_))));
        assert!(client.call("list_instance", &json!({})).is_ok());
    }
}
