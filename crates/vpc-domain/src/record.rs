//! Registros de recursos de dominio (IBMInstance, IBMLoadBalancer, ...).
//!
//! El core los trata como JSON opaco a través de su puerto de dominio; esta
//! capa les da forma: identidad local, enlace al recurso remoto
//! (`resource_id`) y checksum del payload para que los syncs puedan saltear
//! updates sin cambios.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::DomainError;

/// Nombres de kind usados como `resource_type` en las tasks y como clave de
/// registro en el puerto de dominio.
pub mod kinds {
    pub const INSTANCE: &str = "IBMInstance";
    pub const LOAD_BALANCER: &str = "IBMLoadBalancer";
    pub const VPC_NETWORK: &str = "IBMVpcNetwork";
    pub const SUBNET: &str = "IBMSubnet";
    pub const SECURITY_GROUP: &str = "IBMSecurityGroup";
    pub const VOLUME: &str = "IBMVolume";
    pub const IMAGE: &str = "IBMImage";
    pub const PUBLIC_GATEWAY: &str = "IBMPublicGateway";
    pub const ACL: &str = "IBMNetworkAcl";
    pub const ROUTE_TABLE: &str = "IBMRouteTable";
    pub const VPN_GATEWAY: &str = "IBMVpnGateway";
    pub const KUBERNETES_CLUSTER: &str = "IBMKubernetesCluster";
    pub const SSH_KEY: &str = "IBMSshKey";
    pub const DEDICATED_HOST: &str = "IBMDedicatedHost";
    pub const PLACEMENT_GROUP: &str = "IBMPlacementGroup";
    pub const TRANSIT_GATEWAY: &str = "IBMTransitGateway";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub cloud_id: String,
    pub region: String,
    /// Id remoto del recurso; único por cloud+región+kind una vez asignado.
    pub resource_id: Option<String>,
    /// Payload remoto tal como lo reportó el proveedor.
    pub payload: Value,
    /// SHA-256 del payload canónico; un sync con checksum igual es no-op.
    pub checksum: String,
    pub updated_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(kind: impl Into<String>,
               name: impl Into<String>,
               cloud_id: impl Into<String>,
               region: impl Into<String>,
               payload: Value)
               -> Self {
        let checksum = payload_checksum(&payload);
        Self { id: Uuid::new_v4().to_string(),
               kind: kind.into(),
               name: name.into(),
               cloud_id: cloud_id.into(),
               region: region.into(),
               resource_id: None,
               payload,
               checksum,
               updated_at: Utc::now() }
    }

    /// Construye un registro a partir de la respuesta del proveedor, tomando
    /// `id`/`name` del body remoto (patrón de los syncs de descubrimiento).
    pub fn from_remote_json(kind: &str, cloud_id: &str, region: &str, body: &Value) -> Result<Self, DomainError> {
        let remote_id = body.get("id")
                            .and_then(|v| v.as_str())
                            .ok_or_else(|| DomainError::ValidationError(format!("remote {kind} body without id")))?;
        let name = body.get("name").and_then(|v| v.as_str()).unwrap_or(remote_id);
        let mut record = Self::new(kind, name, cloud_id, region, body.clone());
        record.resource_id = Some(remote_id.to_string());
        Ok(record)
    }

    /// Liga el registro al recurso remoto confirmado.
    pub fn assign_resource_id(&mut self, resource_id: impl Into<String>) {
        self.resource_id = Some(resource_id.into());
    }

    /// Reemplaza el payload y recalcula checksum. Devuelve true si el payload
    /// realmente cambió (false = sync no-op).
    pub fn refresh_payload(&mut self, payload: Value) -> bool {
        let checksum = payload_checksum(&payload);
        if checksum == self.checksum {
            return false;
        }
        self.payload = payload;
        self.checksum = checksum;
        self.updated_at = Utc::now();
        true
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("serialize ResourceRecord")
    }

    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        serde_json::from_value(value.clone())
            .map_err(|e| DomainError::ValidationError(format!("bad resource record: {e}")))
    }
}

/// SHA-256 hex del JSON canónico (claves ordenadas vía canonicalización del
/// core).
pub fn payload_checksum(payload: &Value) -> String {
    let canonical = vpc_core::hashing::to_canonical_json(payload);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn checksum_is_key_order_insensitive() {
        let a = payload_checksum(&json!({"name": "vm1", "zone": "us-south-1"}));
        let b = payload_checksum(&json!({"zone": "us-south-1", "name": "vm1"}));
        assert_eq!(a, b);
    }

    #[test]
    fn refresh_payload_detects_noop() {
        let mut record = ResourceRecord::new(kinds::INSTANCE, "vm1", "c1", "us-south", json!({"status": "running"}));
        assert!(!record.refresh_payload(json!({"status": "running"})));
        assert!(record.refresh_payload(json!({"status": "stopped"})));
    }

    #[test]
    fn from_remote_json_requires_id() {
        let ok = ResourceRecord::from_remote_json(kinds::SUBNET, "c1", "us-south",
                                                  &json!({"id": "s-1", "name": "subnet-a"}));
        assert_eq!(ok.unwrap().resource_id.as_deref(), Some("s-1"));
        let err = ResourceRecord::from_remote_json(kinds::SUBNET, "c1", "us-south", &json!({"name": "x"}));
        assert!(err.is_err());
    }
}
