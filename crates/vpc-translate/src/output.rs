//! Árbol de salida de una traducción.
//!
//! Keyed por kind de recurso en el ORDEN de dependencias en que fueron
//! procesados; cada entrada lleva el `resource_json` (payload de creación
//! para el destino) más las referencias cruzadas por id fuente. El caller lo
//! convierte en payloads de workflows de creación, una task por recurso, en
//! ese mismo orden.

use indexmap::IndexMap;
use serde_json::Value;

/// Kinds de recurso del árbol de salida, en orden de dependencias.
pub mod kind {
    pub const VPC: &str = "vpc";
    pub const PUBLIC_GATEWAY: &str = "public_gateway";
    pub const SUBNET: &str = "subnet";
    pub const NETWORK_ACL: &str = "network_acl";
    pub const ROUTE_TABLE: &str = "route_table";
    pub const SECURITY_GROUP: &str = "security_group";
    pub const SSH_KEY: &str = "ssh_key";
    pub const DEDICATED_HOST: &str = "dedicated_host";
    pub const PLACEMENT_GROUP: &str = "placement_group";
    pub const VOLUME: &str = "volume";
    pub const INSTANCE: &str = "instance";
    pub const VPN_GATEWAY: &str = "vpn_gateway";
    pub const KUBERNETES_CLUSTER: &str = "kubernetes_cluster";
    pub const LOAD_BALANCER: &str = "load_balancer";
}

/// Orden de creación en el destino (dependencias primero).
pub const CREATION_ORDER: &[&str] = &[kind::VPC,
                                      kind::PUBLIC_GATEWAY,
                                      kind::SUBNET,
                                      kind::NETWORK_ACL,
                                      kind::ROUTE_TABLE,
                                      kind::SECURITY_GROUP,
                                      kind::SSH_KEY,
                                      kind::DEDICATED_HOST,
                                      kind::PLACEMENT_GROUP,
                                      kind::VOLUME,
                                      kind::INSTANCE,
                                      kind::VPN_GATEWAY,
                                      kind::KUBERNETES_CLUSTER,
                                      kind::LOAD_BALANCER];

#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedResource {
    /// Id del recurso en el sistema FUENTE.
    pub source_id: String,
    /// Payload de creación listo para la API destino.
    pub resource_json: Value,
    /// Referencias cruzadas: campo -> id fuente del recurso referenciado.
    pub references: IndexMap<String, String>,
}

#[derive(Debug, Default)]
pub struct TranslationOutput {
    resources: IndexMap<&'static str, Vec<TranslatedResource>>,
}

impl TranslationOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: &'static str, resource: TranslatedResource) {
        self.resources.entry(kind).or_default().push(resource);
    }

    pub fn of_kind(&self, kind: &str) -> &[TranslatedResource] {
        self.resources.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total(&self) -> usize {
        self.resources.values().map(Vec::len).sum()
    }

    /// Recorre todos los recursos en orden de creación (dependencias
    /// primero), input directo del builder de workflows.
    pub fn in_creation_order(&self) -> impl Iterator<Item = (&'static str, &TranslatedResource)> {
        CREATION_ORDER.iter().flat_map(move |k| self.of_kind(k).iter().map(move |r| (*k, r)))
    }

    /// Representación JSON del árbol (kind -> lista de resource_json).
    pub fn to_value(&self) -> Value {
        let mut tree = serde_json::Map::new();
        for (kind, resources) in &self.resources {
            let entries: Vec<Value> = resources
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "source_id": r.source_id,
                        "resource_json": r.resource_json,
                        "references": r.references.iter().collect::<std::collections::BTreeMap<_, _>>(),
                    })
                })
                .collect();
            tree.insert((*kind).to_string(), Value::Array(entries));
        }
        Value::Object(tree)
    }
}
