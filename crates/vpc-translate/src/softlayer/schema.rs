//! Esquema estricto del payload de descubrimiento classic (Softlayer).

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::FieldError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoftlayerSourceGraph {
    #[serde(default)]
    pub subnets: Vec<SlSubnet>,
    #[serde(default)]
    pub security_groups: Vec<SlSecurityGroup>,
    #[serde(default)]
    pub instances: Vec<SlInstance>,
    #[serde(default)]
    pub placement_groups: Vec<SlPlacementGroup>,
    #[serde(default)]
    pub load_balancers: Vec<SlLoadBalancer>,
    #[serde(default)]
    pub dedicated_hosts: Vec<SlDedicatedHost>,
    #[serde(default)]
    pub ssh_keys: Vec<SlSshKey>,
    /// Config de firewall VRA/Vyatta en texto plano (opcional); se parsea a
    /// reglas de ACL.
    #[serde(default)]
    pub firewall_config: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlSubnet {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub cidr: String,
    pub datacenter: String,
    #[serde(default)]
    pub vlan_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlSecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rules: Vec<SlSecurityGroupRule>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlSecurityGroupRule {
    /// "ingress" | "egress"
    pub direction: String,
    /// Número o nombre de protocolo.
    #[serde(default)]
    pub protocol: Option<String>,
    /// "IPv4" | "IPv6"
    #[serde(default = "default_ether_type")]
    pub ether_type: String,
    #[serde(default)]
    pub remote_ip: Option<String>,
    #[serde(default)]
    pub port_range_min: Option<u16>,
    #[serde(default)]
    pub port_range_max: Option<u16>,
}

fn default_ether_type() -> String {
    "IPv4".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlInstance {
    pub id: String,
    pub hostname: String,
    #[serde(default)]
    pub domain: Option<String>,
    pub cpus: u64,
    /// Memoria en MiB, como la reporta el API classic.
    pub memory: u64,
    pub datacenter: String,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub disks: Vec<SlDisk>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub placement_group_id: Option<String>,
    #[serde(default)]
    pub dedicated_host_id: Option<String>,
    #[serde(default)]
    pub ssh_key_ids: Vec<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlDisk {
    pub size_gb: u64,
    #[serde(default)]
    pub iops: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlPlacementGroup {
    pub id: String,
    pub name: String,
    /// "SPREAD" | "PACK"
    #[serde(default)]
    pub rule: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlLoadBalancer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub listeners: Vec<SlListener>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlListener {
    pub protocol: String,
    pub port: u16,
    #[serde(default)]
    pub backend_port: Option<u16>,
    /// Ids de instancia miembros (relación OPCIONAL).
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlDedicatedHost {
    pub id: String,
    pub name: String,
    pub datacenter: String,
    #[serde(default)]
    pub cpus: Option<u64>,
    #[serde(default)]
    pub memory: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlSshKey {
    pub id: String,
    pub label: String,
    pub public_key: String,
}

impl SoftlayerSourceGraph {
    /// Cross-references requeridas del payload classic. Un `subnet_id` de
    /// instancia es opcional (puede no haberse descubierto la subnet), pero
    /// un placement group / dedicated host referenciado debe existir.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let pg_ids: std::collections::HashSet<&str> =
            self.placement_groups.iter().map(|p| p.id.as_str()).collect();
        let dh_ids: std::collections::HashSet<&str> =
            self.dedicated_hosts.iter().map(|d| d.id.as_str()).collect();

        for (i, instance) in self.instances.iter().enumerate() {
            if let Some(pg) = &instance.placement_group_id {
                if !pg_ids.contains(pg.as_str()) {
                    errors.push(FieldError::new(format!("instances[{i}].placement_group_id"),
                                                format!("unknown placement group {pg}")));
                }
            }
            if let Some(dh) = &instance.dedicated_host_id {
                if !dh_ids.contains(dh.as_str()) {
                    errors.push(FieldError::new(format!("instances[{i}].dedicated_host_id"),
                                                format!("unknown dedicated host {dh}")));
                }
            }
        }
        errors
    }
}
