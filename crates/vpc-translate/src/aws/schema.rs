//! Esquema estricto del grafo fuente AWS.
//!
//! `deny_unknown_fields` en todos los structs: un campo desconocido es error
//! de validación, no se ignora. `validate()` chequea las cross-references
//! REQUERIDAS y devuelve la lista completa de errores de campo.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::error::FieldError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSourceGraph {
    #[serde(default)]
    pub vpcs: Vec<AwsVpc>,
    #[serde(default)]
    pub subnets: Vec<AwsSubnet>,
    #[serde(default)]
    pub security_groups: Vec<AwsSecurityGroup>,
    #[serde(default)]
    pub acls: Vec<AwsAcl>,
    #[serde(default)]
    pub route_tables: Vec<AwsRouteTable>,
    #[serde(default)]
    pub instances: Vec<AwsInstance>,
    #[serde(default)]
    pub volumes: Vec<AwsVolume>,
    #[serde(default)]
    pub load_balancers: Vec<AwsLoadBalancer>,
    #[serde(default)]
    pub eks_clusters: Vec<AwsEksCluster>,
    #[serde(default)]
    pub vpn_gateways: Vec<AwsVpnGateway>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsVpc {
    pub vpc_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub cidr_block: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSubnet {
    pub subnet_id: String,
    pub vpc_id: String,
    pub cidr_block: String,
    pub availability_zone: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSecurityGroup {
    pub group_id: String,
    pub group_name: String,
    pub vpc_id: String,
    #[serde(default)]
    pub ingress: Vec<AwsSgRule>,
    #[serde(default)]
    pub egress: Vec<AwsSgRule>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSgRule {
    /// Número ("6", "-1") o nombre ("tcp") de protocolo.
    pub protocol: String,
    #[serde(default)]
    pub from_port: Option<u16>,
    #[serde(default)]
    pub to_port: Option<u16>,
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
    #[serde(default)]
    pub ipv6_cidr_blocks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsAcl {
    pub acl_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub entries: Vec<AwsAclEntry>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsAclEntry {
    pub rule_number: u32,
    pub protocol: String,
    /// "allow" | "deny"
    pub action: String,
    #[serde(default)]
    pub egress: bool,
    #[serde(default)]
    pub cidr_block: Option<String>,
    #[serde(default)]
    pub ipv6_cidr_block: Option<String>,
    #[serde(default)]
    pub from_port: Option<u16>,
    #[serde(default)]
    pub to_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsRouteTable {
    pub route_table_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub routes: Vec<AwsRoute>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsRoute {
    #[serde(default)]
    pub destination_cidr_block: Option<String>,
    #[serde(default)]
    pub destination_ipv6_cidr_block: Option<String>,
    #[serde(default)]
    pub gateway_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsInstance {
    pub instance_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub vpc_id: String,
    pub subnet_id: String,
    #[serde(default)]
    pub image_id: Option<String>,
    pub cpu_count: u64,
    pub memory_mib: u64,
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    #[serde(default)]
    pub volume_ids: Vec<String>,
    #[serde(default)]
    pub network_interfaces: Vec<AwsNetworkInterface>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsNetworkInterface {
    pub interface_id: String,
    pub subnet_id: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub private_ip: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsVolume {
    pub volume_id: String,
    pub size_gb: u64,
    #[serde(default)]
    pub iops: Option<u64>,
    #[serde(default)]
    pub volume_type: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsLoadBalancer {
    pub lb_id: String,
    pub name: String,
    /// "internet-facing" | "internal"
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub listeners: Vec<AwsListener>,
    #[serde(default)]
    pub target_groups: Vec<AwsTargetGroup>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsListener {
    pub protocol: String,
    pub port: u16,
    #[serde(default)]
    pub target_group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsTargetGroup {
    pub target_group_id: String,
    pub protocol: String,
    pub port: u16,
    /// Ids de instancia miembros (relación OPCIONAL: un miembro no resuelto
    /// se saltea).
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsEksCluster {
    pub cluster_name: String,
    pub vpc_id: String,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    #[serde(default)]
    pub kubernetes_version: Option<String>,
    #[serde(default)]
    pub node_groups: Vec<AwsEksNodeGroup>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsEksNodeGroup {
    pub name: String,
    #[serde(default)]
    pub desired_size: u64,
    #[serde(default)]
    pub cpu_count: Option<u64>,
    #[serde(default)]
    pub memory_mib: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsVpnGateway {
    pub vpn_gateway_id: String,
    pub vpc_id: String,
    #[serde(default)]
    pub connections: Vec<AwsVpnConnection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsVpnConnection {
    pub connection_id: String,
    pub peer_address: String,
    #[serde(default)]
    pub local_cidrs: Vec<String>,
    #[serde(default)]
    pub peer_cidrs: Vec<String>,
}

impl AwsSourceGraph {
    /// Valida las cross-references requeridas. Devuelve TODOS los errores de
    /// campo, no sólo el primero.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let vpc_ids: HashSet<&str> = self.vpcs.iter().map(|v| v.vpc_id.as_str()).collect();
        let subnet_ids: HashSet<&str> = self.subnets.iter().map(|s| s.subnet_id.as_str()).collect();

        for (i, subnet) in self.subnets.iter().enumerate() {
            if !vpc_ids.contains(subnet.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("subnets[{i}].vpc_id"),
                                            format!("unknown vpc {}", subnet.vpc_id)));
            }
        }
        for (i, sg) in self.security_groups.iter().enumerate() {
            if !vpc_ids.contains(sg.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("security_groups[{i}].vpc_id"),
                                            format!("unknown vpc {}", sg.vpc_id)));
            }
        }
        for (i, acl) in self.acls.iter().enumerate() {
            if !vpc_ids.contains(acl.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("acls[{i}].vpc_id"), format!("unknown vpc {}", acl.vpc_id)));
            }
        }
        for (i, rt) in self.route_tables.iter().enumerate() {
            if !vpc_ids.contains(rt.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("route_tables[{i}].vpc_id"),
                                            format!("unknown vpc {}", rt.vpc_id)));
            }
        }
        for (i, instance) in self.instances.iter().enumerate() {
            if !vpc_ids.contains(instance.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("instances[{i}].vpc_id"),
                                            format!("unknown vpc {}", instance.vpc_id)));
            }
            if !subnet_ids.contains(instance.subnet_id.as_str()) {
                errors.push(FieldError::new(format!("instances[{i}].subnet_id"),
                                            format!("unknown subnet {}", instance.subnet_id)));
            }
        }
        for (i, eks) in self.eks_clusters.iter().enumerate() {
            if !vpc_ids.contains(eks.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("eks_clusters[{i}].vpc_id"),
                                            format!("unknown vpc {}", eks.vpc_id)));
            }
        }
        for (i, vpn) in self.vpn_gateways.iter().enumerate() {
            if !vpc_ids.contains(vpn.vpc_id.as_str()) {
                errors.push(FieldError::new(format!("vpn_gateways[{i}].vpc_id"),
                                            format!("unknown vpc {}", vpn.vpc_id)));
            }
        }
        errors
    }
}

/// Tags que delatan recursos administrados por un control plane Kubernetes
/// existente: se EXCLUYEN de la traducción (el destino no los reconstruye).
pub fn is_kubernetes_managed(tags: &HashMap<String, String>) -> bool {
    tags.keys()
        .any(|k| k.starts_with("kubernetes.io/cluster/") || k.starts_with("aws:eks:"))
}
