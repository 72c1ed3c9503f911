//! Traducción classic (Softlayer) -> grafo de recursos con forma IBM.
//!
//! Orden de dependencias del payload classic: Subnet -> ACL (firewall) ->
//! Security Group -> SSH Key -> Dedicated Host -> Placement Group ->
//! Volume (discos secundarios) -> Instance -> Load Balancer.

use std::collections::HashMap;

use log::debug;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::error::{FieldError, TranslationError};
use crate::index::TranslatedResources;
use crate::limits::{clamp_capacity_gb, clamp_iops, derive_instance_profile, protocol_name};
use crate::output::{kind, TranslatedResource, TranslationOutput};

use super::firewall::parse_firewall_rules;
use super::schema::{SlSecurityGroupRule, SoftlayerSourceGraph};

/// Datacenters classic -> región VPC destino. Prefijo de 3 letras del
/// datacenter ("dal10" -> "dal").
static REGION_BY_DATACENTER: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("dal", "us-south"),
                   ("wdc", "us-east"),
                   ("lon", "eu-gb"),
                   ("fra", "eu-de"),
                   ("ams", "eu-de"),
                   ("tok", "jp-tok"),
                   ("osa", "jp-osa"),
                   ("syd", "au-syd"),
                   ("tor", "ca-tor"),
                   ("sao", "br-sao")])
});

/// Zona destino para un datacenter classic. Datacenter desconocido cae en
/// us-south (se reconcilia en el siguiente discovery).
pub fn zone_for_datacenter(datacenter: &str) -> String {
    let prefix: String = datacenter.chars().take(3).collect();
    let region = REGION_BY_DATACENTER.get(prefix.as_str()).copied().unwrap_or("us-south");
    format!("{region}-1")
}

/// Punto de entrada del traductor classic.
pub fn translate_softlayer(source: &Value) -> Result<TranslationOutput, TranslationError> {
    let graph: SoftlayerSourceGraph = serde_json::from_value(source.clone())
        .map_err(|e| TranslationError::validation(vec![FieldError::new("$", e.to_string())]))?;
    let errors = graph.validate();
    if !errors.is_empty() {
        return Err(TranslationError::validation(errors));
    }
    execute_translation(&graph)
}

fn execute_translation(graph: &SoftlayerSourceGraph) -> Result<TranslationOutput, TranslationError> {
    let mut index = TranslatedResources::new();
    let mut out = TranslationOutput::new();

    translate_subnets(graph, &mut index, &mut out);
    translate_firewall(graph, &mut out);
    translate_security_groups(graph, &mut index, &mut out);
    translate_ssh_keys(graph, &mut index, &mut out);
    translate_dedicated_hosts(graph, &mut index, &mut out);
    translate_placement_groups(graph, &mut index, &mut out);
    translate_volumes(graph, &mut index, &mut out);
    translate_instances(graph, &mut index, &mut out)?;
    translate_load_balancers(graph, &index, &mut out);

    debug!("softlayer translation produced {} resources", out.total());
    Ok(out)
}

fn translate_subnets(graph: &SoftlayerSourceGraph, index: &mut TranslatedResources, out: &mut TranslationOutput) {
    for subnet in &graph.subnets {
        let name = subnet.name.clone().unwrap_or_else(|| format!("classic-subnet-{}", subnet.id));
        index.register(&subnet.id, kind::SUBNET, &name);
        out.push(kind::SUBNET,
                 TranslatedResource { source_id: subnet.id.clone(),
                                      resource_json: json!({
                                          "name": name,
                                          "ipv4_cidr_block": subnet.cidr,
                                          "zone": {"name": zone_for_datacenter(&subnet.datacenter)},
                                      }),
                                      references: Default::default() });
    }
}

/// La config de firewall VRA/Vyatta (si viene) se vuelve una ACL destino.
fn translate_firewall(graph: &SoftlayerSourceGraph, out: &mut TranslationOutput) {
    let Some(config) = &graph.firewall_config else { return };
    let rules = parse_firewall_rules(config);
    if rules.is_empty() {
        debug!("firewall config present but produced no translatable rules");
        return;
    }
    out.push(kind::NETWORK_ACL,
             TranslatedResource { source_id: "classic-firewall".to_string(),
                                  resource_json: json!({
                                      "name": "classic-firewall-acl",
                                      "rules": rules,
                                  }),
                                  references: Default::default() });
}

/// Regla destino desde una regla de SG classic. `None` = salteada (IPv6 o
/// protocolo sin mapeo).
fn sg_rule_json(rule: &SlSecurityGroupRule) -> Option<Value> {
    if rule.ether_type != "IPv4" {
        debug!("skipping non-ipv4 security group rule");
        return None;
    }
    let protocol = protocol_name(rule.protocol.as_deref().unwrap_or("all"))?;
    let direction = if rule.direction == "egress" { "outbound" } else { "inbound" };
    let mut body = json!({
        "direction": direction,
        "protocol": protocol,
        "remote": {"cidr_block": rule.remote_ip.as_deref().unwrap_or("0.0.0.0/0")},
    });
    if matches!(protocol, "tcp" | "udp") {
        body["port_min"] = json!(rule.port_range_min.unwrap_or(1));
        body["port_max"] = json!(rule.port_range_max.unwrap_or(65535));
    }
    Some(body)
}

fn translate_security_groups(graph: &SoftlayerSourceGraph,
                             index: &mut TranslatedResources,
                             out: &mut TranslationOutput) {
    for sg in &graph.security_groups {
        let rules: Vec<Value> = sg.rules.iter().filter_map(sg_rule_json).collect();
        index.register(&sg.id, kind::SECURITY_GROUP, &sg.name);
        out.push(kind::SECURITY_GROUP,
                 TranslatedResource { source_id: sg.id.clone(),
                                      resource_json: json!({
                                          "name": sg.name,
                                          "rules": rules,
                                      }),
                                      references: Default::default() });
    }
}

fn translate_ssh_keys(graph: &SoftlayerSourceGraph, index: &mut TranslatedResources, out: &mut TranslationOutput) {
    for key in &graph.ssh_keys {
        index.register(&key.id, kind::SSH_KEY, &key.label);
        out.push(kind::SSH_KEY,
                 TranslatedResource { source_id: key.id.clone(),
                                      resource_json: json!({
                                          "name": key.label,
                                          "public_key": key.public_key,
                                          "type": "rsa",
                                      }),
                                      references: Default::default() });
    }
}

fn translate_dedicated_hosts(graph: &SoftlayerSourceGraph,
                             index: &mut TranslatedResources,
                             out: &mut TranslationOutput) {
    for host in &graph.dedicated_hosts {
        let profile = derive_instance_profile(host.cpus.unwrap_or(32), host.memory.unwrap_or(128 * 1024));
        index.register(&host.id, kind::DEDICATED_HOST, &host.name);
        out.push(kind::DEDICATED_HOST,
                 TranslatedResource { source_id: host.id.clone(),
                                      resource_json: json!({
                                          "name": host.name,
                                          "zone": {"name": zone_for_datacenter(&host.datacenter)},
                                          "profile": {"name": format!("{}-host", profile.family.prefix())},
                                      }),
                                      references: Default::default() });
    }
}

fn translate_placement_groups(graph: &SoftlayerSourceGraph,
                              index: &mut TranslatedResources,
                              out: &mut TranslationOutput) {
    for pg in &graph.placement_groups {
        let strategy = match pg.rule.as_deref() {
            Some("PACK") => "power_spread",
            _ => "host_spread",
        };
        index.register(&pg.id, kind::PLACEMENT_GROUP, &pg.name);
        out.push(kind::PLACEMENT_GROUP,
                 TranslatedResource { source_id: pg.id.clone(),
                                      resource_json: json!({
                                          "name": pg.name,
                                          "strategy": strategy,
                                      }),
                                      references: Default::default() });
    }
}

/// Discos secundarios de cada instancia -> volúmenes data con clamps del
/// destino. El primer disco es el de boot y va dentro de la instancia.
fn translate_volumes(graph: &SoftlayerSourceGraph, index: &mut TranslatedResources, out: &mut TranslationOutput) {
    for instance in &graph.instances {
        for (i, disk) in instance.disks.iter().enumerate().skip(1) {
            let source_id = format!("{}:disk{}", instance.id, i);
            let name = format!("{}-data{}", instance.hostname, i);
            let body = match disk.iops {
                Some(iops) => json!({
                    "name": name,
                    "capacity": clamp_capacity_gb(disk.size_gb),
                    "iops": clamp_iops(iops),
                    "profile": {"name": "custom"},
                }),
                None => json!({
                    "name": name,
                    "capacity": clamp_capacity_gb(disk.size_gb),
                    "profile": {"name": "general-purpose"},
                }),
            };
            index.register(&source_id, kind::VOLUME, &name);
            let mut references = indexmap::IndexMap::new();
            references.insert("instance".to_string(), instance.id.clone());
            out.push(kind::VOLUME,
                     TranslatedResource { source_id, resource_json: body, references });
        }
    }
}

fn translate_instances(graph: &SoftlayerSourceGraph,
                       index: &mut TranslatedResources,
                       out: &mut TranslationOutput)
                       -> Result<(), TranslationError> {
    for instance in &graph.instances {
        let name = match &instance.domain {
            Some(domain) => format!("{}-{}", instance.hostname, domain.replace('.', "-")),
            None => instance.hostname.clone(),
        };
        let profile = derive_instance_profile(instance.cpus, instance.memory);
        let mut references = indexmap::IndexMap::new();

        let mut body = json!({
            "name": name,
            "zone": {"name": zone_for_datacenter(&instance.datacenter)},
            "profile": {"name": profile.name()},
        });

        // subnet descubierta: opcional (puede faltar en el payload classic)
        if let Some(subnet_id) = &instance.subnet_id {
            match index.resolve(subnet_id) {
                Some(subnet) => {
                    body["primary_network_interface"] = json!({
                        "name": "eth0",
                        "primary": true,
                        "subnet": {"name": subnet.name},
                    });
                    references.insert("subnet".to_string(), subnet_id.clone());
                }
                None => debug!("instance {}: subnet {subnet_id} not discovered, interface deferred",
                               instance.id),
            }
        }

        let security_groups: Vec<Value> = instance
            .security_group_ids
            .iter()
            .filter_map(|sg_id| index.resolve(sg_id).map(|r| json!({"name": r.name})))
            .collect();
        if !security_groups.is_empty() && body.get("primary_network_interface").is_some() {
            body["primary_network_interface"]["security_groups"] = json!(security_groups);
        }

        if let Some(boot) = instance.disks.first() {
            body["boot_volume_attachment"] = json!({
                "volume": {
                    "name": format!("{}-boot", instance.hostname),
                    "capacity": clamp_capacity_gb(boot.size_gb),
                    "profile": {"name": "general-purpose"},
                }
            });
        }
        let attachments: Vec<Value> = instance
            .disks
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, _)| {
                index.resolve(&format!("{}:disk{}", instance.id, i))
                     .map(|v| json!({"volume": {"name": v.name}}))
            })
            .collect();
        if !attachments.is_empty() {
            body["volume_attachments"] = json!(attachments);
        }

        let keys: Vec<Value> = instance
            .ssh_key_ids
            .iter()
            .filter_map(|kid| index.resolve(kid).map(|k| json!({"name": k.name})))
            .collect();
        if !keys.is_empty() {
            body["keys"] = json!(keys);
        }

        // placement group / dedicated host: validados en el esquema, acá son
        // requeridos si están referenciados
        if let Some(pg_id) = &instance.placement_group_id {
            let pg = index.require(pg_id, kind::PLACEMENT_GROUP, &format!("instance {}", instance.id))?;
            body["placement_target"] = json!({"name": pg.name.clone()});
            references.insert("placement_group".to_string(), pg_id.clone());
        }
        if let Some(dh_id) = &instance.dedicated_host_id {
            let dh = index.require(dh_id, kind::DEDICATED_HOST, &format!("instance {}", instance.id))?;
            body["placement_target"] = json!({"name": dh.name.clone()});
            references.insert("dedicated_host".to_string(), dh_id.clone());
        }
        if let Some(os) = &instance.operating_system {
            body["image"] = json!({"name": os});
        }

        index.register(&instance.id, kind::INSTANCE, &name);
        out.push(kind::INSTANCE,
                 TranslatedResource { source_id: instance.id.clone(), resource_json: body, references });
    }
    Ok(())
}

fn translate_load_balancers(graph: &SoftlayerSourceGraph, index: &TranslatedResources, out: &mut TranslationOutput) {
    for lb in &graph.load_balancers {
        let mut references = indexmap::IndexMap::new();
        let subnets: Vec<Value> = lb.subnet_id
                                    .iter()
                                    .filter_map(|sid| {
                                        let resolved = index.resolve(sid);
                                        if resolved.is_some() {
                                            references.insert("subnet".to_string(), sid.clone());
                                        }
                                        resolved.map(|s| json!({"name": s.name}))
                                    })
                                    .collect();
        // un pool por listener; miembros no resueltos a instancia se saltean
        let mut pools = Vec::new();
        let mut listeners = Vec::new();
        for listener in &lb.listeners {
            let protocol = match listener.protocol.to_ascii_lowercase().as_str() {
                "http" => "http",
                "https" => "https",
                "tcp" => "tcp",
                "udp" => "udp",
                other => {
                    debug!("lb {}: listener protocol {other} not supported, skipped", lb.id);
                    continue;
                }
            };
            let pool_name = format!("{}-{}-pool", lb.name, listener.port);
            let members: Vec<Value> = listener
                .members
                .iter()
                .filter_map(|m| {
                    let resolved = index.resolve(m);
                    if resolved.is_none() {
                        debug!("lb {}: pool member {m} unresolved, skipped", lb.id);
                    }
                    resolved.map(|r| json!({"target": {"name": r.name},
                                            "port": listener.backend_port.unwrap_or(listener.port)}))
                })
                .collect();
            pools.push(json!({
                "name": pool_name.clone(),
                "protocol": protocol,
                "algorithm": "round_robin",
                "members": members,
            }));
            listeners.push(json!({
                "protocol": protocol,
                "port": listener.port,
                "default_pool": {"name": pool_name},
            }));
        }
        out.push(kind::LOAD_BALANCER,
                 TranslatedResource { source_id: lb.id.clone(),
                                      resource_json: json!({
                                          "name": lb.name,
                                          "is_public": lb.is_public,
                                          "subnets": subnets,
                                          "pools": pools,
                                          "listeners": listeners,
                                      }),
                                      references });
    }
}
