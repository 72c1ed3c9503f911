//! Traducción AWS -> grafo de recursos con forma IBM.
//!
//! Los constructs se procesan en orden de dependencias: VPC -> Public
//! Gateway -> Subnet -> ACL -> Route Table -> Security Group -> Volume ->
//! Instance -> VPN -> Kubernetes -> Load Balancer. Cada uno se registra en
//! el índice compartido al crearse; los posteriores resuelven sus foreign
//! keys sólo a través del índice.

use std::collections::HashMap;

use log::{debug, warn};
use serde_json::{json, Value};

use crate::error::{FieldError, TranslationError};
use crate::index::TranslatedResources;
use crate::limits::{clamp_capacity_gb, clamp_iops, derive_instance_profile, protocol_name};
use crate::output::{kind, TranslatedResource, TranslationOutput};

use super::schema::{is_kubernetes_managed, AwsAclEntry, AwsSgRule, AwsSourceGraph};

/// Punto de entrada: valida el payload fuente y traduce el grafo completo.
/// La validación es todo-o-nada: ningún efecto parcial si falla.
pub fn translate_aws(source: &Value) -> Result<TranslationOutput, TranslationError> {
    let graph: AwsSourceGraph = serde_json::from_value(source.clone())
        .map_err(|e| TranslationError::validation(vec![FieldError::new("$", e.to_string())]))?;
    let errors = graph.validate();
    if !errors.is_empty() {
        return Err(TranslationError::validation(errors));
    }
    execute_translation(&graph)
}

fn execute_translation(graph: &AwsSourceGraph) -> Result<TranslationOutput, TranslationError> {
    let mut index = TranslatedResources::new();
    let mut out = TranslationOutput::new();
    // primera subnet traducida por vpc (ancla para VPN gateways)
    let mut first_subnet_by_vpc: HashMap<String, String> = HashMap::new();

    translate_vpcs(graph, &mut index, &mut out);
    translate_public_gateways(graph, &mut index, &mut out)?;
    translate_subnets(graph, &mut index, &mut out, &mut first_subnet_by_vpc)?;
    translate_acls(graph, &mut index, &mut out)?;
    translate_route_tables(graph, &mut index, &mut out)?;
    translate_security_groups(graph, &mut index, &mut out)?;
    translate_volumes(graph, &mut index, &mut out);
    translate_instances(graph, &mut index, &mut out)?;
    translate_vpn_gateways(graph, &index, &mut out, &first_subnet_by_vpc)?;
    translate_eks_clusters(graph, &mut index, &mut out)?;
    translate_load_balancers(graph, &index, &mut out);

    debug!("aws translation produced {} resources", out.total());
    Ok(out)
}

fn display_name<'a>(tags: &'a HashMap<String, String>, explicit: Option<&'a str>, fallback: &'a str) -> &'a str {
    explicit.or_else(|| tags.get("Name").map(String::as_str)).unwrap_or(fallback)
}

fn translate_vpcs(graph: &AwsSourceGraph, index: &mut TranslatedResources, out: &mut TranslationOutput) {
    for vpc in &graph.vpcs {
        let name = display_name(&vpc.tags, vpc.name.as_deref(), &vpc.vpc_id).to_string();
        index.register(&vpc.vpc_id, kind::VPC, &name);
        out.push(kind::VPC,
                 TranslatedResource { source_id: vpc.vpc_id.clone(),
                                      resource_json: json!({
                                          "name": name,
                                          "address_prefix_management": "manual",
                                          "address_prefixes": [{"cidr": vpc.cidr_block}],
                                      }),
                                      references: Default::default() });
    }
}

/// AWS no tiene public gateways por zona: se sintetiza uno por (vpc, zona)
/// con al menos una subnet pública.
fn translate_public_gateways(graph: &AwsSourceGraph,
                             index: &mut TranslatedResources,
                             out: &mut TranslationOutput)
                             -> Result<(), TranslationError> {
    for subnet in graph.subnets.iter().filter(|s| s.public) {
        let source_id = format!("pgw:{}:{}", subnet.vpc_id, subnet.availability_zone);
        if index.resolve(&source_id).is_some() {
            continue;
        }
        let vpc = index.require(&subnet.vpc_id, kind::VPC, &format!("public gateway for {}", subnet.subnet_id))?;
        let vpc_name = vpc.name.clone();
        let name = format!("{}-{}-pgw", vpc_name, subnet.availability_zone);
        index.register(&source_id, kind::PUBLIC_GATEWAY, &name);
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), subnet.vpc_id.clone());
        out.push(kind::PUBLIC_GATEWAY,
                 TranslatedResource { source_id,
                                      resource_json: json!({
                                          "name": name,
                                          "vpc": {"name": vpc_name},
                                          "zone": {"name": subnet.availability_zone},
                                      }),
                                      references });
    }
    Ok(())
}

fn translate_subnets(graph: &AwsSourceGraph,
                     index: &mut TranslatedResources,
                     out: &mut TranslationOutput,
                     first_subnet_by_vpc: &mut HashMap<String, String>)
                     -> Result<(), TranslationError> {
    for subnet in &graph.subnets {
        let name = display_name(&subnet.tags, None, &subnet.subnet_id).to_string();
        // relación REQUERIDA: subnet sin VPC padre es fallo duro
        let vpc = index.require(&subnet.vpc_id, kind::VPC, &format!("subnet {}", subnet.subnet_id))?;
        let vpc_name = vpc.name.clone();
        let mut body = json!({
            "name": name,
            "ipv4_cidr_block": subnet.cidr_block,
            "zone": {"name": subnet.availability_zone},
            "vpc": {"name": vpc_name},
        });
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), subnet.vpc_id.clone());
        if subnet.public {
            let pgw_id = format!("pgw:{}:{}", subnet.vpc_id, subnet.availability_zone);
            if let Some(pgw) = index.resolve(&pgw_id) {
                body["public_gateway"] = json!({"name": pgw.name});
                references.insert("public_gateway".to_string(), pgw_id);
            }
        }
        index.register(&subnet.subnet_id, kind::SUBNET, &name);
        first_subnet_by_vpc.entry(subnet.vpc_id.clone()).or_insert_with(|| subnet.subnet_id.clone());
        out.push(kind::SUBNET,
                 TranslatedResource { source_id: subnet.subnet_id.clone(), resource_json: body, references });
    }
    Ok(())
}

/// Regla ACL destino desde una entry fuente. `None` = entry salteada
/// (IPv6 o protocolo sin mapeo).
fn acl_rule_json(entry: &AwsAclEntry) -> Option<Value> {
    if entry.cidr_block.is_none() {
        if entry.ipv6_cidr_block.is_some() {
            debug!("skipping ipv6 acl entry {}", entry.rule_number);
        }
        return None;
    }
    let protocol = match protocol_name(&entry.protocol) {
        Some(p) => p,
        None => {
            debug!("skipping acl entry {} with unmapped protocol {}", entry.rule_number, entry.protocol);
            return None;
        }
    };
    let cidr = entry.cidr_block.clone().unwrap();
    let direction = if entry.egress { "outbound" } else { "inbound" };
    let mut rule = json!({
        "name": format!("rule-{}", entry.rule_number),
        "action": if entry.action == "allow" { "allow" } else { "deny" },
        "direction": direction,
        "protocol": protocol,
        "source": if entry.egress { "0.0.0.0/0" } else { cidr.as_str() },
        "destination": if entry.egress { cidr.as_str() } else { "0.0.0.0/0" },
    });
    if matches!(protocol, "tcp" | "udp") {
        rule["destination_port_min"] = json!(entry.from_port.unwrap_or(1));
        rule["destination_port_max"] = json!(entry.to_port.unwrap_or(65535));
    }
    Some(rule)
}

fn translate_acls(graph: &AwsSourceGraph,
                  index: &mut TranslatedResources,
                  out: &mut TranslationOutput)
                  -> Result<(), TranslationError> {
    for acl in &graph.acls {
        let vpc = index.require(&acl.vpc_id, kind::VPC, &format!("acl {}", acl.acl_id))?;
        let vpc_name = vpc.name.clone();
        let name = display_name(&acl.tags, None, &acl.acl_id).to_string();
        let rules: Vec<Value> = acl.entries.iter().filter_map(acl_rule_json).collect();
        index.register(&acl.acl_id, kind::NETWORK_ACL, &name);
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), acl.vpc_id.clone());
        out.push(kind::NETWORK_ACL,
                 TranslatedResource { source_id: acl.acl_id.clone(),
                                      resource_json: json!({
                                          "name": name,
                                          "vpc": {"name": vpc_name},
                                          "rules": rules,
                                      }),
                                      references });
    }
    Ok(())
}

fn translate_route_tables(graph: &AwsSourceGraph,
                          index: &mut TranslatedResources,
                          out: &mut TranslationOutput)
                          -> Result<(), TranslationError> {
    for rt in &graph.route_tables {
        let vpc = index.require(&rt.vpc_id, kind::VPC, &format!("route table {}", rt.route_table_id))?;
        let vpc_name = vpc.name.clone();
        let name = display_name(&rt.tags, None, &rt.route_table_id).to_string();
        let routes: Vec<Value> = rt.routes
                                   .iter()
                                   .filter_map(|r| {
                                       // sólo rangos IPv4
                                       let destination = r.destination_cidr_block.as_ref()?;
                                       Some(json!({
                                           "name": format!("route-{}", destination.replace(['/', '.'], "-")),
                                           "destination": destination,
                                           "action": "deliver",
                                       }))
                                   })
                                   .collect();
        index.register(&rt.route_table_id, kind::ROUTE_TABLE, &name);
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), rt.vpc_id.clone());
        out.push(kind::ROUTE_TABLE,
                 TranslatedResource { source_id: rt.route_table_id.clone(),
                                      resource_json: json!({
                                          "name": name,
                                          "vpc": {"name": vpc_name},
                                          "routes": routes,
                                      }),
                                      references });
    }
    Ok(())
}

/// Regla de security group destino. `None` = regla salteada (IPv6-only o
/// protocolo sin mapeo).
fn sg_rule_json(rule: &AwsSgRule, direction: &str) -> Vec<Value> {
    let protocol = match protocol_name(&rule.protocol) {
        Some(p) => p,
        None => {
            debug!("skipping sg rule with unmapped protocol {}", rule.protocol);
            return Vec::new();
        }
    };
    if rule.cidr_blocks.is_empty() && !rule.ipv6_cidr_blocks.is_empty() {
        debug!("skipping ipv6-only sg rule");
        return Vec::new();
    }
    rule.cidr_blocks
        .iter()
        .map(|cidr| {
            let mut body = json!({
                "direction": direction,
                "protocol": protocol,
                "remote": {"cidr_block": cidr},
            });
            if matches!(protocol, "tcp" | "udp") {
                body["port_min"] = json!(rule.from_port.unwrap_or(1));
                body["port_max"] = json!(rule.to_port.unwrap_or(65535));
            }
            body
        })
        .collect()
}

fn translate_security_groups(graph: &AwsSourceGraph,
                             index: &mut TranslatedResources,
                             out: &mut TranslationOutput)
                             -> Result<(), TranslationError> {
    for sg in &graph.security_groups {
        // grupos del control plane Kubernetes: el destino no los reconstruye
        if is_kubernetes_managed(&sg.tags) {
            debug!("excluding kubernetes-managed security group {}", sg.group_id);
            continue;
        }
        let vpc = index.require(&sg.vpc_id, kind::VPC, &format!("security group {}", sg.group_id))?;
        let vpc_name = vpc.name.clone();
        let mut rules: Vec<Value> = Vec::new();
        for rule in &sg.ingress {
            rules.extend(sg_rule_json(rule, "inbound"));
        }
        for rule in &sg.egress {
            rules.extend(sg_rule_json(rule, "outbound"));
        }
        index.register(&sg.group_id, kind::SECURITY_GROUP, &sg.group_name);
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), sg.vpc_id.clone());
        out.push(kind::SECURITY_GROUP,
                 TranslatedResource { source_id: sg.group_id.clone(),
                                      resource_json: json!({
                                          "name": sg.group_name,
                                          "vpc": {"name": vpc_name},
                                          "rules": rules,
                                      }),
                                      references });
    }
    Ok(())
}

fn translate_volumes(graph: &AwsSourceGraph, index: &mut TranslatedResources, out: &mut TranslationOutput) {
    for volume in &graph.volumes {
        let name = display_name(&volume.tags, None, &volume.volume_id).to_string();
        let capacity = clamp_capacity_gb(volume.size_gb);
        let body = match volume.iops {
            Some(iops) => json!({
                "name": name,
                "capacity": capacity,
                "iops": clamp_iops(iops),
                "profile": {"name": "custom"},
            }),
            None => json!({
                "name": name,
                "capacity": capacity,
                "profile": {"name": "general-purpose"},
            }),
        };
        index.register(&volume.volume_id, kind::VOLUME, &name);
        out.push(kind::VOLUME,
                 TranslatedResource { source_id: volume.volume_id.clone(),
                                      resource_json: body,
                                      references: Default::default() });
    }
}

fn translate_instances(graph: &AwsSourceGraph,
                       index: &mut TranslatedResources,
                       out: &mut TranslationOutput)
                       -> Result<(), TranslationError> {
    for instance in &graph.instances {
        if is_kubernetes_managed(&instance.tags) {
            debug!("excluding kubernetes-managed instance {}", instance.instance_id);
            continue;
        }
        let name = display_name(&instance.tags, instance.name.as_deref(), &instance.instance_id).to_string();
        let vpc = index.require(&instance.vpc_id, kind::VPC, &format!("instance {}", instance.instance_id))?;
        let vpc_name = vpc.name.clone();
        let subnet = index.require(&instance.subnet_id, kind::SUBNET, &format!("instance {}", instance.instance_id))?;
        let subnet_name = subnet.name.clone();
        let profile = derive_instance_profile(instance.cpu_count, instance.memory_mib);

        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), instance.vpc_id.clone());
        references.insert("subnet".to_string(), instance.subnet_id.clone());

        // security groups: relación opcional, un id no resuelto se saltea
        let security_groups: Vec<Value> = instance
            .security_group_ids
            .iter()
            .filter_map(|sg_id| {
                let resolved = index.resolve(sg_id);
                if resolved.is_none() {
                    debug!("instance {}: unresolved security group {sg_id}, skipped", instance.instance_id);
                }
                resolved.map(|r| json!({"name": r.name}))
            })
            .collect();

        // NIC primaria desde la subnet del instance; secundarias desde
        // network_interfaces (subnet no resuelta = NIC salteada)
        let mut interfaces = vec![json!({
            "name": "eth0",
            "primary": true,
            "subnet": {"name": subnet_name},
        })];
        for (i, nic) in instance.network_interfaces.iter().filter(|n| !n.primary).enumerate() {
            match index.resolve(&nic.subnet_id) {
                Some(s) => {
                    let mut body = json!({
                        "name": format!("eth{}", i + 1),
                        "primary": false,
                        "subnet": {"name": s.name},
                    });
                    if let Some(ip) = &nic.private_ip {
                        body["primary_ip"] = json!({"address": ip});
                    }
                    references.insert(format!("network_interfaces[{}].subnet", i + 1), nic.subnet_id.clone());
                    interfaces.push(body);
                }
                None => debug!("instance {}: nic {} subnet unresolved, skipped",
                               instance.instance_id,
                               nic.interface_id),
            }
        }

        // attachments de volumen: relación opcional
        let volume_attachments: Vec<Value> = instance
            .volume_ids
            .iter()
            .filter_map(|vol_id| index.resolve(vol_id).map(|v| json!({"volume": {"name": v.name}})))
            .collect();

        let mut body = json!({
            "name": name,
            "vpc": {"name": vpc_name},
            "zone": {"name": graph.subnets.iter().find(|s| s.subnet_id == instance.subnet_id)
                                  .map(|s| s.availability_zone.as_str()).unwrap_or_default()},
            "profile": {"name": profile.name()},
            "primary_network_interface": interfaces[0].clone(),
            "network_interfaces": interfaces[1..].to_vec(),
            "volume_attachments": volume_attachments,
        });
        if !security_groups.is_empty() {
            body["primary_network_interface"]["security_groups"] = json!(security_groups);
        }
        if let Some(image) = &instance.image_id {
            body["image"] = json!({"id": image});
        }

        index.register(&instance.instance_id, kind::INSTANCE, &name);
        out.push(kind::INSTANCE,
                 TranslatedResource { source_id: instance.instance_id.clone(), resource_json: body, references });
    }
    Ok(())
}

fn translate_vpn_gateways(graph: &AwsSourceGraph,
                          index: &TranslatedResources,
                          out: &mut TranslationOutput,
                          first_subnet_by_vpc: &HashMap<String, String>)
                          -> Result<(), TranslationError> {
    for vpn in &graph.vpn_gateways {
        let vpc = index.require(&vpn.vpc_id, kind::VPC, &format!("vpn gateway {}", vpn.vpn_gateway_id))?;
        let vpc_name = vpc.name.clone();
        // el gateway destino ancla en una subnet del vpc; sin subnets no hay
        // dónde colocarlo
        let anchor_subnet = match first_subnet_by_vpc.get(&vpn.vpc_id).and_then(|sid| index.resolve(sid)) {
            Some(s) => s.name.clone(),
            None => {
                warn!("vpn gateway {} skipped: vpc {} has no translated subnets",
                      vpn.vpn_gateway_id,
                      vpc_name);
                continue;
            }
        };
        let connections: Vec<Value> = vpn.connections
                                         .iter()
                                         .map(|c| {
                                             json!({
                                                 "name": c.connection_id,
                                                 "peer_address": c.peer_address,
                                                 "local_cidrs": c.local_cidrs,
                                                 "peer_cidrs": c.peer_cidrs,
                                             })
                                         })
                                         .collect();
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), vpn.vpc_id.clone());
        out.push(kind::VPN_GATEWAY,
                 TranslatedResource { source_id: vpn.vpn_gateway_id.clone(),
                                      resource_json: json!({
                                          "name": vpn.vpn_gateway_id,
                                          "subnet": {"name": anchor_subnet},
                                          "connections": connections,
                                      }),
                                      references });
    }
    Ok(())
}

fn translate_eks_clusters(graph: &AwsSourceGraph,
                          index: &mut TranslatedResources,
                          out: &mut TranslationOutput)
                          -> Result<(), TranslationError> {
    for eks in &graph.eks_clusters {
        let vpc = index.require(&eks.vpc_id, kind::VPC, &format!("eks cluster {}", eks.cluster_name))?;
        let vpc_name = vpc.name.clone();
        let subnets: Vec<Value> = eks.subnet_ids
                                     .iter()
                                     .filter_map(|sid| index.resolve(sid).map(|s| json!({"name": s.name})))
                                     .collect();
        let worker_pools: Vec<Value> = eks.node_groups
                                          .iter()
                                          .map(|ng| {
                                              let profile = derive_instance_profile(ng.cpu_count.unwrap_or(4),
                                                                                    ng.memory_mib.unwrap_or(16 * 1024));
                                              json!({
                                                  "name": ng.name,
                                                  "worker_count": ng.desired_size.max(1),
                                                  "flavor": profile.name(),
                                              })
                                          })
                                          .collect();
        index.register(&eks.cluster_name, kind::KUBERNETES_CLUSTER, &eks.cluster_name);
        let mut references = indexmap::IndexMap::new();
        references.insert("vpc".to_string(), eks.vpc_id.clone());
        out.push(kind::KUBERNETES_CLUSTER,
                 TranslatedResource { source_id: eks.cluster_name.clone(),
                                      resource_json: json!({
                                          "name": eks.cluster_name,
                                          "vpc": {"name": vpc_name},
                                          "kube_version": eks.kubernetes_version,
                                          "subnets": subnets,
                                          "worker_pools": worker_pools,
                                      }),
                                      references });
    }
    Ok(())
}

/// Protocolos de listener/pool del destino (distintos de la tabla numérica
/// de ACL/SG). `None` = listener/pool salteado.
fn lb_protocol(protocol: &str) -> Option<&'static str> {
    match protocol.to_ascii_lowercase().as_str() {
        "http" => Some("http"),
        "https" => Some("https"),
        "tcp" => Some("tcp"),
        "udp" => Some("udp"),
        _ => None,
    }
}

fn translate_load_balancers(graph: &AwsSourceGraph, index: &TranslatedResources, out: &mut TranslationOutput) {
    for lb in &graph.load_balancers {
        let subnets: Vec<Value> = lb.subnet_ids
                                    .iter()
                                    .filter_map(|sid| index.resolve(sid).map(|s| json!({"name": s.name})))
                                    .collect();
        // pools desde target groups; miembros no resueltos se saltean
        let pools: Vec<Value> = lb.target_groups
                                  .iter()
                                  .filter_map(|tg| {
                                      let protocol = lb_protocol(&tg.protocol)?;
                                      let members: Vec<Value> = tg.targets
                                                                  .iter()
                                                                  .filter_map(|t| {
                                                                      let resolved = index.resolve(t);
                                                                      if resolved.is_none() {
                                                                          debug!("lb {}: pool member {t} unresolved, skipped",
                                                                                 lb.lb_id);
                                                                      }
                                                                      resolved.map(|r| json!({"target": {"name": r.name},
                                                                                              "port": tg.port}))
                                                                  })
                                                                  .collect();
                                      Some(json!({
                                          "name": tg.target_group_id,
                                          "protocol": protocol,
                                          "algorithm": "round_robin",
                                          "members": members,
                                      }))
                                  })
                                  .collect();
        let listeners: Vec<Value> = lb.listeners
                                      .iter()
                                      .filter_map(|l| {
                                          let protocol = lb_protocol(&l.protocol)?;
                                          let mut body = json!({
                                              "protocol": protocol,
                                              "port": l.port,
                                          });
                                          if let Some(tg) = &l.target_group_id {
                                              body["default_pool"] = json!({"name": tg});
                                          }
                                          Some(body)
                                      })
                                      .collect();
        let mut references = indexmap::IndexMap::new();
        for (i, sid) in lb.subnet_ids.iter().enumerate() {
            references.insert(format!("subnets[{i}]"), sid.clone());
        }
        out.push(kind::LOAD_BALANCER,
                 TranslatedResource { source_id: lb.lb_id.clone(),
                                      resource_json: json!({
                                          "name": lb.name,
                                          "is_public": lb.scheme.as_deref() == Some("internet-facing"),
                                          "subnets": subnets,
                                          "pools": pools,
                                          "listeners": listeners,
                                      }),
                                      references });
    }
}
