//! Parser del texto de configuración de firewall VRA/Vyatta.
//!
//! Formato fuente (líneas `set firewall ...`):
//!
//! ```text
//! set firewall name ALLOW-WEB rule 10 action accept
//! set firewall name ALLOW-WEB rule 10 protocol tcp
//! set firewall name ALLOW-WEB rule 10 destination port 443
//! set firewall name ALLOW-WEB rule 10 source address 10.0.0.0/8
//! ```
//!
//! Sólo se toma `firewall name` (IPv4); `firewall ipv6-name` se saltea
//! completo. Protocolos fuera de la tabla fija descartan la regla.

use std::collections::BTreeMap;

use log::debug;
use serde_json::{json, Value};

use crate::limits::protocol_name;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FirewallRule {
    action: Option<String>,
    protocol: Option<String>,
    source_address: Option<String>,
    destination_address: Option<String>,
    destination_port: Option<u16>,
}

/// Parsea el texto VRA/Vyatta a reglas de ACL destino, en orden (nombre de
/// firewall, número de regla).
pub fn parse_firewall_rules(config: &str) -> Vec<Value> {
    // (firewall, rule_number) -> regla acumulada línea a línea
    let mut rules: BTreeMap<(String, u32), FirewallRule> = BTreeMap::new();

    for line in config.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        // set firewall name <NAME> rule <N> <attr...>
        match tokens.as_slice() {
            ["set", "firewall", "name", name, "rule", number, rest @ ..] => {
                let number: u32 = match number.parse() {
                    Ok(n) => n,
                    Err(_) => continue,
                };
                let entry = rules.entry((name.to_string(), number)).or_default();
                match rest {
                    ["action", action] => entry.action = Some(action.to_string()),
                    ["protocol", protocol] => entry.protocol = Some(protocol.to_string()),
                    ["source", "address", address] => entry.source_address = Some(address.to_string()),
                    ["destination", "address", address] => entry.destination_address = Some(address.to_string()),
                    ["destination", "port", port] => entry.destination_port = port.parse().ok(),
                    _ => {}
                }
            }
            ["set", "firewall", "ipv6-name", ..] => {
                debug!("skipping ipv6 firewall line");
            }
            _ => {}
        }
    }

    rules.into_iter()
         .filter_map(|((name, number), rule)| {
             let action = match rule.action.as_deref() {
                 Some("accept") => "allow",
                 Some("drop") | Some("reject") => "deny",
                 _ => return None, // regla incompleta
             };
             let protocol = match protocol_name(rule.protocol.as_deref().unwrap_or("all")) {
                 Some(p) => p,
                 None => {
                     debug!("skipping firewall rule {name}/{number} with unmapped protocol");
                     return None;
                 }
             };
             let mut body = json!({
                 "name": format!("{}-{}", name.to_lowercase(), number),
                 "action": action,
                 "direction": "inbound",
                 "protocol": protocol,
                 "source": rule.source_address.as_deref().unwrap_or("0.0.0.0/0"),
                 "destination": rule.destination_address.as_deref().unwrap_or("0.0.0.0/0"),
             });
             if let Some(port) = rule.destination_port {
                 body["destination_port_min"] = json!(port);
                 body["destination_port_max"] = json!(port);
             }
             Some(body)
         })
         .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
set firewall name ALLOW-WEB rule 10 action accept
set firewall name ALLOW-WEB rule 10 protocol tcp
set firewall name ALLOW-WEB rule 10 destination port 443
set firewall name ALLOW-WEB rule 10 source address 10.0.0.0/8
set firewall name ALLOW-WEB rule 20 action drop
set firewall name ALLOW-WEB rule 20 protocol gre
set firewall ipv6-name ALLOW-WEB6 rule 10 action accept
";

    #[test]
    fn parses_ipv4_rules_and_skips_rest() {
        let rules = parse_firewall_rules(SAMPLE);
        // la regla 20 (gre, sin mapeo) y la ipv6 se descartan
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule["name"], "allow-web-10");
        assert_eq!(rule["action"], "allow");
        assert_eq!(rule["protocol"], "tcp");
        assert_eq!(rule["source"], "10.0.0.0/8");
        assert_eq!(rule["destination_port_min"], 443);
    }

    #[test]
    fn incomplete_rule_without_action_is_dropped() {
        let rules = parse_firewall_rules("set firewall name X rule 5 protocol tcp\n");
        assert!(rules.is_empty());
    }
}
