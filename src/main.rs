//! Demo end-to-end en memoria del plano de control:
//! 1. descubre un grafo classic (payload Softlayer de ejemplo),
//! 2. lo traduce al grafo de recursos con forma IBM,
//! 3. arma y encola los workflows de creación + la migración de un VSI,
//! 4. corre el poll loop hasta quiescencia e imprime el resultado.

use serde_json::json;
use std::time::Duration;

use vpc_core::{ClientSet, HandlerRegistry, InMemoryWorkflowStore, Owner, RetryPolicy, Scheduler, TaskType,
               WorkflowStore};
use vpc_domain::{kinds, CloudAccount, DomainStore};
use vpc_providers::{BackupInstanceWaitHandler, CreateResourceHandler, CreateWaitHandler, IssueCreateHandler,
                    SimulatedCloudClient};
use vpc_translate::{translate_softlayer, CREATION_ORDER};
use vpcplus_rust::workflow::{creation_root_from_translation, domain_kind_for, migrate_classic_instance_root,
                             IBM_CONNECTION, SOFTLAYER_CONNECTION};
use vpcplus_rust::ControlPlaneConfig;

fn sample_classic_payload() -> serde_json::Value {
    json!({
        "subnets": [
            {"id": "sub-100", "name": "classic-backend", "cidr": "10.120.30.0/26", "datacenter": "dal10"}
        ],
        "security_groups": [
            {"id": "sg-100", "name": "allow-web", "rules": [
                {"direction": "ingress", "protocol": "tcp", "remote_ip": "0.0.0.0/0",
                 "port_range_min": 443, "port_range_max": 443}
            ]}
        ],
        "ssh_keys": [
            {"id": "key-100", "label": "ops", "public_key": "ssh-rsa AAAAB3..."}
        ],
        "instances": [
            {"id": "vsi-100", "hostname": "web01", "domain": "example.com",
             "cpus": 2, "memory": 8192, "datacenter": "dal10",
             "subnet_id": "sub-100", "security_group_ids": ["sg-100"],
             "ssh_key_ids": ["key-100"],
             "disks": [{"size_gb": 100}, {"size_gb": 5, "iops": 4000}]}
        ],
        "load_balancers": [
            {"id": "lb-100", "name": "web-lb", "is_public": true, "subnet_id": "sub-100",
             "listeners": [{"protocol": "HTTP", "port": 80, "members": ["vsi-100"]}]}
        ]
    })
}

/// Registra un handler de create por cada kind del árbol de traducción,
/// más el par backup/wait de la migración classic.
fn build_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for translated_kind in CREATION_ORDER {
        if let Some(resource_type) = domain_kind_for(translated_kind) {
            registry.register(TaskType::Create,
                              resource_type,
                              Box::new(CreateResourceHandler::new(IBM_CONNECTION,
                                                                  format!("create_{translated_kind}"))));
        }
    }
    registry.register(TaskType::Backup,
                      "SoftlayerBackupInstance",
                      Box::new(IssueCreateHandler::new(SOFTLAYER_CONNECTION, "create_backup_instance")));
    registry.register(TaskType::CreateWait,
                      "SoftlayerBackupInstance",
                      Box::new(BackupInstanceWaitHandler::new(SOFTLAYER_CONNECTION)));
    registry.register(TaskType::Create,
                      kinds::IMAGE,
                      Box::new(IssueCreateHandler::new(IBM_CONNECTION, "create_image")));
    registry.register(TaskType::CreateWait,
                      kinds::IMAGE,
                      Box::new(CreateWaitHandler::new(IBM_CONNECTION)));
    registry
}

#[tokio::main]
async fn main() {
    vpcplus_rust::init_dotenv();
    let config = ControlPlaneConfig { poll_interval: Duration::from_millis(10), ..ControlPlaneConfig::from_env() };
    let owner = Owner::new("demo-user", "demo-project");

    // 1-2. descubrimiento + traducción
    let output = match translate_softlayer(&sample_classic_payload()) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("translation failed: {e}");
            std::process::exit(1);
        }
    };
    println!("translated {} classic resource(s) into the target graph", output.total());
    for (kind, resource) in output.in_creation_order() {
        println!("  {kind:<18} {}", resource.resource_json["name"].as_str().unwrap_or("?"));
    }

    // 3. infraestructura del scheduler
    let mut clients = ClientSet::new();
    let policy = RetryPolicy { max_attempts: config.retry_max_attempts,
                               base_delay: Duration::from_millis(config.retry_base_delay_ms),
                               ..RetryPolicy::default() };
    clients.register(IBM_CONNECTION, Box::new(SimulatedCloudClient::new(1)), policy.clone());
    clients.register(SOFTLAYER_CONNECTION, Box::new(SimulatedCloudClient::new(1)), policy);
    let scheduler = Scheduler::new(build_registry(), clients);

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = DomainStore::new();
    for account in [CloudAccount::new("ibm-acc", "demo ibm", "ibm-cloud"),
                    CloudAccount::new("sl-acc", "demo classic", "softlayer")] {
        vpc_core::DomainPort::save(&mut domain, vpc_core::CLOUD_ACCOUNT_KIND, &account.id.clone(),
                                   account.to_value());
    }

    let creation = creation_root_from_translation(owner.clone(), "ibm-acc", "migrate_classic_topology", &output)
        .expect("creation root");
    let migration = migrate_classic_instance_root(owner,
                                                  "sl-acc",
                                                  "ibm-acc",
                                                  json!({"id": "vsi-100", "hostname": "web01"}),
                                                  json!({"name": "web01-ibm", "profile": {"name": "bx2-2x8"}}))
        .expect("migration root");

    let creation_id = scheduler.submit(&mut store, creation).expect("submit creation root");
    let migration_id = scheduler.submit(&mut store, migration).expect("submit migration root");
    println!("\naccepted workflow roots: creation={creation_id} migration={migration_id}");

    // 4. poll loop hasta quiescencia
    let ticks = vpcplus_rust::run_poll_loop(&scheduler, &mut store, &mut domain, &config, 200)
        .await
        .expect("poll loop");
    println!("scheduler quiescent after {ticks} tick(s)\n");

    for root_id in [creation_id, migration_id] {
        let root = store.root(root_id).expect("root");
        println!("root {} [{}] -> {}", root.workflow_name, root.id, root.status.as_str());
        for task in store.tasks_of_root(root_id).expect("tasks") {
            println!("  {:<12} {:<24} {}", task.status.as_str(), task.resource_type, task.message);
        }
        for cb_id in root.callback_ids {
            let cb = store.root(cb_id).expect("callback root");
            println!("  callback {} -> {}", cb.workflow_name, cb.status.as_str());
            for task in store.tasks_of_root(cb_id).expect("tasks") {
                println!("    {:<12} {:<24} {}", task.status.as_str(), task.resource_type, task.message);
            }
        }
    }
    println!("\ndomain records: {}", domain.len());
}
