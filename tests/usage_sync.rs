//! Sync de consumo multi-región con fan-in de recomendaciones.

use serde_json::json;

use vpc_core::{ClientSet, HandlerRegistry, InMemoryDomainPort, InMemoryWorkflowStore, Owner, RootStatus,
               Scheduler, TaskContext, TaskHandler, TaskOutcome, TaskType, WorkflowStore};
use vpc_providers::RecommendationsHandler;
use vpcplus_rust::workflow::usage_sync_root;

/// Sync de uso de una región: acá simulado con datos fijos por región (en
/// producción llama al endpoint de usage del proveedor).
struct FakeUsageSyncHandler;

impl TaskHandler for FakeUsageSyncHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let region = ctx.metadata().get("region").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let usage = match region.as_str() {
            "us-south" => json!([{"instance": "vm-cold", "cpu_pct": 4.5}]),
            "us-east" => json!([{"instance": "vm-hot", "cpu_pct": 92.0}]),
            _ => json!([]),
        };
        TaskOutcome::Success { result: Some(json!({"region": region, "usage": usage})),
                               resource_id: None,
                               message: format!("usage synced for {region}") }
    }
}

#[test]
fn fan_in_generates_recommendations_from_all_regions() {
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Consumption, "IBMUsageReport", Box::new(FakeUsageSyncHandler));
    registry.register(TaskType::FetchCost, "IBMRightsizingRecommendation", Box::new(RecommendationsHandler));
    let scheduler = Scheduler::new(registry, ClientSet::new());

    let mut store = InMemoryWorkflowStore::new();
    let mut domain = InMemoryDomainPort::new();

    let builder = usage_sync_root(Owner::new("u1", "p1"), "ibm-acc", &["us-south", "us-east", "eu-de"])
        .expect("builder");
    let root_id = scheduler.submit(&mut store, builder).expect("submit");
    let status = scheduler.run_root(&mut store, &mut domain, root_id, 5).expect("run");
    assert_eq!(status, RootStatus::Successful);

    let tasks = store.tasks_of_root(root_id).unwrap();
    let fan_in = tasks.iter()
                      .find(|t| t.resource_type == "IBMRightsizingRecommendation")
                      .expect("fan-in task");
    let result = fan_in.result.clone().expect("result");
    assert_eq!(result["sources"], 3, "one usage result per region");
    let recommendations = result["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 1, "only the cold instance is flagged");
    assert_eq!(recommendations[0]["instance"], "vm-cold");
    assert_eq!(recommendations[0]["action"], "downsize");
}

// El dedup del builder: el mismo request de sync en vuelo no genera un
// segundo root (patrón profile-sync).
#[test]
fn duplicate_usage_sync_is_rejected_while_in_flight() {
    let mut registry = HandlerRegistry::new();
    registry.register(TaskType::Consumption, "IBMUsageReport", Box::new(FakeUsageSyncHandler));
    registry.register(TaskType::FetchCost, "IBMRightsizingRecommendation", Box::new(RecommendationsHandler));
    let scheduler = Scheduler::new(registry, ClientSet::new());
    let mut store = InMemoryWorkflowStore::new();

    let first = usage_sync_root(Owner::new("u1", "p1"), "ibm-acc", &["us-south"]).expect("builder");
    scheduler.submit(&mut store, first).expect("first submit");

    let dup = usage_sync_root(Owner::new("u1", "p1"), "ibm-acc", &["us-south"]).expect("builder");
    let err = scheduler.submit(&mut store, dup).unwrap_err();
    assert!(matches!(err, vpc_core::EngineError::DuplicateRequest(_)));
}
