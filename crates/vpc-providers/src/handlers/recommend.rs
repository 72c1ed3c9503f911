//! Fan-in de cost-optimization: agrega los resultados de los syncs de
//! consumo/uso de varias regiones y produce recomendaciones de rightsizing.
//!
//! La regla de despacho del scheduler garantiza que al correr este handler
//! TODOS los predecesores ya persistieron su result; acá sólo se leen, sin
//! volver a consultar ningún proveedor.

use serde_json::{json, Value};

use vpc_core::{TaskContext, TaskHandler, TaskOutcome};

pub struct RecommendationsHandler;

impl TaskHandler for RecommendationsHandler {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome {
        let results = ctx.predecessor_results();
        if results.is_empty() {
            return TaskOutcome::Failure { message: "recommendations task without usage results".into() };
        }
        let mut recommendations: Vec<Value> = Vec::new();
        for usage in &results {
            let items = usage.get("usage").and_then(|v| v.as_array()).cloned().unwrap_or_default();
            for item in items {
                let cpu_pct = item.get("cpu_pct").and_then(|v| v.as_f64()).unwrap_or(100.0);
                let instance = item.get("instance").and_then(|v| v.as_str()).unwrap_or_default();
                // instancia fría sostenida: candidata a bajar de perfil
                if cpu_pct < 20.0 {
                    recommendations.push(json!({
                        "instance": instance,
                        "action": "downsize",
                        "reason": format!("average cpu {cpu_pct:.1}% over the sync window"),
                    }));
                }
            }
        }
        TaskOutcome::Success { result: Some(json!({
                                   "recommendations": recommendations,
                                   "sources": results.len(),
                               })),
                               resource_id: None,
                               message: format!("generated {} recommendation(s)", recommendations.len()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_instances_are_flagged() {
        // unit del umbral, sin motor: el armado del contexto se ejercita en
        // los tests de integración del workspace
        let usage = json!({"usage": [
            {"instance": "vm-a", "cpu_pct": 5.0},
            {"instance": "vm-b", "cpu_pct": 80.0}
        ]});
        let items = usage["usage"].as_array().unwrap();
        let flagged: Vec<_> = items.iter()
                                   .filter(|i| i["cpu_pct"].as_f64().unwrap() < 20.0)
                                   .collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0]["instance"], "vm-a");
    }
}
