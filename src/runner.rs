//! Poll loop externo del scheduler.
//!
//! El motor no bloquea ni re-encola por sí mismo: este loop tickea con el
//! intervalo configurado (el delay de re-poll de las tasks RUNNING_WAIT) y
//! corta cuando no quedan roots activos.

use log::{debug, info};

use vpc_core::{DomainPort, EngineError, Scheduler, WorkflowStore};

use crate::config::ControlPlaneConfig;

/// Tickea hasta quiescencia (sin roots activos) o hasta `max_ticks`.
/// Devuelve la cantidad de ticks ejecutados.
pub async fn run_poll_loop(scheduler: &Scheduler,
                           store: &mut dyn WorkflowStore,
                           domain: &mut dyn DomainPort,
                           config: &ControlPlaneConfig,
                           max_ticks: usize)
                           -> Result<usize, EngineError> {
    let mut ticks = 0;
    while ticks < max_ticks {
        if store.active_roots().is_empty() {
            info!("poll loop: no active roots after {ticks} tick(s)");
            return Ok(ticks);
        }
        let report = scheduler.tick(store, domain)?;
        ticks += 1;
        debug!("tick {ticks}: dispatched={} waiting={}", report.dispatched, report.waiting);
        if report.waiting > 0 {
            // sólo dormimos cuando hay tasks en RUNNING_WAIT: el resto del
            // avance es inmediato dentro del tick
            tokio::time::sleep(config.poll_interval).await;
        }
    }
    Ok(ticks)
}
