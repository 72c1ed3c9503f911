//! Scheduler: avanza los DAGs persistidos hasta estado terminal.
//!
//! El scheduler no guarda estado entre ticks: cada `tick` re-lee roots y
//! tasks del store, despacha lo que esté listo y persiste los desenlaces.
//! Reglas de avance:
//! - una task arranca sólo cuando TODOS sus predecesores son Successful;
//! - una task con un ancestro Failed no arranca nunca (el fallo corta su
//!   rama; las ramas hermanas siguen);
//! - RunningWait se re-despacha como máximo una vez por tick (el delay
//!   entre ticks lo pone el poll loop externo);
//! - los callback roots ON_SUCCESS quedan gateados hasta que su root padre
//!   llegue a Successful, y se activan exactamente una vez.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use uuid::Uuid;

use crate::builder::RootBuilder;
use crate::errors::EngineError;
use crate::executor::{short_id, ClientSet, DomainPort, TaskContext, TaskOutcome, CLOUD_ACCOUNT_KIND,
                      METADATA_ACCOUNT_KEY};
use crate::model::{RootType, WorkflowTask};
use crate::registry::HandlerRegistry;
use crate::status::{RootStatus, TaskStatus};
use crate::store::WorkflowStore;

/// Resumen de un tick, para logs y tests.
#[derive(Debug, Default, Clone)]
pub struct TickReport {
    /// Invocaciones de handler ejecutadas en este tick.
    pub dispatched: usize,
    /// Tasks que quedaron en RunningWait al cierre del tick.
    pub waiting: usize,
    pub roots_completed: Vec<Uuid>,
    pub roots_failed: Vec<Uuid>,
}

pub struct Scheduler {
    registry: HandlerRegistry,
    clients: ClientSet,
}

impl Scheduler {
    pub fn new(registry: HandlerRegistry, clients: ClientSet) -> Self {
        Self { registry, clients }
    }

    pub fn clients(&self) -> &ClientSet {
        &self.clients
    }

    /// Acepta un root construido por la capa externa: chequeo de dedup por
    /// `fe_request_hash`, verificación de handlers de TODO el árbol
    /// (callbacks incluidos) y persistencia. Devuelve el id del root.
    pub fn submit(&self, store: &mut dyn WorkflowStore, builder: RootBuilder) -> Result<Uuid, EngineError> {
        let root = builder.root();
        if let Some(hash) = root.fe_request_hash.clone() {
            if let Some(existing) = store.find_in_flight_root(&root.owner.user_id,
                                                              &root.owner.project_id,
                                                              root.nature,
                                                              &hash) {
                return Err(EngineError::DuplicateRequest(existing));
            }
        }
        self.insert_tree(store, builder, None)
    }

    fn insert_tree(&self,
                   store: &mut dyn WorkflowStore,
                   builder: RootBuilder,
                   parent: Option<Uuid>)
                   -> Result<Uuid, EngineError> {
        let (mut root, tasks, callbacks) = builder.into_parts();
        self.registry.verify_tasks(tasks.iter())?;
        if let Some(parent_id) = parent {
            root.root_type = RootType::OnSuccess;
            root.parent_id = Some(parent_id);
        }
        let root_id = root.id;
        // el padre se inserta antes que sus callbacks (FK parent_id en el
        // backend Postgres)
        store.insert_root(root.clone())?;
        for task in tasks {
            store.insert_task(task)?;
        }
        for callback in callbacks {
            let cb_id = self.insert_tree(store, callback, Some(root_id))?;
            root.callback_ids.push(cb_id);
        }
        if !root.callback_ids.is_empty() {
            store.save_root(&root)?;
        }
        debug!("submit root={} tasks={}", short_id(&root_id), root.task_ids.len());
        Ok(root_id)
    }

    /// Un tick del scheduler sobre todos los roots activos.
    pub fn tick(&self,
                store: &mut dyn WorkflowStore,
                domain: &mut dyn DomainPort)
                -> Result<TickReport, EngineError> {
        let mut report = TickReport::default();
        for root_id in store.active_roots() {
            self.advance_root(store, domain, root_id, &mut report)?;
        }
        Ok(report)
    }

    /// Avanza un root: despacha en cascada las tasks listas (sin esperar al
    /// siguiente tick cuando el último predecesor acaba de terminar), deriva
    /// el estado del root y dispara callbacks si corresponde.
    fn advance_root(&self,
                    store: &mut dyn WorkflowStore,
                    domain: &mut dyn DomainPort,
                    root_id: Uuid,
                    report: &mut TickReport)
                    -> Result<(), EngineError> {
        let root = store.root(root_id)?;

        // Gating de callbacks: un root ON_SUCCESS no corre hasta que su padre
        // esté Successful (nunca sobre Failed).
        if root.root_type == RootType::OnSuccess {
            match root.parent_id {
                Some(parent_id) => match store.root(parent_id) {
                    Ok(parent) if parent.status == RootStatus::Successful => {}
                    Ok(_) => return Ok(()),
                    Err(_) => {
                        warn!("callback root {} without parent {}; skipping",
                              short_id(&root_id),
                              short_id(&parent_id));
                        return Ok(());
                    }
                },
                None => {
                    warn!("callback root {} without parent id; skipping", short_id(&root_id));
                    return Ok(());
                }
            }
        }

        // Cascada: re-lee el estado tras cada ronda de despacho; una task que
        // se volvió lista dentro del tick se despacha en el mismo tick.
        let mut invoked: HashSet<Uuid> = HashSet::new();
        loop {
            let tasks = store.tasks_of_root(root_id)?;
            let by_id: HashMap<Uuid, &WorkflowTask> = tasks.iter().map(|t| (t.id, t)).collect();
            let ready: Vec<Uuid> = tasks
                .iter()
                .filter(|t| match t.status {
                    TaskStatus::Initiated => {
                        !invoked.contains(&t.id)
                        && t.previous.iter().all(|p| {
                               by_id.get(p).map(|pt| pt.status == TaskStatus::Successful).unwrap_or(false)
                           })
                    }
                    TaskStatus::RunningWait => !invoked.contains(&t.id),
                    _ => false,
                })
                .map(|t| t.id)
                .collect();
            if ready.is_empty() {
                break;
            }
            for task_id in ready {
                invoked.insert(task_id);
                self.dispatch_task(store, domain, task_id)?;
                report.dispatched += 1;
            }
        }

        // Derivar y persistir el estado del root a partir de sus tasks.
        let tasks = store.tasks_of_root(root_id)?;
        report.waiting += tasks.iter().filter(|t| t.status == TaskStatus::RunningWait).count();
        let derived = derive_root_status(&tasks);
        let mut root = store.root(root_id)?;
        if root.status != derived {
            debug!("root {} {} -> {}", short_id(&root_id), root.status.as_str(), derived.as_str());
            root.status = derived;
            store.save_root(&root)?;
        }

        match derived {
            RootStatus::Successful => {
                report.roots_completed.push(root_id);
                // fire-once: los callbacks quedan habilitados una sola vez
                if !root.callback_ids.is_empty() && !root.callbacks_fired {
                    root.callbacks_fired = true;
                    store.save_root(&root)?;
                    debug!("root {} fired {} callback root(s)",
                           short_id(&root_id),
                           root.callback_ids.len());
                }
            }
            RootStatus::Failed => report.roots_failed.push(root_id),
            _ => {}
        }
        Ok(())
    }

    /// Ejecuta una invocación de handler para una task lista y aplica el
    /// desenlace: el flip de estado y las mutaciones de dominio staged se
    /// persisten juntos (frontera de fase).
    fn dispatch_task(&self,
                     store: &mut dyn WorkflowStore,
                     domain: &mut dyn DomainPort,
                     task_id: Uuid)
                     -> Result<(), EngineError> {
        // copia fresca (otro worker pudo tocarla)
        let mut task = store.task(task_id)?;
        if task.status.is_terminal() {
            return Err(EngineError::TaskAlreadyTerminal);
        }
        let from = task.status;

        // Cortocircuito por cuenta inválida: no se invoca al handler.
        let account_id = task.metadata_get(METADATA_ACCOUNT_KEY)
                             .and_then(|v| v.as_str())
                             .map(str::to_string);
        if let Some(account_id) = account_id {
            if let Some(account) = domain.load(CLOUD_ACCOUNT_KIND, &account_id) {
                if account.get("status").and_then(|s| s.as_str()) == Some("invalid") {
                    task.status = TaskStatus::Failed;
                    task.message = format!("cloud account {account_id} is invalid; task short-circuited");
                    store.save_task(&task)?;
                    store.record_transition(task_id, from, TaskStatus::Failed, &task.message);
                    return Ok(());
                }
            }
        }

        task.status = TaskStatus::Running;
        store.save_task(&task)?;
        store.record_transition(task_id, from, TaskStatus::Running, "");

        let handler = match self.registry.resolve(task.task_type, &task.resource_type) {
            Some(h) => h,
            None => {
                // verify_tasks corre en submit; esto sólo puede pasar si el
                // registry cambió después
                task.status = TaskStatus::Failed;
                task.message = format!("no handler registered for {}/{}", task.task_type, task.resource_type);
                store.save_task(&task)?;
                store.record_transition(task_id, TaskStatus::Running, TaskStatus::Failed, &task.message);
                return Ok(());
            }
        };

        let root = match task.root_id {
            Some(root_id) => store.root(root_id)?,
            None => return Err(EngineError::Internal(format!("task {task_id} without root"))),
        };
        let root_tasks = store.tasks_of_root(root.id)?;
        let predecessors: Vec<WorkflowTask> = root_tasks
            .iter()
            .filter(|t| task.previous.contains(&t.id))
            .cloned()
            .collect();

        let mut ctx = TaskContext::new(task, root, predecessors, root_tasks, &*domain, &self.clients);
        let outcome = handler.run(&mut ctx);
        let (mut task, uow) = ctx.into_parts();

        let to = outcome.status();
        match outcome {
            TaskOutcome::Success { result, resource_id, message } => {
                task.result = result;
                if resource_id.is_some() {
                    task.resource_id = resource_id;
                }
                task.message = message;
            }
            TaskOutcome::Wait { message } => {
                task.message = message;
            }
            TaskOutcome::Failure { message } => {
                task.message = message;
            }
        }
        task.status = to;

        // mutaciones de dominio + flip de estado: un solo punto de commit
        uow.commit(domain);
        store.save_task(&task)?;
        store.record_transition(task_id, TaskStatus::Running, to, &task.message);
        debug!("task {} {}/{} -> {}",
               short_id(&task_id),
               task.task_type,
               task.resource_type,
               to.as_str());
        Ok(())
    }

    /// Helper para tests y el binario demo: tickea hasta que el root dado
    /// llegue a terminal o se agote `max_ticks`.
    pub fn run_root(&self,
                    store: &mut dyn WorkflowStore,
                    domain: &mut dyn DomainPort,
                    root_id: Uuid,
                    max_ticks: usize)
                    -> Result<RootStatus, EngineError> {
        for _ in 0..max_ticks {
            self.tick(store, domain)?;
            let root = store.root(root_id)?;
            if root.status.is_terminal() {
                return Ok(root.status);
            }
        }
        Ok(store.root(root_id)?.status)
    }

    /// Tickea hasta que no quede ningún root activo (o `max_ticks`).
    pub fn run_until_quiescent(&self,
                               store: &mut dyn WorkflowStore,
                               domain: &mut dyn DomainPort,
                               max_ticks: usize)
                               -> Result<(), EngineError> {
        for _ in 0..max_ticks {
            if store.active_roots().is_empty() {
                return Ok(());
            }
            self.tick(store, domain)?;
        }
        Ok(())
    }
}

/// Estado del root como función pura de sus tasks (el motor no guarda nada
/// más): Successful si todas terminaron bien; Failed si hay fallo y ninguna
/// otra task puede progresar; Running mientras haya trabajo posible.
pub fn derive_root_status(tasks: &[WorkflowTask]) -> RootStatus {
    if tasks.is_empty() {
        return RootStatus::Successful;
    }
    if tasks.iter().all(|t| t.status == TaskStatus::Successful) {
        return RootStatus::Successful;
    }
    let by_id: HashMap<Uuid, &WorkflowTask> = tasks.iter().map(|t| (t.id, t)).collect();
    let any_failed = tasks.iter().any(|t| t.status == TaskStatus::Failed);
    let any_active = tasks
        .iter()
        .any(|t| matches!(t.status, TaskStatus::Running | TaskStatus::RunningWait));
    let any_startable = tasks
        .iter()
        .any(|t| t.status == TaskStatus::Initiated && !has_failed_ancestor(t, &by_id));
    if any_failed && !any_active && !any_startable {
        return RootStatus::Failed;
    }
    if any_active || tasks.iter().any(|t| t.status != TaskStatus::Initiated) {
        RootStatus::Running
    } else {
        RootStatus::Initiated
    }
}

/// ¿Algún ancestro (transitivamente por `previous`) está Failed?
fn has_failed_ancestor(task: &WorkflowTask, by_id: &HashMap<Uuid, &WorkflowTask>) -> bool {
    let mut stack: Vec<Uuid> = task.previous.clone();
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(prev) = by_id.get(&id) {
            if prev.status == TaskStatus::Failed {
                return true;
            }
            stack.extend(prev.previous.iter().copied());
        }
    }
    false
}
