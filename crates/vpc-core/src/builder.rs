//! Builder de roots: construcción del DAG antes del submit.
//!
//! La capa externa (API/HTTP, fuera del core) sabe QUÉ tasks necesita una
//! acción de usuario; aquí sólo se acumulan tasks y aristas, se rechazan
//! ciclos y se arman los callback roots. El submit (dedup + verificación de
//! handlers + inserción) vive en el `Scheduler`.

use serde_json::Value;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::model::{Owner, WorkflowNature, WorkflowRoot, WorkflowTask};

pub struct RootBuilder {
    root: WorkflowRoot,
    tasks: Vec<WorkflowTask>,
    callbacks: Vec<RootBuilder>,
}

impl RootBuilder {
    pub fn new(owner: Owner, workflow_name: impl Into<String>, nature: WorkflowNature) -> Self {
        Self { root: WorkflowRoot::new(owner, workflow_name, nature),
               tasks: Vec::new(),
               callbacks: Vec::new() }
    }

    /// Fija la clave de dedup a partir del request original.
    pub fn fe_request(mut self, request: &Value) -> Self {
        self.root = self.root.with_fe_request(request);
        self
    }

    pub fn root(&self) -> &WorkflowRoot {
        &self.root
    }

    /// Añade una task al DAG y devuelve su id para encadenarla.
    pub fn add_task(&mut self, mut task: WorkflowTask) -> Uuid {
        task.root_id = Some(self.root.id);
        let id = task.id;
        self.root.task_ids.push(id);
        self.tasks.push(task);
        id
    }

    /// Arista dirigida `from -> to`. Soporta fan-out (un `from`, varios `to`)
    /// y fan-in (varios `from`, un `to`). Crear un ciclo es un error de
    /// programación: se rechaza, nunca se repara en runtime.
    pub fn chain(&mut self, from: Uuid, to: Uuid) -> Result<(), EngineError> {
        if from == to || self.reaches(to, from) {
            debug_assert!(false, "workflow DAG edge {from} -> {to} would create a cycle");
            return Err(EngineError::CycleDetected { from, to });
        }
        {
            let from_task = self.task_mut(from)?;
            if !from_task.next.contains(&to) {
                from_task.next.push(to);
            }
        }
        let to_task = self.task_mut(to)?;
        if !to_task.previous.contains(&from) {
            to_task.previous.push(from);
        }
        Ok(())
    }

    /// Encadena una secuencia lineal de tasks ya añadidas.
    pub fn chain_sequence(&mut self, ids: &[Uuid]) -> Result<(), EngineError> {
        for pair in ids.windows(2) {
            self.chain(pair[0], pair[1])?;
        }
        Ok(())
    }

    /// Registra un root ON_SUCCESS: arranca sólo cuando este root llega a
    /// Successful, exactamente una vez. Varios callbacks arrancan
    /// independientes entre sí, no encadenados.
    pub fn add_callback(&mut self, callback: RootBuilder) {
        self.callbacks.push(callback);
    }

    pub(crate) fn into_parts(self) -> (WorkflowRoot, Vec<WorkflowTask>, Vec<RootBuilder>) {
        (self.root, self.tasks, self.callbacks)
    }

    fn task_mut(&mut self, id: Uuid) -> Result<&mut WorkflowTask, EngineError> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EngineError::TaskNotFound(id))
    }

    /// ¿`target` es alcanzable desde `start` siguiendo `next`?
    fn reaches(&self, start: Uuid, target: Uuid) -> bool {
        let mut stack = vec![start];
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(task) = self.tasks.iter().find(|t| t.id == id) {
                stack.extend(task.next.iter().copied());
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskType;
    use serde_json::json;

    fn task() -> WorkflowTask {
        WorkflowTask::new(TaskType::Sync, "IBMInstance", json!({}))
    }

    #[test]
    fn chain_builds_fan_out_and_fan_in() {
        let mut b = RootBuilder::new(Owner::new("u", "p"), "usage_sync", WorkflowNature::Sync);
        let a = b.add_task(task());
        let s1 = b.add_task(task());
        let s2 = b.add_task(task());
        let fin = b.add_task(task());
        b.chain(a, s1).unwrap();
        b.chain(a, s2).unwrap();
        b.chain(s1, fin).unwrap();
        b.chain(s2, fin).unwrap();

        let (_, tasks, _) = b.into_parts();
        let fan_in = tasks.iter().find(|t| t.id == fin).unwrap();
        assert_eq!(fan_in.previous.len(), 2);
        let src = tasks.iter().find(|t| t.id == a).unwrap();
        assert_eq!(src.next.len(), 2);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "cycle"))]
    fn chain_rejects_cycles() {
        let mut b = RootBuilder::new(Owner::new("u", "p"), "w", WorkflowNature::Create);
        let t1 = b.add_task(task());
        let t2 = b.add_task(task());
        b.chain(t1, t2).unwrap();
        // en release devuelve CycleDetected; en debug dispara el assert
        let err = b.chain(t2, t1).unwrap_err();
        assert!(matches!(err, EngineError::CycleDetected { .. }));
    }
}
