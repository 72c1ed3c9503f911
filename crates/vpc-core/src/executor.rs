//! Contrato del Task Executor.
//!
//! Una invocación ejecuta exactamente un par task_type/resource_type. El
//! handler recibe un `TaskContext` que re-lee todo del store (la invocación
//! puede correr en otro proceso que el que creó la task), una unidad de
//! trabajo sobre el dominio y los clientes cloud con su política de retry.
//! Devuelve exactamente uno de {Success, Wait, Failure}; el scheduler
//! aplica el cambio de estado junto con las mutaciones de dominio staged
//! (atómico por frontera de fase).

use std::collections::HashMap;

use serde_json::Value;
use uuid::Uuid;

use crate::model::{WorkflowRoot, WorkflowTask};
use crate::provider::CloudClient;
use crate::retry::{ProviderHandle, RetryPolicy};
use crate::status::TaskStatus;

/// Kind reservado para registros de cuenta cloud; el scheduler lo consulta
/// para cortocircuitar tasks cuya cuenta quedó inválida.
pub const CLOUD_ACCOUNT_KIND: &str = "CloudAccount";

/// Clave de metadata que asocia una task a su conexión/cuenta cloud.
pub const METADATA_ACCOUNT_KEY: &str = "cloud_account_id";

/// Desenlace de una invocación del handler.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Terminal con éxito: `result` queda disponible para las dependientes y
    /// `resource_id` enlaza el registro de dominio producido/objetivo.
    Success {
        result: Option<Value>,
        resource_id: Option<String>,
        message: String,
    },
    /// No terminal: re-despachar el MISMO handler en un tick futuro. La
    /// metadata actualizada a través del contexto queda persistida para la
    /// reanudación.
    Wait { message: String },
    /// Terminal con fallo; `message` explica la causa (textual del proveedor
    /// cuando aplica).
    Failure { message: String },
}

impl TaskOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        TaskOutcome::Success { result: None, resource_id: None, message: message.into() }
    }

    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Success { .. } => TaskStatus::Successful,
            TaskOutcome::Wait { .. } => TaskStatus::RunningWait,
            TaskOutcome::Failure { .. } => TaskStatus::Failed,
        }
    }
}

/// Contrato de persistencia de dominio visto desde el executor: registros
/// JSON opacos identificados por (kind, id). La capa tipada vive fuera del
/// core (vpc-domain).
pub trait DomainPort {
    fn load(&self, kind: &str, id: &str) -> Option<Value>;
    fn save(&mut self, kind: &str, id: &str, record: Value);
    fn delete(&mut self, kind: &str, id: &str);
    /// Búsqueda por id remoto (único por cloud+región+kind una vez asignado).
    fn find_by_resource_id(&self, kind: &str, resource_id: &str) -> Option<(String, Value)>;
}

/// Mutación de dominio staged dentro de una invocación.
#[derive(Debug, Clone)]
enum StagedOp {
    Save { kind: String, id: String, record: Value },
    Delete { kind: String, id: String },
}

/// Unidad de trabajo: acumula mutaciones de dominio que el scheduler aplica
/// junto con el cambio de estado de la task, exactamente una vez.
#[derive(Default)]
pub struct UnitOfWork {
    staged: Vec<StagedOp>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&mut self, kind: &str, id: &str, record: Value) {
        self.staged.push(StagedOp::Save { kind: kind.to_string(), id: id.to_string(), record });
    }

    pub fn delete(&mut self, kind: &str, id: &str) {
        self.staged.push(StagedOp::Delete { kind: kind.to_string(), id: id.to_string() });
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Lectura con overlay de lo staged (read-your-writes dentro de la
    /// invocación).
    pub fn load_overlaid(&self, port: &dyn DomainPort, kind: &str, id: &str) -> Option<Value> {
        for op in self.staged.iter().rev() {
            match op {
                StagedOp::Save { kind: k, id: i, record } if k == kind && i == id => {
                    return Some(record.clone())
                }
                StagedOp::Delete { kind: k, id: i } if k == kind && i == id => return None,
                _ => {}
            }
        }
        port.load(kind, id)
    }

    pub(crate) fn commit(self, port: &mut dyn DomainPort) {
        for op in self.staged {
            match op {
                StagedOp::Save { kind, id, record } => port.save(&kind, &id, record),
                StagedOp::Delete { kind, id } => port.delete(&kind, &id),
            }
        }
    }
}

/// Conjunto de conexiones cloud disponibles para los handlers. Cada conexión
/// lleva SU política de reintentos (scoped por credencial, no global).
#[derive(Default)]
pub struct ClientSet {
    entries: HashMap<String, (Box<dyn CloudClient>, RetryPolicy)>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connection: impl Into<String>, client: Box<dyn CloudClient>, policy: RetryPolicy) {
        self.entries.insert(connection.into(), (client, policy));
    }

    pub fn handle(&self, connection: &str) -> Option<ProviderHandle<'_>> {
        self.entries
            .get(connection)
            .map(|(client, policy)| ProviderHandle::new(client.as_ref(), policy))
    }
}

/// Contexto que recibe cada invocación del handler.
pub struct TaskContext<'a> {
    /// Copia de trabajo de la task: el handler muta metadata aquí y el
    /// scheduler la persiste junto al desenlace.
    pub task: WorkflowTask,
    root: WorkflowRoot,
    /// Copias frescas de los predecesores (todos Successful al despachar).
    predecessors: Vec<WorkflowTask>,
    /// Todas las tasks del root (lookups de fan-in por resource_type+id).
    root_tasks: Vec<WorkflowTask>,
    domain: &'a dyn DomainPort,
    clients: &'a ClientSet,
    pub uow: UnitOfWork,
}

impl<'a> TaskContext<'a> {
    pub fn new(task: WorkflowTask,
               root: WorkflowRoot,
               predecessors: Vec<WorkflowTask>,
               root_tasks: Vec<WorkflowTask>,
               domain: &'a dyn DomainPort,
               clients: &'a ClientSet)
               -> Self {
        Self { task,
               root,
               predecessors,
               root_tasks,
               domain,
               clients,
               uow: UnitOfWork::new() }
    }

    pub fn root(&self) -> &WorkflowRoot {
        &self.root
    }

    pub fn metadata(&self) -> &Value {
        &self.task.task_metadata
    }

    pub fn metadata_set(&mut self, key: &str, value: Value) {
        self.task.metadata_set(key, value);
    }

    /// `task_metadata["resource_data"]`, el input primario del handler.
    pub fn resource_data(&self) -> Option<&Value> {
        self.task.metadata_get("resource_data")
    }

    pub fn predecessors(&self) -> &[WorkflowTask] {
        &self.predecessors
    }

    /// Resultados persistidos de todos los predecesores (visibilidad completa
    /// garantizada por la regla de despacho).
    pub fn predecessor_results(&self) -> Vec<&Value> {
        self.predecessors.iter().filter_map(|t| t.result.as_ref()).collect()
    }

    /// Lookup de fan-in: tasks hermanas del root filtradas por
    /// (resource_type, resource_id). Es una consulta puntual O(tasks-del-root),
    /// no una suscripción.
    pub fn sibling_tasks(&self, resource_type: &str, resource_id: &str) -> Vec<&WorkflowTask> {
        self.root_tasks
            .iter()
            .filter(|t| {
                t.id != self.task.id
                && t.resource_type == resource_type
                && t.resource_id.as_deref() == Some(resource_id)
            })
            .collect()
    }

    /// Conexión cloud nombrada. El handle vive lo que el `ClientSet`
    /// prestado al contexto, no lo que este borrow: un handler puede
    /// intercalar llamadas al proveedor con mutaciones de metadata.
    pub fn provider(&self, connection: &str) -> Option<ProviderHandle<'a>> {
        self.clients.handle(connection)
    }

    pub fn account_id(&self) -> Option<&str> {
        self.task.metadata_get(METADATA_ACCOUNT_KEY).and_then(|v| v.as_str())
    }

    // --- dominio (lecturas frescas + escrituras staged) ---

    pub fn load_record(&self, kind: &str, id: &str) -> Option<Value> {
        self.uow.load_overlaid(self.domain, kind, id)
    }

    pub fn find_record_by_resource_id(&self, kind: &str, resource_id: &str) -> Option<(String, Value)> {
        self.domain.find_by_resource_id(kind, resource_id)
    }

    pub fn save_record(&mut self, kind: &str, id: &str, record: Value) {
        self.uow.save(kind, id, record);
    }

    pub fn delete_record(&mut self, kind: &str, id: &str) {
        self.uow.delete(kind, id);
    }

    /// Descompone el contexto al terminar la invocación: la copia de trabajo
    /// de la task (metadata ya mutada) y la unidad de trabajo a commitear.
    pub fn into_parts(self) -> (WorkflowTask, UnitOfWork) {
        (self.task, self.uow)
    }

    /// Marca la cuenta cloud de esta task como inválida (tras AuthInvalid del
    /// proveedor); las tasks posteriores de la cuenta cortocircuitan.
    pub fn invalidate_account(&mut self, account_id: &str) {
        let mut record = self.load_record(CLOUD_ACCOUNT_KIND, account_id)
                             .unwrap_or_else(|| serde_json::json!({ "id": account_id }));
        if let Some(obj) = record.as_object_mut() {
            obj.insert("status".to_string(), Value::String("invalid".to_string()));
        }
        self.save_record(CLOUD_ACCOUNT_KIND, account_id, record);
    }
}

/// Un handler ejecuta una unidad de trabajo nombrada contra sistemas
/// externos y reporta el desenlace. Debe ser reanudable: invocado de nuevo
/// en RunningWait con la misma metadata y el mismo estado remoto produce la
/// misma metadata (sin efectos duplicados).
pub trait TaskHandler: Send + Sync {
    fn run(&self, ctx: &mut TaskContext<'_>) -> TaskOutcome;
}

/// Puerto de dominio en memoria mínimo, suficiente para el core y sus tests.
/// La implementación de producción (DashMap tipada) vive en vpc-domain.
#[derive(Default)]
pub struct InMemoryDomainPort {
    records: HashMap<(String, String), Value>,
}

impl InMemoryDomainPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DomainPort for InMemoryDomainPort {
    fn load(&self, kind: &str, id: &str) -> Option<Value> {
        self.records.get(&(kind.to_string(), id.to_string())).cloned()
    }

    fn save(&mut self, kind: &str, id: &str, record: Value) {
        self.records.insert((kind.to_string(), id.to_string()), record);
    }

    fn delete(&mut self, kind: &str, id: &str) {
        self.records.remove(&(kind.to_string(), id.to_string()));
    }

    fn find_by_resource_id(&self, kind: &str, resource_id: &str) -> Option<(String, Value)> {
        self.records
            .iter()
            .find(|((k, _), v)| k == kind && v.get("resource_id").and_then(|r| r.as_str()) == Some(resource_id))
            .map(|((_, id), v)| (id.clone(), v.clone()))
    }
}

/// Helper usado por el scheduler para marcar un Uuid legible en mensajes.
pub(crate) fn short_id(id: &Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uow_overlays_reads_and_commits_once() {
        let mut port = InMemoryDomainPort::new();
        port.save("IBMInstance", "i1", json!({"name": "old"}));

        let mut uow = UnitOfWork::new();
        uow.save("IBMInstance", "i1", json!({"name": "new"}));
        // read-your-writes
        assert_eq!(uow.load_overlaid(&port, "IBMInstance", "i1").unwrap()["name"], "new");
        // el port no cambió todavía
        assert_eq!(port.load("IBMInstance", "i1").unwrap()["name"], "old");

        uow.commit(&mut port);
        assert_eq!(port.load("IBMInstance", "i1").unwrap()["name"], "new");
    }

    #[test]
    fn uow_delete_shadows_load() {
        let mut port = InMemoryDomainPort::new();
        port.save("IBMSubnet", "s1", json!({"cidr": "10.0.0.0/24"}));
        let mut uow = UnitOfWork::new();
        uow.delete("IBMSubnet", "s1");
        assert!(uow.load_overlaid(&port, "IBMSubnet", "s1").is_none());
    }

    #[test]
    fn find_by_resource_id_matches_remote_id() {
        let mut port = InMemoryDomainPort::new();
        port.save("IBMLoadBalancer", "lb-local", json!({"resource_id": "r006-abc"}));
        let (id, _) = port.find_by_resource_id("IBMLoadBalancer", "r006-abc").unwrap();
        assert_eq!(id, "lb-local");
        assert!(port.find_by_resource_id("IBMLoadBalancer", "missing").is_none());
    }
}
