//! Implementación Postgres (Diesel) del `WorkflowStore` del core.
//!
//! Objetivo:
//! - Paridad 1:1 con el backend en memoria: mismo contrato, mismos
//!   invariantes (lecturas = copias frescas, log de transiciones
//!   append-only, roots nunca borrados).
//! - El payload completo de roots/tasks viaja como JSONB; las columnas
//!   sueltas sólo sirven a los filtros del scheduler.
//! - Errores transitorios (conflictos de serialización, IO de pool) se
//!   reintentan con backoff corto antes de subir como error del motor.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};
use serde_json::Value;
use uuid::Uuid;

use vpc_core::{EngineError, RootStatus, TaskStatus, TaskTransition, WorkflowNature, WorkflowRoot, WorkflowStore,
               WorkflowTask};

use crate::error::PersistenceError;
use crate::migrations::run_pending_migrations;
use crate::schema::{task_transitions, workflow_roots, workflow_tasks};

/// Alias del pool r2d2 de conexiones Postgres.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones (inyectable en tests).
pub trait ConnectionProvider: Send + Sync + 'static {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError>;
}

/// Provider respaldado por un `PgPool`.
pub struct PoolProvider {
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, PersistenceError> {
        self.pool
            .get()
            .map_err(|e| PersistenceError::TransientIo(format!("pool error: {e}")))
    }
}

/// ¿Conviene reintentar este error con backoff?
fn is_retryable(e: &PersistenceError) -> bool {
    match e {
        PersistenceError::SerializationConflict => true,
        PersistenceError::TransientIo(_) => true,
        PersistenceError::Unknown(msg) => {
            let m = msg.to_lowercase();
            m.contains("deadlock detected")
            || m.contains("could not serialize access due to concurrent update")
            || m.contains("connection closed")
            || m.contains("connection refused")
            || m.contains("timeout")
        }
        _ => false,
    }
}

/// Retry con backoff lineal corto (hasta 3 intentos).
fn with_retry<F, T>(mut f: F) -> Result<T, PersistenceError>
    where F: FnMut() -> Result<T, PersistenceError>
{
    let mut attempts = 0;
    loop {
        match f() {
            Err(e) if is_retryable(&e) && attempts < 3 => {
                let delay_ms = 15 * ((attempts + 1) as u64);
                warn!("retryable store error (attempt {}): {:?} -> sleeping {}ms",
                      attempts + 1,
                      e,
                      delay_ms);
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                attempts += 1;
            }
            r => return r,
        }
    }
}

fn engine_err(e: PersistenceError) -> EngineError {
    EngineError::Internal(format!("workflow store: {e}"))
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_roots)]
struct NewRootRow<'a> {
    id: &'a Uuid,
    user_id: &'a str,
    project_id: &'a str,
    nature: &'a str,
    status: &'a str,
    root_type: &'a str,
    fe_request_hash: Option<&'a str>,
    parent_id: Option<&'a Uuid>,
    payload: &'a Value,
    created_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = workflow_tasks)]
struct NewTaskRow<'a> {
    id: &'a Uuid,
    root_id: Option<&'a Uuid>,
    status: &'a str,
    payload: &'a Value,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = task_transitions)]
struct NewTransitionRow<'a> {
    task_id: &'a Uuid,
    from_status: &'a str,
    to_status: &'a str,
    message: &'a str,
}

fn root_payload(root: &WorkflowRoot) -> Value {
    serde_json::to_value(root).expect("serialize WorkflowRoot")
}

fn task_payload(task: &WorkflowTask) -> Value {
    serde_json::to_value(task).expect("serialize WorkflowTask")
}

fn parse_root(payload: Value) -> Result<WorkflowRoot, PersistenceError> {
    serde_json::from_value(payload).map_err(|e| PersistenceError::BadPayload(format!("root: {e}")))
}

fn parse_task(payload: Value) -> Result<WorkflowTask, PersistenceError> {
    serde_json::from_value(payload).map_err(|e| PersistenceError::BadPayload(format!("task: {e}")))
}

/// `WorkflowStore` durable sobre Postgres.
pub struct PgWorkflowStore<P: ConnectionProvider> {
    provider: P,
}

impl<P: ConnectionProvider> PgWorkflowStore<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Transiciones registradas para una task, en orden.
    pub fn transitions_of_task(&self, task_id: Uuid) -> Result<Vec<TaskTransition>, PersistenceError> {
        let rows: Vec<(i64, Uuid, String, String, String, DateTime<Utc>)> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            task_transitions::table.filter(task_transitions::task_id.eq(task_id))
                                   .order(task_transitions::seq.asc())
                                   .select((task_transitions::seq,
                                            task_transitions::task_id,
                                            task_transitions::from_status,
                                            task_transitions::to_status,
                                            task_transitions::message,
                                            task_transitions::ts))
                                   .load(&mut conn)
                                   .map_err(PersistenceError::from)
        })?;
        rows.into_iter()
            .map(|(seq, task_id, from, to, message, ts)| {
                let from = from.parse::<TaskStatus>().map_err(PersistenceError::BadPayload)?;
                let to = to.parse::<TaskStatus>().map_err(PersistenceError::BadPayload)?;
                Ok(TaskTransition { seq: seq as u64, task_id, from, to, message, ts })
            })
            .collect()
    }

    /// Todos los roots (terminales incluidos) para listados de auditoría.
    pub fn all_root_ids(&self) -> Result<Vec<Uuid>, PersistenceError> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_roots::table.order(workflow_roots::created_at.asc())
                                 .select(workflow_roots::id)
                                 .load(&mut conn)
                                 .map_err(PersistenceError::from)
        })
    }
}

impl<P: ConnectionProvider> WorkflowStore for PgWorkflowStore<P> {
    fn insert_root(&mut self, root: WorkflowRoot) -> Result<(), EngineError> {
        debug!("pg insert_root id={}", root.id);
        let payload = root_payload(&root);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(workflow_roots::table)
                .values(NewRootRow { id: &root.id,
                                     user_id: &root.owner.user_id,
                                     project_id: &root.owner.project_id,
                                     nature: root.nature.as_str(),
                                     status: root.status.as_str(),
                                     root_type: root.root_type.as_str(),
                                     fe_request_hash: root.fe_request_hash.as_deref(),
                                     parent_id: root.parent_id.as_ref(),
                                     payload: &payload,
                                     created_at: root.created_at })
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map(|_| ())
          .map_err(engine_err)
    }

    fn insert_task(&mut self, task: WorkflowTask) -> Result<(), EngineError> {
        let payload = task_payload(&task);
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(workflow_tasks::table)
                .values(NewTaskRow { id: &task.id,
                                     root_id: task.root_id.as_ref(),
                                     status: task.status.as_str(),
                                     payload: &payload })
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map(|_| ())
          .map_err(engine_err)
    }

    fn root(&self, id: Uuid) -> Result<WorkflowRoot, EngineError> {
        let payload: Option<Value> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_roots::table.find(id)
                                 .select(workflow_roots::payload)
                                 .first(&mut conn)
                                 .optional()
                                 .map_err(PersistenceError::from)
        }).map_err(engine_err)?;
        match payload {
            Some(p) => parse_root(p).map_err(engine_err),
            None => Err(EngineError::RootNotFound(id)),
        }
    }

    fn task(&self, id: Uuid) -> Result<WorkflowTask, EngineError> {
        let payload: Option<Value> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_tasks::table.find(id)
                                 .select(workflow_tasks::payload)
                                 .first(&mut conn)
                                 .optional()
                                 .map_err(PersistenceError::from)
        }).map_err(engine_err)?;
        match payload {
            Some(p) => parse_task(p).map_err(engine_err),
            None => Err(EngineError::TaskNotFound(id)),
        }
    }

    fn save_root(&mut self, root: &WorkflowRoot) -> Result<(), EngineError> {
        let payload = root_payload(root);
        let updated = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(workflow_roots::table.find(root.id))
                .set((workflow_roots::status.eq(root.status.as_str()),
                      workflow_roots::payload.eq(&payload)))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(engine_err)?;
        if updated == 0 {
            return Err(EngineError::RootNotFound(root.id));
        }
        Ok(())
    }

    fn save_task(&mut self, task: &WorkflowTask) -> Result<(), EngineError> {
        let payload = task_payload(task);
        let updated = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::update(workflow_tasks::table.find(task.id))
                .set((workflow_tasks::status.eq(task.status.as_str()),
                      workflow_tasks::payload.eq(&payload),
                      workflow_tasks::updated_at.eq(diesel::dsl::now)))
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        }).map_err(engine_err)?;
        if updated == 0 {
            return Err(EngineError::TaskNotFound(task.id));
        }
        Ok(())
    }

    fn delete_task(&mut self, id: Uuid) -> Result<(), EngineError> {
        // borrado compensatorio: task + referencia en el payload del root,
        // en la misma transacción
        let task = self.task(id)?;
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            conn.build_transaction().read_write().run(|tx_conn| {
                diesel::delete(workflow_tasks::table.find(id)).execute(tx_conn)?;
                if let Some(root_id) = task.root_id {
                    let payload: Option<Value> = workflow_roots::table.find(root_id)
                                                                      .select(workflow_roots::payload)
                                                                      .first(tx_conn)
                                                                      .optional()?;
                    if let Some(payload) = payload {
                        if let Ok(mut root) = serde_json::from_value::<WorkflowRoot>(payload) {
                            root.task_ids.retain(|t| *t != id);
                            let new_payload = serde_json::to_value(&root).expect("serialize WorkflowRoot");
                            diesel::update(workflow_roots::table.find(root_id))
                                .set(workflow_roots::payload.eq(&new_payload))
                                .execute(tx_conn)?;
                        }
                    }
                }
                Ok::<(), diesel::result::Error>(())
            })
            .map_err(PersistenceError::from)
        }).map_err(engine_err)
    }

    fn tasks_of_root(&self, root_id: Uuid) -> Result<Vec<WorkflowTask>, EngineError> {
        let payloads: Vec<Value> = with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_tasks::table.filter(workflow_tasks::root_id.eq(root_id))
                                 .select(workflow_tasks::payload)
                                 .load(&mut conn)
                                 .map_err(PersistenceError::from)
        }).map_err(engine_err)?;
        // el orden del DAG está en las aristas, no en el orden de filas; se
        // respeta el orden declarado en el root para estabilidad
        let mut tasks: Vec<WorkflowTask> = payloads
            .into_iter()
            .map(parse_task)
            .collect::<Result<_, _>>()
            .map_err(engine_err)?;
        let root = self.root(root_id)?;
        tasks.sort_by_key(|t| root.task_ids.iter().position(|id| *id == t.id).unwrap_or(usize::MAX));
        Ok(tasks)
    }

    fn active_roots(&self) -> Vec<Uuid> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_roots::table.filter(workflow_roots::status.eq_any(vec![RootStatus::Initiated.as_str(),
                                                                            RootStatus::Running.as_str()]))
                                 .order(workflow_roots::created_at.asc())
                                 .select(workflow_roots::id)
                                 .load(&mut conn)
                                 .map_err(PersistenceError::from)
        }).unwrap_or_else(|e| {
              warn!("active_roots load error: {e:?}");
              Vec::new()
          })
    }

    fn find_in_flight_root(&self,
                           user_id: &str,
                           project_id: &str,
                           nature: WorkflowNature,
                           fe_request_hash: &str)
                           -> Option<Uuid> {
        with_retry(|| {
            let mut conn = self.provider.connection()?;
            workflow_roots::table.filter(workflow_roots::user_id.eq(user_id))
                                 .filter(workflow_roots::project_id.eq(project_id))
                                 .filter(workflow_roots::nature.eq(nature.as_str()))
                                 .filter(workflow_roots::fe_request_hash.eq(fe_request_hash))
                                 .filter(workflow_roots::status.eq_any(vec![RootStatus::Initiated.as_str(),
                                                                            RootStatus::Running.as_str()]))
                                 .select(workflow_roots::id)
                                 .first(&mut conn)
                                 .optional()
                                 .map_err(PersistenceError::from)
        }).unwrap_or_else(|e| {
              warn!("find_in_flight_root load error: {e:?}");
              None
          })
    }

    fn record_transition(&mut self, task_id: Uuid, from: TaskStatus, to: TaskStatus, message: &str) {
        let result = with_retry(|| {
            let mut conn = self.provider.connection()?;
            diesel::insert_into(task_transitions::table)
                .values(NewTransitionRow { task_id: &task_id,
                                           from_status: from.as_str(),
                                           to_status: to.as_str(),
                                           message })
                .execute(&mut conn)
                .map_err(PersistenceError::from)
        });
        if let Err(e) = result {
            // el log de auditoría no bloquea el avance del workflow
            warn!("transition log insert failed for task {task_id}: {e:?}");
        }
    }
}

/// Construye un pool Postgres r2d2 a partir de URL y corre las migraciones
/// pendientes en el primer checkout.
pub fn build_pool(database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, PersistenceError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| PersistenceError::TransientIo(format!("pool build: {e}")))?;
    {
        let mut conn = pool.get()
                           .map_err(|e| PersistenceError::TransientIo(format!("pool get for migrations: {e}")))?;
        run_pending_migrations(&mut conn)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: `.env` + configuración + pool ya migrado.
pub fn build_dev_pool_from_env() -> Result<PgPool, PersistenceError> {
    crate::config::init_dotenv();
    let cfg = crate::config::DbConfig::from_env();
    build_pool(&cfg.url, cfg.min_connections, cfg.max_connections)
}
