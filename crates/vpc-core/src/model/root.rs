//! `WorkflowRoot`: handle de una operación multi-paso iniciada por un
//! usuario ("create Load Balancer", "migrate classic VSI", ...).
//!
//! Un root posee un DAG de tasks (por ids, arena en el store) y cero o más
//! *callback roots* que arrancan sólo cuando este root llega a Successful.
//! Los roots se conservan tras terminar (auditoría/historial); nunca se
//! borran mientras referencien operaciones remotas vivas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::constants::ENGINE_VERSION;
use crate::hashing::hash_value;
use crate::status::RootStatus;

/// Naturaleza de la operación que representa el root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowNature {
    Create,
    Delete,
    Sync,
    Add,
    Backup,
    Restore,
    StartStop,
    Discovery,
    Migrate,
    FetchCost,
}

impl WorkflowNature {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowNature::Create => "create",
            WorkflowNature::Delete => "delete",
            WorkflowNature::Sync => "sync",
            WorkflowNature::Add => "add",
            WorkflowNature::Backup => "backup",
            WorkflowNature::Restore => "restore",
            WorkflowNature::StartStop => "start_stop",
            WorkflowNature::Discovery => "discovery",
            WorkflowNature::Migrate => "migrate",
            WorkflowNature::FetchCost => "fetch_cost",
        }
    }
}

impl std::str::FromStr for WorkflowNature {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => WorkflowNature::Create,
            "delete" => WorkflowNature::Delete,
            "sync" => WorkflowNature::Sync,
            "add" => WorkflowNature::Add,
            "backup" => WorkflowNature::Backup,
            "restore" => WorkflowNature::Restore,
            "start_stop" => WorkflowNature::StartStop,
            "discovery" => WorkflowNature::Discovery,
            "migrate" => WorkflowNature::Migrate,
            "fetch_cost" => WorkflowNature::FetchCost,
            other => return Err(format!("unknown workflow nature: {other}")),
        })
    }
}

/// Tipo del root: normal u ON_SUCCESS (callback de otro root).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootType {
    Normal,
    OnSuccess,
}

impl RootType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RootType::Normal => "normal",
            RootType::OnSuccess => "on_success",
        }
    }
}

impl std::str::FromStr for RootType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(RootType::Normal),
            "on_success" => Ok(RootType::OnSuccess),
            other => Err(format!("unknown root type: {other}")),
        }
    }
}

/// Identidad del solicitante (usuario + proyecto) para dedup y auditoría.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: String,
    pub project_id: String,
}

impl Owner {
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), project_id: project_id.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRoot {
    pub id: Uuid,
    pub owner: Owner,
    pub workflow_name: String,
    pub nature: WorkflowNature,
    pub status: RootStatus,
    pub root_type: RootType,
    /// Clave de dedup: hash canónico del request original. Dos requests
    /// idénticos del mismo owner+nature no deben producir dos roots en vuelo.
    pub fe_request_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Tasks del DAG (ids dentro del arena del store).
    pub task_ids: Vec<Uuid>,
    /// Roots ON_SUCCESS a disparar cuando este root termine Successful.
    pub callback_ids: Vec<Uuid>,
    /// Para un callback root, el root padre que lo dispara.
    pub parent_id: Option<Uuid>,
    /// Invariante fire-once: los callbacks de este root ya fueron activados.
    pub callbacks_fired: bool,
}

impl WorkflowRoot {
    pub fn new(owner: Owner, workflow_name: impl Into<String>, nature: WorkflowNature) -> Self {
        Self { id: Uuid::new_v4(),
               owner,
               workflow_name: workflow_name.into(),
               nature,
               status: RootStatus::Initiated,
               root_type: RootType::Normal,
               fe_request_hash: None,
               created_at: Utc::now(),
               task_ids: Vec::new(),
               callback_ids: Vec::new(),
               parent_id: None,
               callbacks_fired: false }
    }

    /// Fija la clave de dedup a partir del payload original del request.
    /// La versión del motor participa del hash para aislar formatos entre
    /// versiones incompatibles.
    pub fn with_fe_request(mut self, fe_request: &Value) -> Self {
        let keyed = serde_json::json!({
            "engine_version": ENGINE_VERSION,
            "request": fe_request,
        });
        self.fe_request_hash = Some(hash_value(&keyed));
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Tasks sin predecesores: el frente inicial de despacho.
    pub fn initial_task_ids<'a>(&self, tasks: impl Iterator<Item = &'a crate::model::WorkflowTask>) -> Vec<Uuid> {
        tasks.filter(|t| t.previous.is_empty()).map(|t| t.id).collect()
    }
}
