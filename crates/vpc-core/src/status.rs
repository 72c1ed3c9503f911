//! Estados de roots y tasks del motor.

use serde::{Deserialize, Serialize};

/// Estado de un `WorkflowTask` en tiempo de ejecución.
///
/// Las transiciones válidas son:
/// - `Initiated` -> `Running`
/// - `Running` -> `Successful`
/// - `Running` -> `Failed`
/// - `Running` -> `RunningWait`
/// - `RunningWait` -> `Running` (siguiente tick del scheduler, mismo handler)
///
/// `Successful` y `Failed` son absorbentes: ninguna task sale de un estado
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Creada junto al root, aún no despachada.
    Initiated,
    /// En ejecución dentro de un worker.
    Running,
    /// "Poll de nuevo más tarde": no terminal, se re-despacha el MISMO handler
    /// en el siguiente tick, que retoma desde `task_metadata`.
    RunningWait,
    /// Terminal con éxito.
    Successful,
    /// Terminal con fallo; `message` conserva la causa legible.
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Successful | TaskStatus::Failed)
    }

    /// Nombre estable en minúsculas para persistencia y logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Initiated => "initiated",
            TaskStatus::Running => "running",
            TaskStatus::RunningWait => "running_wait",
            TaskStatus::Successful => "successful",
            TaskStatus::Failed => "failed",
        }
    }
}

/// Estado de un `WorkflowRoot`, función pura de los estados de sus tasks
/// (ver `derive_root_status` en el scheduler).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RootStatus {
    /// Aceptado, ninguna task despachada todavía.
    Initiated,
    /// Al menos una task progresando o pendiente de despacho.
    Running,
    /// Todas las tasks alcanzables terminaron Successful.
    Successful,
    /// Alguna task falló y ninguna otra puede progresar.
    Failed,
}

impl RootStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RootStatus::Successful | RootStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RootStatus::Initiated => "initiated",
            RootStatus::Running => "running",
            RootStatus::Successful => "successful",
            RootStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(TaskStatus::Initiated),
            "running" => Ok(TaskStatus::Running),
            "running_wait" => Ok(TaskStatus::RunningWait),
            "successful" => Ok(TaskStatus::Successful),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

impl std::str::FromStr for RootStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiated" => Ok(RootStatus::Initiated),
            "running" => Ok(RootStatus::Running),
            "successful" => Ok(RootStatus::Successful),
            "failed" => Ok(RootStatus::Failed),
            other => Err(format!("unknown root status: {other}")),
        }
    }
}
