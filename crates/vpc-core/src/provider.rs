//! Frontera hacia los SDKs cloud.
//!
//! El core no conoce ningún SDK concreto: consume un `CloudClient` opaco y
//! sólo exige poder clasificar un error en {rate_limited, auth_invalid,
//! not_found, fatal} y re-emitir lecturas idempotentes (get por id) para
//! polling.

use serde_json::Value;
use thiserror::Error;

/// Error del proveedor remoto ya clasificado. El mensaje original del
/// proveedor se conserva textual: termina en `WorkflowTask::message` cuando
/// el error es terminal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Límite de tasa: reintentable dentro de la misma invocación con
    /// backoff (ver `RetryPolicy`).
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Credenciales inválidas/expiradas: terminal, además invalida la cuenta.
    #[error("auth invalid: {0}")]
    AuthInvalid(String),
    /// El recurso remoto no existe. Éxito para tasks con sabor a borrado.
    #[error("not found: {0}")]
    NotFound(String),
    /// Error definitivo reportado por el proveedor.
    #[error("provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }

    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, ProviderError::AuthInvalid(_))
    }

    /// Mensaje del proveedor sin el prefijo de clasificación.
    pub fn provider_message(&self) -> &str {
        match self {
            ProviderError::RateLimited(m)
            | ProviderError::AuthInvalid(m)
            | ProviderError::NotFound(m)
            | ProviderError::Fatal(m) => m,
        }
    }
}

/// Cliente cloud opaco: una conexión autenticada hacia un proveedor
/// (IBM VPC, Softlayer, AWS). Las implementaciones viven fuera del core.
pub trait CloudClient: Send + Sync {
    /// Invoca una operación remota con parámetros JSON.
    fn call(&self, operation: &str, params: &Value) -> Result<Value, ProviderError>;

    /// Lectura idempotente por id, re-emitible para polling.
    fn get_by_id(&self, resource_kind: &str, resource_id: &str) -> Result<Value, ProviderError>;
}
