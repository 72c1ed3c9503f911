//! Constantes del motor de orquestación.
//!
//! Este módulo agrupa valores estáticos compartidos por el scheduler y el
//! executor. Cambios aquí afectan la compatibilidad de claves de dedup
//! (`fe_request_hash`) entre versiones del motor.

/// Versión lógica del motor. Se incluye en la clave de dedup de requests para
/// que un cambio incompatible del motor no colisione con roots en vuelo de
/// versiones anteriores. Mantener estable mientras no haya cambios
/// incompatibles.
pub const ENGINE_VERSION: &str = "V1.0";

/// Intentos máximos por defecto ante rate-limit del proveedor (política
/// sustituible por conexión, ver `RetryPolicy`).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff base por defecto en milisegundos para la política de reintentos.
pub const DEFAULT_BASE_DELAY_MS: u64 = 25;

/// Tope de backoff por defecto en milisegundos.
pub const DEFAULT_MAX_DELAY_MS: u64 = 2_000;
