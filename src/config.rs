//! Configuración del plano de control desde variables de entorno.
//! El intervalo de poll es un asunto de deployment, no del motor: acá vive
//! el default y su override por entorno.

use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    /// Delay entre ticks del scheduler (re-encolado de RUNNING_WAIT).
    pub poll_interval: Duration,
    /// Intentos ante rate-limit por conexión cloud.
    pub retry_max_attempts: u32,
    /// Backoff base de la política de reintentos, en milisegundos.
    pub retry_base_delay_ms: u64,
}

impl ControlPlaneConfig {
    pub fn from_env() -> Self {
        Lazy::force(&DOTENV_LOADED);
        let poll_ms = env::var("SCHEDULER_POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(500u64);
        let retry_max_attempts = env::var("PROVIDER_RETRY_MAX_ATTEMPTS").ok()
                                                                        .and_then(|v| v.parse().ok())
                                                                        .unwrap_or(5);
        let retry_base_delay_ms = env::var("PROVIDER_RETRY_BASE_DELAY_MS").ok()
                                                                          .and_then(|v| v.parse().ok())
                                                                          .unwrap_or(25);
        Self { poll_interval: Duration::from_millis(poll_ms),
               retry_max_attempts,
               retry_base_delay_ms }
    }
}

/// Forzar carga temprana de .env si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}
