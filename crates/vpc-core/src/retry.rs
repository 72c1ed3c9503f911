//! Política de reintentos ante rate-limit del proveedor.
//!
//! La política es un VALOR explícito (intentos, curva de backoff, predicado
//! de reintento) que se pasa al executor, no una anotación. Hay una
//! instancia por conexión cloud, no una global.

use std::time::Duration;

use log::warn;
use rand::Rng;
use serde_json::Value;

use crate::constants::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use crate::provider::{CloudClient, ProviderError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Intentos totales (el primero incluido).
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fracción de jitter aleatorio sobre el delay exponencial, en [0, 1].
    /// Con 0 la curva es determinista (útil en tests).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS,
               base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
               max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
               jitter: 0.25 }
    }
}

impl RetryPolicy {
    /// Política sin esperas ni jitter, para tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self { max_attempts,
               base_delay: Duration::ZERO,
               max_delay: Duration::ZERO,
               jitter: 0.0 }
    }

    /// Delay exponencial acotado para el intento `attempt` (0-based), con
    /// jitter aleatorio multiplicativo.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        if self.jitter <= 0.0 || capped.is_zero() {
            return capped;
        }
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        capped.mul_f64(factor.max(0.0))
    }

    /// Ejecuta `f` reintentando únicamente errores rate-limited, hasta agotar
    /// `max_attempts`. El último error del proveedor se devuelve textual.
    pub fn call<T, F>(&self, mut f: F) -> Result<T, ProviderError>
        where F: FnMut() -> Result<T, ProviderError>
    {
        let mut attempt = 0;
        loop {
            match f() {
                Err(e) if e.is_rate_limited() && attempt + 1 < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!("provider rate limited (attempt {}): {} -> sleeping {:?}",
                          attempt + 1,
                          e.provider_message(),
                          delay);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                r => return r,
            }
        }
    }
}

/// Handle que un handler usa para hablar con el proveedor: envuelve el
/// cliente con su política de reintentos.
pub struct ProviderHandle<'a> {
    client: &'a dyn CloudClient,
    policy: &'a RetryPolicy,
}

impl<'a> ProviderHandle<'a> {
    pub fn new(client: &'a dyn CloudClient, policy: &'a RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn call(&self, operation: &str, params: &Value) -> Result<Value, ProviderError> {
        self.policy.call(|| self.client.call(operation, params))
    }

    pub fn get_by_id(&self, resource_kind: &str, resource_id: &str) -> Result<Value, ProviderError> {
        self.policy.call(|| self.client.get_by_id(resource_kind, resource_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_rate_limited_until_cap() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::immediate(3);
        let res: Result<(), ProviderError> = policy.call(|| {
            calls.set(calls.get() + 1);
            Err(ProviderError::RateLimited("429 too many requests".into()))
        });
        assert_eq!(calls.get(), 3);
        // el mensaje del proveedor llega textual al agotar el cap
        assert_eq!(res.unwrap_err().provider_message(), "429 too many requests");
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::immediate(5);
        let res: Result<(), ProviderError> = policy.call(|| {
            calls.set(calls.get() + 1);
            Err(ProviderError::Fatal("boom".into()))
        });
        assert_eq!(calls.get(), 1);
        assert!(matches!(res.unwrap_err(), ProviderError::Fatal(_)));
    }

    #[test]
    fn delay_is_exponential_and_capped() {
        let policy = RetryPolicy { max_attempts: 10,
                                   base_delay: Duration::from_millis(10),
                                   max_delay: Duration::from_millis(50),
                                   jitter: 0.0 };
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(4), Duration::from_millis(50)); // capped
    }
}
