//! Cuentas cloud (credenciales) y su estado de validez.
//!
//! Un AuthInvalid del proveedor marca la cuenta `Invalid`; el scheduler
//! cortocircuita las tasks de una cuenta inválida sin invocar handlers
//! (las llamadas estarían condenadas).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudAccount {
    pub id: String,
    pub name: String,
    /// Proveedor de la conexión: "ibm-cloud", "softlayer", "aws".
    pub provider: String,
    pub status: AccountStatus,
}

impl CloudAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self { id: id.into(),
               name: name.into(),
               provider: provider.into(),
               status: AccountStatus::Valid }
    }

    pub fn is_valid(&self) -> bool {
        self.status == AccountStatus::Valid
    }

    pub fn invalidate(&mut self) {
        self.status = AccountStatus::Invalid;
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("serialize CloudAccount")
    }

    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        serde_json::from_value(value.clone())
            .map_err(|e| DomainError::ValidationError(format!("bad cloud account: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        // el scheduler compara contra el string "invalid" en el JSON del
        // puerto de dominio
        let mut account = CloudAccount::new("acc-1", "prod", "ibm-cloud");
        account.invalidate();
        let value = account.to_value();
        assert_eq!(value["status"], "invalid");
        let back = CloudAccount::from_value(&value).unwrap();
        assert_eq!(back.status, AccountStatus::Invalid);
    }
}
