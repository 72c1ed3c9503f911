use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0}")]
    ValidationError(String),
    #[error("duplicate resource_id {resource_id} for {kind} in {region}")]
    DuplicateResourceId {
        kind: String,
        region: String,
        resource_id: String,
    },
    #[error("record not found: {kind}/{id}")]
    NotFound { kind: String, id: String },
}
