// vpc-domain library entry point
pub mod account;
pub mod error;
pub mod record;
pub mod store;

pub use account::{AccountStatus, CloudAccount};
pub use error::DomainError;
pub use record::{kinds, payload_checksum, ResourceRecord};
pub use store::DomainStore;
