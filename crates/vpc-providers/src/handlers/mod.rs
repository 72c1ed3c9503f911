//! Handlers genéricos del executor: las ~familias de operaciones del plano
//! de control colapsadas en el patrón create / create_wait / delete / sync /
//! discovery / backup.

pub mod backup;
pub mod create;
pub mod delete;
pub mod recommend;
pub mod sync;

pub use backup::{BackupInstanceWaitHandler, MAX_PING_ITERATIONS};
pub use create::{CreateResourceHandler, CreateWaitHandler, IssueCreateHandler};
pub use delete::DeleteResourceHandler;
pub use recommend::RecommendationsHandler;
pub use sync::{DiscoveryHandler, SyncResourceHandler};
