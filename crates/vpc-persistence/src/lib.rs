//! vpc-persistence: backend Postgres (Diesel) del `WorkflowStore`.
pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use error::PersistenceError;
pub use pg::{build_dev_pool_from_env, build_pool, ConnectionProvider, PgPool, PgWorkflowStore, PoolProvider};
