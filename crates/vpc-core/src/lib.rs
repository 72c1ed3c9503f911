//! vpc-core: motor de orquestación de workflows cloud (roots + tasks DAG).
pub mod builder;
pub mod constants;
pub mod errors;
pub mod executor;
pub mod hashing;
pub mod model;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod store;

pub use builder::RootBuilder;
pub use errors::{classify_error, EngineError, ErrorClass};
pub use executor::{ClientSet, DomainPort, InMemoryDomainPort, TaskContext, TaskHandler, TaskOutcome, UnitOfWork,
                   CLOUD_ACCOUNT_KIND, METADATA_ACCOUNT_KEY};
pub use model::{Owner, RootType, TaskType, WorkflowNature, WorkflowRoot, WorkflowTask};
pub use provider::{CloudClient, ProviderError};
pub use registry::{HandlerKey, HandlerRegistry};
pub use retry::{ProviderHandle, RetryPolicy};
pub use scheduler::{derive_root_status, Scheduler, TickReport};
pub use status::{RootStatus, TaskStatus};
pub use store::{InMemoryWorkflowStore, TaskTransition, WorkflowStore};
