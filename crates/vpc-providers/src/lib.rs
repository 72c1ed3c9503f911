// vpc-providers: handlers genéricos + clientes cloud
pub mod clients;
pub mod handlers;

pub use clients::SimulatedCloudClient;
pub use handlers::{BackupInstanceWaitHandler, CreateResourceHandler, CreateWaitHandler, DeleteResourceHandler,
                   DiscoveryHandler, IssueCreateHandler, RecommendationsHandler, SyncResourceHandler,
                   MAX_PING_ITERATIONS};
