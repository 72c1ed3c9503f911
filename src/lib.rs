//! vpcplus-rust: plano de control de recursos VPC.
//!
//! Orquesta operaciones multi-paso sobre clouds remotos con un motor de
//! workflows persistido (vpc-core), traduce grafos de recursos de clouds
//! fuente (vpc-translate) y mantiene el inventario local (vpc-domain). Esta
//! crate raíz aporta la capa externa: builders de DAGs por acción de
//! usuario, configuración y el poll loop del scheduler.

pub mod config;
pub mod runner;
pub mod workflow;

pub use config::{init_dotenv, ControlPlaneConfig};
pub use runner::run_poll_loop;
