//! Clientes cloud: implementaciones del `CloudClient` del core.

pub mod simulated;

pub use simulated::SimulatedCloudClient;
