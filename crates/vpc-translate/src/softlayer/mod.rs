//! Traductor classic (Softlayer) -> IBM.

pub mod firewall;
pub mod schema;
pub mod translate;

pub use schema::SoftlayerSourceGraph;
pub use translate::{translate_softlayer, zone_for_datacenter};
