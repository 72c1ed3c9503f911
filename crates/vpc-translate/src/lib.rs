//! vpc-translate: traducción de grafos de recursos de clouds fuente (AWS,
//! classic/Softlayer) al grafo de recursos con forma IBM, con referencias
//! cruzadas resueltas vía índice compartido. Todo en memoria: el resultado
//! se vuelve payloads de workflows de creación, nunca se persiste directo.
pub mod aws;
pub mod error;
pub mod index;
pub mod limits;
pub mod output;
pub mod softlayer;

pub use aws::{translate_aws, AwsSourceGraph};
pub use error::{FieldError, TranslationError};
pub use index::{TranslatedRef, TranslatedResources};
pub use limits::{clamp_capacity_gb, clamp_iops, derive_instance_profile, protocol_name, InstanceProfile,
                 ProfileFamily};
pub use output::{kind, TranslatedResource, TranslationOutput, CREATION_ORDER};
pub use softlayer::{translate_softlayer, zone_for_datacenter, SoftlayerSourceGraph};
