//! Capa de workflows de la aplicación: arma los DAGs por acción de usuario.

pub mod builders;

pub use builders::{create_load_balancer_root, creation_root_from_translation, delete_resource_root,
                   domain_kind_for, migrate_classic_instance_root, usage_sync_root, IBM_CONNECTION,
                   SOFTLAYER_CONNECTION};
