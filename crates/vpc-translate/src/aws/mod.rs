//! Traductor AWS -> IBM.

pub mod schema;
pub mod translate;

pub use schema::AwsSourceGraph;
pub use translate::translate_aws;
