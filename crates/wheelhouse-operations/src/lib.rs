pub mod context;
pub mod dispatch;
pub mod error;
pub mod ingest;
pub mod query;
pub mod routes;
pub mod types;
pub mod users;
pub mod xmlrpc;

#[cfg(test)]
pub(crate) mod test_utils;

pub use context::RegistryContext;
pub use error::{OperationError, Result};
pub use types::*;
