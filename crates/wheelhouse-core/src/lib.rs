//! Ownership resolution, artifact storage and the publish operation of the wheelhouse
//! registry.

pub mod constants;
pub mod database;
pub mod error;
pub mod ownership;
pub mod publish;
pub mod storage;

pub use error::{RegistryError, Result};
