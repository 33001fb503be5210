pub mod acl;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod provision;
pub mod reconcile;
pub mod report;

pub use config::Config;
pub use error::{ProvisionError, Result};
pub use provision::{Provisioner, RunMode};
