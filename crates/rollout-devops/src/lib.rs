//! Rollout-DevOps: Azure DevOps REST sources for the reconciliation engine
//!
//! [`DevOpsClient`] implements every source trait the engine depends on, so
//! a single client wires up a [`rollout_core::Sources`]:
//!
//! ```ignore
//! let client = Arc::new(DevOpsClient::from_env()?);
//! let reconciler = Reconciler::new(Sources::from_client(client), options);
//! ```

pub mod client;
pub mod config;
pub mod error;
mod wire;

pub use client::{DevOpsClient, API_VERSION};
pub use config::DevOpsConfig;
pub use error::{DevOpsError, Result};
