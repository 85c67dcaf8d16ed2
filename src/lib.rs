//! Gantry - push-to-deploy for reverse-proxy configuration
//!
//! Gantry turns a bare git repository into a deployment target: its
//! post-receive hook checks out the pushed revision, stages nginx
//! configuration out of the working tree, validates it, atomically activates
//! it, and gracefully reloads the proxy. An invalid configuration is never
//! activated; repeated pushes of the same revision are safe.

pub mod certs;
pub mod config;
pub mod doctor;
pub mod error;
pub mod fs;
pub mod git;
pub mod hook;
pub mod lock;
pub mod pipeline;
pub mod proxy;
pub mod reconcile;
pub mod state;

// Re-exports for convenience
pub use certs::{CertAction, CertOutcome, ScriptCertAction};
pub use config::{Config, Mapping, MappingKind};
pub use error::{GantryError, GantryResult};
pub use git::{GitRepo, Materializer};
pub use hook::{parse_ref_updates, selects_deploy, RefUpdate};
pub use lock::DeployLock;
pub use pipeline::{DeployEvent, DeployOutcome, DeployState, Deployment};
pub use proxy::{CommandProxy, ProxyController};
pub use state::DeployReceipt;
