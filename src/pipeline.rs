//! Deployment pipeline
//!
//! One run moves a received push through checkout, staged reconciliation,
//! the certificate action, validation, activation, and reload — strictly
//! sequential, fail-fast, with an event stream for progress reporting.
//!
//! ```text
//! RECEIVED -> CHECKED_OUT -> RECONCILED -> CERT_DONE -> VALIDATED -> RELOADED
//! RECEIVED -> CHECKED_OUT -> RECONCILED -> CERT_DONE -> VALIDATION_FAILED
//! any step -> ABORTED on unexpected command error
//! ```
//!
//! Destinations are only mutated between VALIDATED and RELOADED; every
//! earlier failure leaves the live configuration byte-for-byte untouched.

use std::path::Path;

use serde::Serialize;

use crate::certs::{CertAction, CertOutcome};
use crate::config::Config;
use crate::error::{GantryError, GantryResult};
use crate::git::Materializer;
use crate::proxy::ProxyController;
use crate::reconcile::{self, ApplyReport};
use crate::state::DeployReceipt;

/// States a deployment run moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployState {
    Received,
    CheckedOut,
    Reconciled,
    CertDone,
    Validated,
    Reloaded,
}

impl std::fmt::Display for DeployState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::CheckedOut => "checked_out",
            Self::Reconciled => "reconciled",
            Self::CertDone => "cert_done",
            Self::Validated => "validated",
            Self::Reloaded => "reloaded",
        };
        f.write_str(name)
    }
}

/// Pipeline progress events for NDJSON output
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeployEvent {
    DeployStarted { reference: String, revision: String },
    CheckedOut,
    SourceMissing { source: String },
    Staged { synced: usize, skipped: usize },
    CertRan { script: String },
    CertSkipped { script: String },
    Validated,
    ValidationFailed { diagnostics: String },
    Activated { written: usize, deleted: usize, unchanged: usize },
    Reloaded { revision: String },
}

impl DeployEvent {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Result of a completed (successful) deployment run
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub revision: String,
    pub state: DeployState,
    pub activation: ApplyReport,
}

/// One deployment run, parameterized by its collaborators so tests can
/// substitute mocks for git, the certificate script, and the proxy
pub struct Deployment<'a, M, C, P>
where
    M: Materializer,
    C: CertAction,
    P: ProxyController,
{
    config: &'a Config,
    materializer: M,
    certs: C,
    proxy: P,
}

impl<'a, M, C, P> Deployment<'a, M, C, P>
where
    M: Materializer,
    C: CertAction,
    P: ProxyController,
{
    pub fn new(config: &'a Config, materializer: M, certs: C, proxy: P) -> Self {
        Self {
            config,
            materializer,
            certs,
            proxy,
        }
    }

    /// Execute the full pipeline, emitting progress events into `sink`
    pub fn run<F: FnMut(DeployEvent)>(&self, mut sink: F) -> GantryResult<DeployOutcome> {
        let work_tree = self.config.work_tree();
        let reference = &self.config.deploy.reference;

        let revision = self.materializer.resolve(reference)?;
        sink(DeployEvent::DeployStarted {
            reference: reference.clone(),
            revision: revision.clone(),
        });

        self.materializer.materialize(reference)?;
        sink(DeployEvent::CheckedOut);

        let staging = tempfile::Builder::new().prefix("gantry-stage-").tempdir()?;
        let stage_report = reconcile::stage(&work_tree, &self.config.sync, staging.path())?;
        for skipped in &stage_report.skipped {
            sink(DeployEvent::SourceMissing {
                source: skipped.source.display().to_string(),
            });
        }
        sink(DeployEvent::Staged {
            synced: stage_report.staged.len(),
            skipped: stage_report.skipped.len(),
        });

        let script = self.certs.script().display().to_string();
        match self.certs.run(&work_tree)? {
            CertOutcome::Ran => sink(DeployEvent::CertRan { script }),
            CertOutcome::Skipped => sink(DeployEvent::CertSkipped { script }),
        }

        // Validate the staged primary config; if the push didn't carry one,
        // fall back to the live destination path.
        let conf = stage_report
            .staged_primary()
            .map(Path::to_path_buf)
            .or_else(|| self.config.primary_conf().map(|m| m.dest.clone()));
        match self.proxy.validate(conf.as_deref()) {
            Ok(()) => sink(DeployEvent::Validated),
            Err(GantryError::ValidationFailed { diagnostics }) => {
                sink(DeployEvent::ValidationFailed {
                    diagnostics: diagnostics.clone(),
                });
                return Err(GantryError::ValidationFailed { diagnostics });
            }
            Err(other) => return Err(other),
        }

        let activation = reconcile::apply(&stage_report.staged)?;
        sink(DeployEvent::Activated {
            written: activation.written.len(),
            deleted: activation.deleted.len(),
            unchanged: activation.unchanged.len(),
        });

        self.proxy.reload()?;
        sink(DeployEvent::Reloaded {
            revision: revision.clone(),
        });

        DeployReceipt::record(&revision, reference).save(&work_tree)?;

        Ok(DeployOutcome {
            revision,
            state: DeployState::Reloaded,
            activation,
        })
    }
}
