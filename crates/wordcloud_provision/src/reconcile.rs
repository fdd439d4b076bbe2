//! Observe → plan → apply → re-observe. The provisioner seam keeps the
//! engine testable without a cloud account; the AWS-backed implementation
//! lives in the deployment binary.

use crate::plan::{plan, PlannedAction, ReconcilePlan};
use crate::state::{DesiredState, ObservedState};

/// Provider seam. Errors are plain strings at this boundary; the engine
/// wraps them with the failing phase.
pub trait Provisioner {
    fn observe(&mut self) -> Result<ObservedState, String>;
    fn apply(&mut self, action: &PlannedAction) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileError {
    Observe(String),
    Apply { action: String, message: String },
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Observe(message) => write!(f, "observing deployment failed: {message}"),
            Self::Apply { action, message } => {
                write!(f, "applying `{action}` failed: {message}")
            }
        }
    }
}

impl std::error::Error for ReconcileError {}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileReport {
    pub applied: Vec<PlannedAction>,
    /// True when the follow-up observation matches the desired state.
    pub converged: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Drive the deployment toward `desired`. Applies only the planned delta,
/// then re-observes to verify convergence. A second run against the same
/// provisioner applies nothing.
pub fn reconcile(
    desired: &DesiredState,
    provisioner: &mut impl Provisioner,
) -> Result<ReconcileReport, ReconcileError> {
    let observed = provisioner.observe().map_err(ReconcileError::Observe)?;
    let ReconcilePlan { actions } = plan(desired, &observed);

    let mut applied = Vec::with_capacity(actions.len());
    for action in actions {
        provisioner
            .apply(&action)
            .map_err(|message| ReconcileError::Apply {
                action: action.to_string(),
                message,
            })?;
        applied.push(action);
    }

    let observed = provisioner.observe().map_err(ReconcileError::Observe)?;
    let followup = plan(desired, &observed);
    Ok(ReconcileReport {
        applied,
        converged: followup.is_empty(),
    })
}
