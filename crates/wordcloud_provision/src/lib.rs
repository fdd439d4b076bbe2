//! Declarative provisioning for the word-cloud pipeline: the desired shape
//! of the bucket, function, and API is data; `plan` diffs it against what a
//! provider reports and `reconcile` applies only the delta. Running the
//! reconciler against an already-converged deployment applies nothing.

pub mod plan;
pub mod reconcile;
pub mod state;
