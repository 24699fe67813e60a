use thiserror::Error;

use retry_executor::ExecutionError;
use toolgate_core_types::GuardrailViolation;

/// Failures surfaced by guarded execution. Admission denials carry the
/// displayable reason and the violation that produced them; plain
/// `authorize` never errors — it returns the decision as data.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    #[error("call denied: {reason}")]
    Denied {
        reason: String,
        violation: Option<GuardrailViolation>,
    },
    #[error("approval required: {reason}")]
    ApprovalRequired { reason: String },
    #[error("approval rejected: {reason}")]
    ApprovalRejected { reason: String },
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}
