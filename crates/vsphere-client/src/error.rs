//! vSphere client errors

use thiserror::Error;

/// Faults carried by a failed hypervisor task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// A guest customization is already pending on the VM
    CustomizationPending,
    /// The operation is not valid in the VM's current power state
    InvalidPowerState,
    /// The VM is in a state that does not allow the operation
    InvalidState,
    /// Any other fault, by type name
    Other(String),
}

/// Errors that can occur when talking to the vSphere management endpoint
#[derive(Debug, Error)]
pub enum VSphereError {
    /// vSphere API returned an error
    #[error("vSphere API error: {0}")]
    Api(String),

    /// A hypervisor task completed with a fault
    #[error("Task failed: {message}")]
    TaskFailed {
        /// Fault reported by the task
        fault: Fault,
        /// Localized message from the task info
        message: String,
    },

    /// Managed object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., unknown property name)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VSphereError {
    /// True when the error is a task fault reporting a pending customization.
    pub fn is_customization_pending(&self) -> bool {
        matches!(
            self,
            VSphereError::TaskFailed { fault: Fault::CustomizationPending, .. }
        )
    }
}
