//! Controller-specific error types.
//!
//! Errors fall in two groups. Fatal errors abort the convergence pass and are
//! returned to the invoker with `?`. Recoverable errors are collected in
//! [`StepErrors`] while the pass keeps going and are turned into a single
//! [`AggregateError`] at the end.

use std::fmt;

use thiserror::Error;
use tracing::error;
use vsphere_client::{VSphereError, VirtualMachineConnectionState};

/// Errors that can occur while converging a VirtualMachine.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// vSphere API error
    #[error("vSphere error: {0}")]
    VSphere(#[from] VSphereError),

    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// The hypervisor did not report a config for the VM
    #[error("VM config is not available, connectionState={0}")]
    ConfigUnavailable(VirtualMachineConnectionState),

    /// A requested property was missing from the property collector result
    #[error("VM property not returned: {0}")]
    MissingProperty(&'static str),

    /// A claimed persistent volume is not attached yet
    #[error("Persistent volume: {0} not attached to VM")]
    VolumeNotAttached(String),

    /// A claimed persistent volume has no status entry yet
    #[error("Status update pending for persistent volume: {0} on VM")]
    VolumeStatusPending(String),

    /// Cluster module group missing from the resource policy
    #[error("ClusterModule {0} not found")]
    ClusterModuleNotFound(String),

    /// Network interface could not be provisioned
    #[error("Network interface error: {0}")]
    NetworkInterface(String),

    /// Nameserver list could not be read
    #[error("Nameserver lookup failed: {0}")]
    Nameservers(String),

    /// Template could not be rendered
    #[error("Template error: {0}")]
    Template(#[from] crate::template::TemplateError),

    /// Resource quantity could not be parsed
    #[error("Invalid quantity {0:?}: {1}")]
    InvalidQuantity(String, String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Several recoverable errors collected during one pass
    #[error("{0}")]
    Aggregate(AggregateError),
}

impl ControllerError {
    /// True for precondition-not-met errors that clear up on their own,
    /// so the invoker can requeue with backoff instead of reporting a failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            ControllerError::VolumeNotAttached(_)
            | ControllerError::VolumeStatusPending(_)
            | ControllerError::ConfigUnavailable(_) => true,
            ControllerError::Aggregate(agg) => agg.errors().iter().all(ControllerError::is_retryable),
            _ => false,
        }
    }
}

/// Several errors reported as one, without losing any message.
#[derive(Debug)]
pub struct AggregateError(Vec<ControllerError>);

impl AggregateError {
    /// The individual errors, in the order they were collected.
    pub fn errors(&self) -> &[ControllerError] {
        &self.0
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.0.as_slice() {
            return write!(f, "{single}");
        }
        f.write_str("[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for AggregateError {}

/// Recoverable errors collected over one convergence pass.
///
/// `log_only` errors are logged when collected and never fail the pass.
/// `report` errors are returned from [`StepErrors::finish`].
#[derive(Debug, Default)]
pub struct StepErrors {
    reported: Vec<ControllerError>,
    logged: usize,
}

impl StepErrors {
    /// Record an error that is logged but never returned.
    pub fn log_only(&mut self, vm_key: &str, step: &str, err: ControllerError) {
        error!("VM {}: {} failed, continuing: {}", vm_key, step, err);
        self.logged += 1;
    }

    /// Record an error to be returned once the pass finishes.
    pub fn report(&mut self, err: ControllerError) {
        self.reported.push(err);
    }

    /// Number of log-only errors seen so far.
    pub fn logged_count(&self) -> usize {
        self.logged
    }

    /// Ok when nothing was reported, else every reported error as one.
    pub fn finish(self) -> Result<(), ControllerError> {
        if self.reported.is_empty() {
            Ok(())
        } else {
            Err(ControllerError::Aggregate(AggregateError(self.reported)))
        }
    }
}
