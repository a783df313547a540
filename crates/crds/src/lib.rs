//! VM Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions consumed by the VM convergence engine.

pub mod conditions;
pub mod virtual_machine;
pub mod virtual_machine_class;
pub mod virtual_machine_image;
pub mod resource_policy;

pub use conditions::*;
pub use virtual_machine::*;
pub use virtual_machine_class::*;
pub use virtual_machine_image::*;
pub use resource_policy::*;

/// API group shared by every VM Operator CRD
pub const API_GROUP: &str = "vmoperator.microscaler.io";
