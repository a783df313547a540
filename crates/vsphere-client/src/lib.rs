//! vSphere Client
//!
//! Typed view of the vSphere virtual machine object model used by the VM
//! convergence engine, and the narrow session interface it drives.
//!
//! # Example
//!
//! ```no_run
//! use vsphere_client::{VSphereClientTrait, VirtualMachinePowerState};
//!
//! # async fn example(client: &dyn VSphereClientTrait) -> Result<(), vsphere_client::VSphereError> {
//! let vm_ref = client.get_virtual_machine("default", "my-vm").await?;
//! let props = client.get_properties(&vm_ref, &["config", "runtime"]).await?;
//! if props.runtime.map(|r| r.power_state) == Some(VirtualMachinePowerState::PoweredOff) {
//!     client.set_power_state(&vm_ref, VirtualMachinePowerState::PoweredOn).await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Object model**: config info, devices with closed backing enums, guest and summary info
//! - **Config spec**: sparse reconfigure delta whose default value is a literal no-op
//! - **Mocking**: `MockVSphereClient` (feature `test-util`) applies reconfigures in memory

pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod vsphere_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use error::{Fault, VSphereError};
pub use models::*;
pub use vsphere_trait::VSphereClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockVSphereClient};
