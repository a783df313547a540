//! Prints every VM Operator CRD as a multi-document YAML stream.

use crds::{VirtualMachine, VirtualMachineClass, VirtualMachineImage, VirtualMachineSetResourcePolicy};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        VirtualMachine::crd(),
        VirtualMachineClass::crd(),
        VirtualMachineImage::crd(),
        VirtualMachineSetResourcePolicy::crd(),
    ];

    for crd in crds {
        print!("---\n{}", serde_yaml::to_string(&crd)?);
    }

    Ok(())
}
