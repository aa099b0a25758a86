//! Prints the KubeadmConfig CustomResourceDefinition as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/kubeadmconfig.yaml`

use crds::KubeadmConfig;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&KubeadmConfig::crd())?);
    Ok(())
}
