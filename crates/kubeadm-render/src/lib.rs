//! Kubeadm configuration renderer
//!
//! Turns structured kubeadm init/join parameters into the config file and
//! command line a node runs on first boot.
//!
//! # Example
//!
//! ```no_run
//! use crds::JoinConfiguration;
//! use kubeadm_render::{KubeadmInvocation, KubeadmRenderer, YamlKubeadmRenderer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let join = JoinConfiguration::default();
//! let rendered = YamlKubeadmRenderer::new()
//!     .render(KubeadmInvocation::Join { join: &join })
//!     .await?;
//! println!("{}", rendered.command);
//! # Ok(())
//! # }
//! ```

pub mod error;
#[path = "trait.rs"]
pub mod renderer_trait;
pub mod yaml;
#[cfg(feature = "test-util")]
pub mod mock;

pub use error::KubeadmRenderError;
pub use renderer_trait::{KubeadmCommand, KubeadmInvocation, KubeadmRenderer};
pub use yaml::{YamlKubeadmRenderer, INIT_CONFIG_PATH, JOIN_CONFIG_PATH, KUBEADM_API_VERSION};
#[cfg(feature = "test-util")]
pub use mock::MockKubeadmRenderer;
