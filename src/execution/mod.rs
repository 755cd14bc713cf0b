pub mod backend;
pub mod docker;
pub mod error;
pub mod mounts;
pub mod orchestrator;

pub use backend::*;
pub use docker::DockerCliBackend;
pub use error::*;
pub use mounts::*;
pub use orchestrator::*;
