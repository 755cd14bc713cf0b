pub mod credentials;
pub mod execution;
pub mod inventory;

pub use credentials::*;
pub use execution::*;
pub use inventory::*;
