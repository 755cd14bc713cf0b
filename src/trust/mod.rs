pub mod authorized_keys;
pub mod distributor;
pub mod error;
pub mod session;
pub mod ssh;

pub use authorized_keys::*;
pub use distributor::*;
pub use error::*;
pub use session::*;
pub use ssh::Ssh2Connector;
