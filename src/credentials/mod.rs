pub mod error;
pub mod keygen;
pub mod manager;
pub mod public_key;

pub use error::*;
pub use keygen::*;
pub use manager::*;
pub use public_key::*;
