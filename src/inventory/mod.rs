pub mod builder;
pub mod document;
pub mod error;
pub mod hosts;

pub use builder::*;
pub use document::*;
pub use error::*;
pub use hosts::*;
