//! Engine-wide configuration: application identity, logging and the command configs
//! registered at initialization.

mod base;
pub mod constant;
mod entity;

pub use base::*;
pub use constant::*;
pub use entity::*;
