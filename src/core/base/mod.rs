pub mod constant;
mod error;
mod key;
mod outcome;

pub use constant::*;
pub use error::*;
pub use key::*;
pub use outcome::*;
