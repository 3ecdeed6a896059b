mod leap_array;
mod metrics_window;
mod outcome_bucket;

pub use leap_array::*;
pub use metrics_window::*;
pub use outcome_bucket::*;
