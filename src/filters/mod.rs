pub mod error;
pub mod wall_kf;

pub use error::{FilterError, FilterResult};
pub use wall_kf::{Belief, FilterConfig, FilterSnapshot, StepInput, WallFilter};
