pub mod stats;
pub mod trade;
pub mod user;

pub use stats::*;
pub use trade::*;
pub use user::*;
