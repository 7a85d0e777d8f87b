pub mod filters;
pub mod order;
pub mod user;

pub use filters::*;
pub use order::*;
pub use user::*;
