mod pagination;
mod points;
mod user;

pub use pagination::*;
pub use points::*;
pub use user::*;
