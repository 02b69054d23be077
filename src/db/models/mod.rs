mod persona;
mod user;

pub use persona::*;
pub use user::*;
