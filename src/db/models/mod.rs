mod favorite;
mod user;

pub use favorite::*;
pub use user::*;
