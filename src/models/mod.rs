mod product;
mod storefront;
mod user;

pub use product::*;
pub use storefront::*;
pub use user::*;
