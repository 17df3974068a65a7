mod order;
mod subscription;
mod token;
mod trial;

pub use order::*;
pub use subscription::*;
pub use token::*;
pub use trial::*;
