mod admin_auth;
mod rate_limit;

pub use admin_auth::*;
pub use rate_limit::*;
