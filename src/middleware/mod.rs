pub mod auth;
pub mod guards;

pub use auth::{verify_token, Claims};
pub use guards::User;
