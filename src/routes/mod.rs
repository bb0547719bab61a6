mod access;
mod admin;
pub mod auth;
pub mod cookie;
mod health_check;

pub use access::{admin_area, current_user, user_area};
pub use admin::{revoke_all_refresh_tokens, revoke_user_refresh_tokens};
pub use health_check::health_check;
