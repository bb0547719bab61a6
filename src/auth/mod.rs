/// Authentication module
///
/// Password verification, access-token signing/validation, refresh-token
/// lifecycle and the flows that compose them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod service;

pub use claims::Claims;
pub use jwt::AccessTokenCodec;
pub use password::{CredentialVerifier, MAX_HASH_COST, MIN_HASH_COST};
pub use refresh_token::{generate_refresh_token, RefreshToken, RefreshTokenStore};
pub use service::{AuthService, IssuedTokens};
