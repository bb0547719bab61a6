/// Middleware module
///
/// Request authentication gate that runs ahead of every `/api` handler.

mod authentication;

pub use authentication::{resolve_principal, AuthGate, GateOutcome, TokenSource};
