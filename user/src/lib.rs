//! Credential resolution for the telemetry API.
//!
//! Requests authenticate either with a scoped access token in the `CA-Token`
//! header or with HTTP Basic credentials. Tokens are stored as SHA-256 hashes,
//! passwords as Argon2 PHC strings.

pub mod error;
pub mod hashing;
pub mod resolver;

pub use error::{Result, UserError};
pub use hashing::{hash_password, hash_token, verify_password};
pub use resolver::CredentialResolver;
