//! Authentication module
//!
//! Password records, bearer tokens, and the signup / login flow built on
//! them.

pub mod handlers;
pub mod password;
mod service;
pub mod token;

pub use password::{hash_password, verify_password};
pub use service::{AuthService, MIN_PASSWORD_LENGTH};
pub use token::{ClaimValue, Claims, TokenAlgorithm, TokenIssuer};
