//! # parley-auth
//!
//! Bearer credential handling for Parley.
//!
//! ## Modules
//!
//! - `jwt`: token claims, signing and verification
//! - `authenticator`: the verification seam used by the realtime engine
//! - `token`: credential extraction from request metadata

pub mod authenticator;
pub mod jwt;
pub mod token;

pub use authenticator::{Authenticator, JwtAuthenticator};
pub use jwt::{Claims, JwtDecoder, JwtEncoder};
pub use token::extract_token;
