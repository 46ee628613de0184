//! Auth module for directory API credentials
//!
//! The token is opaque to this crate; it is only placed in the
//! `Authorization` header with the configured scheme.

mod token;

pub use token::{AuthScheme, TokenAuth};
