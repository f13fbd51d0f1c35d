//! Access token storage.
//!
//! The storefront authenticates with a bearer token. Tokens live in the OS
//! keychain via `keyring`, keyed by account; `BUFOOD_TOKEN` overrides them.

pub mod credentials;

pub use credentials::TokenStore;
