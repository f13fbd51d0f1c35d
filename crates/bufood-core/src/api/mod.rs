//! REST API client module for the storefront backend.
//!
//! This module provides the `StorefrontApi` trait consumed by the
//! reconciler, and `ApiClient`, its reqwest-backed implementation.
//!
//! Catalog endpoints are public; cart endpoints use a bearer token
//! obtained at login and kept in the OS keychain.

pub mod client;
pub mod error;
pub mod traits;

pub use client::ApiClient;
pub use error::ApiError;
pub use traits::StorefrontApi;
