//! Registry module for Docker registry interactions
//!
//! This module provides the digest lookup client, bearer-token authentication
//! and the HTTP transport seam for the Docker Registry HTTP API v2.

pub mod auth;
pub mod client;
pub mod transport;

pub use auth::{BearerChallenge, BearerToken};
pub use client::{RegistryClient, RegistryClientBuilder};
pub use transport::{
    HttpTransport, ManifestRequest, RegistryTransport, TokenRequest, TransportResponse,
};
