//! Registry Digest Library
//!
//! Resolves Docker image tags to manifest digests through the Docker Registry
//! HTTP API v2, negotiating bearer tokens when the registry asks for them.

pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod registry;

pub use config::{ClientConfig, Credentials, ImageReference};
pub use digest::Digest;
pub use error::{RegistryError, Result};
pub use logging::Logger;
pub use registry::{RegistryClient, RegistryClientBuilder};
