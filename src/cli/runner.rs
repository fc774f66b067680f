//! Runner resolving every image named on the command line

use crate::cli::args::Args;
use crate::config::{ClientConfig, Credentials, ImageReference};
use crate::digest::Digest;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::{RegistryClient, RegistryTransport};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of one image lookup
#[derive(Debug, Serialize)]
pub struct LookupReport {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub exit_code: i32,
}

pub struct Runner {
    args: Args,
    output: Logger,
    transport: Option<Arc<dyn RegistryTransport>>,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate().map_err(RegistryError::Configuration)?;

        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Ok(Self {
            args,
            output,
            transport: None,
        })
    }

    /// Route all lookups through `transport` instead of reqwest
    pub fn with_transport(mut self, transport: Arc<dyn RegistryTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub async fn run(&self) -> Result<Vec<LookupReport>> {
        self.output.section("Registry Digest");

        let credentials = self.credentials()?;
        let config = ClientConfig::default()
            .with_timeout(self.args.timeout())
            .with_skip_tls(self.args.skip_tls)
            .with_insecure(self.args.insecure);

        // One client per registry host, reused across that host's images
        let mut clients: HashMap<String, RegistryClient> = HashMap::new();
        let mut reports = Vec::with_capacity(self.args.images.len());

        for image in &self.args.images {
            let reference = match ImageReference::parse(image) {
                Ok(reference) => reference,
                Err(e) => {
                    self.output.error(&format!("{}: {}", image, e));
                    reports.push(Self::failure(image, &e));
                    continue;
                }
            };

            let client = match clients.get(&reference.registry) {
                Some(client) => client.clone(),
                None => {
                    let mut builder = RegistryClient::builder(reference.registry.clone())
                        .with_auth(credentials.clone())
                        .with_config(config.clone())
                        .with_logger(self.output.clone());
                    if let Some(transport) = &self.transport {
                        builder = builder.with_transport(transport.clone());
                    }
                    let client = builder.build()?;
                    clients.insert(reference.registry.clone(), client.clone());
                    client
                }
            };

            match client
                .get_image_digest(&reference.repository, &reference.tag)
                .await
            {
                Ok(digest) => {
                    self.output.success(&format!("{} -> {}", image, digest));
                    reports.push(LookupReport {
                        image: image.clone(),
                        digest: Some(digest),
                        error: None,
                        exit_code: 0,
                    });
                }
                Err(e) => {
                    self.output.error(&format!("{}: {}", image, e));
                    reports.push(Self::failure(image, &e));
                }
            }
        }

        self.output.info(&format!(
            "Resolved {}/{} images in {}",
            reports.iter().filter(|r| r.digest.is_some()).count(),
            reports.len(),
            self.output.format_duration(self.output.elapsed())
        ));

        Ok(reports)
    }

    /// Render reports for stdout in the requested format
    pub fn render(&self, reports: &[LookupReport]) -> Result<String> {
        if self.args.output == "json" {
            return Ok(serde_json::to_string_pretty(reports)?);
        }

        Ok(reports
            .iter()
            .filter_map(|r| r.digest.as_ref().map(|d| format!("{} {}", r.image, d)))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Process exit code: not-found outranks authorization, which outranks other failures
    pub fn exit_code(reports: &[LookupReport]) -> i32 {
        const PRIORITY: [i32; 3] = [2, 3, 1];
        PRIORITY
            .into_iter()
            .find(|code| reports.iter().any(|r| r.exit_code == *code))
            .unwrap_or(0)
    }

    pub fn error_exit_code(error: &RegistryError) -> i32 {
        match error {
            RegistryError::ImageNotFound { .. } => 2,
            RegistryError::Authorization(_) => 3,
            _ => 1,
        }
    }

    fn credentials(&self) -> Result<Option<Credentials>> {
        if let Some(auth) = &self.args.auth {
            return Credentials::from_auth(auth).map(Some);
        }
        match &self.args.username {
            Some(username) => Credentials::basic(
                username,
                self.args.password.as_deref().unwrap_or_default(),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn failure(image: &str, error: &RegistryError) -> LookupReport {
        LookupReport {
            image: image.to_string(),
            digest: None,
            error: Some(error.to_string()),
            exit_code: Self::error_exit_code(error),
        }
    }
}
