//! Command-line argument parsing

use crate::config::DEFAULT_TIMEOUT_SECS;
use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "registry-digest")]
#[command(about = "Resolve Docker image tags to their manifest digests")]
#[command(version, author)]
pub struct Args {
    /// Image references such as `alpine:latest` or `ghcr.io/org/app:v1`
    #[arg(required = true, help = "Image references to resolve ([registry/]repository[:tag])")]
    pub images: Vec<String>,

    /// Pre-set authorization value
    #[arg(
        long = "auth",
        help = "Authorization value: base64 user:password, or a full 'Basic ...'/'Bearer ...' header"
    )]
    pub auth: Option<String>,

    /// Registry username
    #[arg(
        long = "username",
        short = 'u',
        help = "Username for registry authentication"
    )]
    pub username: Option<String>,

    /// Registry password
    #[arg(
        long = "password",
        short = 'p',
        help = "Password for registry authentication"
    )]
    pub password: Option<String>,

    /// Use plain http
    #[arg(long = "insecure", help = "Talk to the registry over plain http")]
    pub insecure: bool,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Timeout in seconds for network operations
    #[arg(
        long = "timeout",
        short = 't',
        help = "Timeout for each HTTP request in seconds [default: 30]"
    )]
    pub timeout: Option<u64>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print results and errors"
    )]
    pub quiet: bool,

    /// Output format for results
    #[arg(
        long = "output",
        short = 'o',
        default_value = "text",
        help = "Output format: text, json"
    )]
    pub output: String,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Timeout from the flag, then `REGISTRY_TIMEOUT`, then the default
    pub fn timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout() == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        match self.output.as_str() {
            "text" | "json" => {}
            _ => return Err("Output format must be one of: text, json".to_string()),
        }

        if self.auth.is_some() && self.username.is_some() {
            return Err("Use either --auth or --username/--password, not both".to_string());
        }

        if self.password.is_some() && self.username.is_none() {
            return Err("--password requires --username".to_string());
        }

        Ok(())
    }

    /// Fill unset options from environment variables
    pub fn from_env(mut self) -> Self {
        if self.auth.is_none() && self.username.is_none() {
            self.auth = std::env::var("REGISTRY_AUTH").ok().filter(|v| !v.is_empty());
        }

        if self.auth.is_none() && self.username.is_none() {
            self.username = std::env::var("REGISTRY_USERNAME").ok();
        }

        if self.username.is_some() && self.password.is_none() {
            self.password = std::env::var("REGISTRY_PASSWORD").ok();
        }

        if self.timeout.is_none() {
            self.timeout = std::env::var("REGISTRY_TIMEOUT")
                .ok()
                .and_then(|t| t.trim().parse().ok());
        }

        if std::env::var("REGISTRY_VERBOSE").is_ok() && !self.quiet {
            self.verbose = true;
        }

        self
    }
}
