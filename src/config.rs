//! Command-line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::error::Error;
use crate::limiter::NamePattern;
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH};

/// How the webhook answers when the namespace population cannot be listed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FailurePolicy {
    /// Deny the request
    #[default]
    Fail,
    /// Allow the request and attach a warning
    Ignore,
}

/// Namespace limiter - caps the number of namespaces matching a regex
#[derive(Parser, Debug, Clone)]
#[command(name = "namespace-limiter", version, about, long_about = None)]
pub struct Config {
    /// The namespace name regex that matches namespaces that should be limited
    #[arg(long, env = "NAMESPACE_REGEX", default_value = "")]
    pub namespace_regex: String,

    /// The maximum number of namespaces matching the regex that should be allowed
    ///
    /// A value of 0 denies every namespace creation.
    #[arg(long, env = "NAMESPACE_MAX", default_value_t = 0)]
    pub namespace_max: usize,

    /// The address to serve the webhook on (":8080" binds all interfaces)
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080", value_parser = parse_listen_addr)]
    pub listen_addr: SocketAddr,

    /// The address to serve health probes and metrics on
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081", value_parser = parse_listen_addr)]
    pub health_addr: SocketAddr,

    /// TLS certificate file (PEM)
    #[arg(long, env = "TLS_CERT_FILE", default_value = WEBHOOK_CERT_PATH)]
    pub tls_cert_file: PathBuf,

    /// TLS private key file (PEM)
    #[arg(long, env = "TLS_KEY_FILE", default_value = WEBHOOK_KEY_PATH)]
    pub tls_key_file: PathBuf,

    /// Response when the namespace list fails
    #[arg(long, env = "FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Fail)]
    pub failure_policy: FailurePolicy,

    /// Timeout for listing namespaces, in seconds (0 disables the timeout)
    #[arg(long, env = "LIST_TIMEOUT_SECS", default_value_t = 10)]
    pub list_timeout_secs: u64,

    /// Namespaces requested per list page (0 disables paging)
    #[arg(long, env = "LIST_PAGE_SIZE", default_value_t = crate::store::DEFAULT_PAGE_SIZE)]
    pub list_page_size: u32,
}

impl Config {
    /// Check settings that cannot be expressed as per-flag parsers
    pub fn validate(&self) -> crate::Result<()> {
        if self.listen_addr == self.health_addr {
            return Err(Error::InvalidConfig(format!(
                "listen-addr and health-addr must differ (both {})",
                self.listen_addr
            )));
        }
        if self.tls_cert_file.as_os_str().is_empty() || self.tls_key_file.as_os_str().is_empty()
        {
            return Err(Error::InvalidConfig(
                "tls-cert-file and tls-key-file are required".to_string(),
            ));
        }
        Ok(())
    }

    /// Compile the configured namespace regex
    pub fn pattern(&self) -> crate::Result<NamePattern> {
        NamePattern::compile(&self.namespace_regex)
    }

    /// Namespace list timeout, if enabled
    pub fn list_timeout(&self) -> Option<Duration> {
        (self.list_timeout_secs > 0).then(|| Duration::from_secs(self.list_timeout_secs))
    }
}

/// Parse a listen address, accepting the host-less ":port" form
fn parse_listen_addr(value: &str) -> Result<SocketAddr, String> {
    let full = match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => value.to_string(),
    };
    full.parse()
        .map_err(|e| format!("invalid listen address {:?}: {}", value, e))
}
