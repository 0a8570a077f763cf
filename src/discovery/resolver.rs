//! Fallback chain resolving the log server address.

use std::io;

use log::{debug, info, warn};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use thiserror::Error;
use ureq::{Agent, AgentBuilder};

use super::{
    config::DiscoveryConfig,
    wire::{DirectoryReply, StatusReply},
};

/// Characters percent-encoded in the `service_id` query value.
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Source of the server address a session connects to.
pub trait AddressResolver: Send + Sync {
    /// Resolve the address for `service_id`. Must never return an empty
    /// string and must not fail.
    fn resolve(&self, service_id: &str) -> String;
}

#[derive(Debug, Error)]
enum DiscoveryError {
    #[error("request failed: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("failed to read body: {0}")]
    Body(#[from] io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("directory reported ok=false")]
    NotOk,
}

/// Append the percent-encoded `service_id` query parameter to `base`.
pub fn status_url(base: &str, service_id: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{separator}service_id={}",
        utf8_percent_encode(service_id, QUERY_VALUE)
    )
}

/// [`AddressResolver`] querying the cluster directory and collector status
/// endpoints.
pub struct DiscoveryResolver {
    agent: Agent,
    config: DiscoveryConfig,
}

impl DiscoveryResolver {
    pub fn new(config: DiscoveryConfig) -> Self {
        let agent = AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout(config.request_timeout)
            .build();
        Self { agent, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Status URLs to probe for `service_id`, in order.
    pub fn candidates(&self, service_id: &str) -> Vec<String> {
        let bases = match self.fetch_directory() {
            Ok(bases) if !bases.is_empty() => bases,
            Ok(_) => {
                warn!(
                    "zmqlog: directory {} listed no usable log instances",
                    self.config.directory_url
                );
                vec![self.config.default_status_url.clone()]
            }
            Err(err) => {
                warn!(
                    "zmqlog: failed to list log instances from {}: {err}",
                    self.config.directory_url
                );
                vec![self.config.default_status_url.clone()]
            }
        };
        bases
            .iter()
            .map(|base| status_url(base, service_id))
            .collect()
    }

    fn get_body(&self, url: &str) -> Result<String, DiscoveryError> {
        let response = self.agent.get(url).call().map_err(Box::new)?;
        Ok(response.into_string()?)
    }

    fn fetch_directory(&self) -> Result<Vec<String>, DiscoveryError> {
        let body = self.get_body(&self.config.directory_url)?;
        let reply: DirectoryReply = serde_json::from_str(&body)?;
        if reply.ok == Some(false) {
            return Err(DiscoveryError::NotOk);
        }
        Ok(reply
            .data
            .instance
            .iter()
            .filter_map(|instance| instance.status_base())
            .collect())
    }

    fn query_status(&self, url: &str) -> Result<Option<String>, DiscoveryError> {
        let body = self.get_body(url)?;
        let reply: StatusReply = serde_json::from_str(&body)?;
        if let Some(host) = reply.successful_host() {
            return Ok(Some(host.to_owned()));
        }
        debug!(
            "zmqlog: instance {url} reported status {:?}",
            reply.status().unwrap_or("<missing>")
        );
        Ok(None)
    }
}

impl AddressResolver for DiscoveryResolver {
    fn resolve(&self, service_id: &str) -> String {
        for url in self.candidates(service_id) {
            match self.query_status(&url) {
                Ok(Some(host)) => {
                    info!("zmqlog service {service_id}: resolved log server {host} via {url}");
                    return host;
                }
                Ok(None) => {}
                Err(err) => warn!("zmqlog: failed to query log instance {url}: {err}"),
            }
        }
        info!(
            "zmqlog service {service_id}: no log instance available; using {}",
            self.config.default_address
        );
        self.config.default_address.clone()
    }
}

impl std::fmt::Debug for DiscoveryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryResolver")
            .field("config", &self.config)
            .finish()
    }
}
