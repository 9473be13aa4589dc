// src/rpc/mod.rs

//! Metadata client for the AUR RPC interface
//!
//! Provides search, info, provides-search and batched info lookups over
//! the persistent [`Transport`]. The [`MetadataSource`] trait is the seam
//! the resolver, orchestrator and search controller depend on.

mod decode;

pub use decode::{parse_results, record_from_value};

use crate::error::Result;
use crate::package::PackageRecord;
use crate::transport::{percent_encode, Transport};
use tracing::{debug, warn};

/// Default RPC endpoint path
pub const DEFAULT_ENDPOINT: &str = "/rpc/v5";

/// Longest request path sent in one batch lookup
pub const MAX_URL_LEN: usize = 4000;

/// Read access to source-package metadata
pub trait MetadataSource: Send + Sync {
    /// Search packages by name and description
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>>;

    /// Look up one package by exact name
    fn info(&self, name: &str) -> Result<Option<PackageRecord>>;

    /// Find packages whose `provides` mention `name`
    fn search_by_provides(&self, name: &str) -> Result<Vec<PackageRecord>>;

    /// Look up many packages at once
    ///
    /// Best effort: sub-requests that fail are skipped rather than failing
    /// the whole batch.
    fn info_batch(&self, names: &[String]) -> Vec<PackageRecord>;
}

/// AUR RPC client
pub struct RpcClient {
    transport: Transport,
    endpoint: String,
    max_url_len: usize,
}

impl RpcClient {
    /// Create a client using the default endpoint and URL limit
    pub fn new(transport: Transport) -> Self {
        Self::with_endpoint(transport, DEFAULT_ENDPOINT, MAX_URL_LEN)
    }

    /// Create a client with an explicit endpoint path and URL limit
    pub fn with_endpoint(transport: Transport, endpoint: &str, max_url_len: usize) -> Self {
        Self {
            transport,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            max_url_len,
        }
    }

    /// Open the connection ahead of the first request
    pub fn preconnect(&self) -> Result<()> {
        self.transport.connect()
    }

    fn fetch(&self, path: &str) -> Result<Vec<PackageRecord>> {
        debug!("RPC request: {}", path);
        let body = self.transport.request(path)?;
        Ok(parse_results(&body))
    }
}

impl MetadataSource for RpcClient {
    fn search(&self, query: &str) -> Result<Vec<PackageRecord>> {
        self.fetch(&search_path(&self.endpoint, query))
    }

    fn info(&self, name: &str) -> Result<Option<PackageRecord>> {
        let results = self.fetch(&info_path(&self.endpoint, name))?;
        Ok(results.into_iter().next())
    }

    fn search_by_provides(&self, name: &str) -> Result<Vec<PackageRecord>> {
        self.fetch(&provides_path(&self.endpoint, name))
    }

    fn info_batch(&self, names: &[String]) -> Vec<PackageRecord> {
        let mut all = Vec::new();
        for path in batch_paths(&self.endpoint, names, self.max_url_len) {
            match self.fetch(&path) {
                Ok(records) => all.extend(records),
                Err(e) => warn!("Batch info request failed, skipping: {}", e),
            }
        }
        all
    }
}

pub fn search_path(endpoint: &str, query: &str) -> String {
    format!("{}/search/{}", endpoint, percent_encode(query))
}

pub fn info_path(endpoint: &str, name: &str) -> String {
    format!("{}/info?arg[]={}", endpoint, percent_encode(name))
}

pub fn provides_path(endpoint: &str, name: &str) -> String {
    format!("{}/search/{}?by=provides", endpoint, percent_encode(name))
}

/// Split a batch info lookup into request paths no longer than `max_len`
///
/// A single name that alone exceeds the limit still gets its own request.
pub fn batch_paths(endpoint: &str, names: &[String], max_len: usize) -> Vec<String> {
    let base = format!("{endpoint}/info?");
    let mut paths = Vec::new();
    let mut current = base.clone();
    let mut count = 0usize;

    for name in names {
        let param = format!("arg[]={}", percent_encode(name));
        let extra = if count == 0 { param.len() } else { param.len() + 1 };

        if count > 0 && current.len() + extra > max_len {
            paths.push(std::mem::replace(&mut current, base.clone()));
            count = 0;
        }

        if count > 0 {
            current.push('&');
        }
        current.push_str(&param);
        count += 1;
    }

    if count > 0 {
        paths.push(current);
    }
    paths
}
