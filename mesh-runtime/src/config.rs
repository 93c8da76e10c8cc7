//! §10.4 configuration surface. `MeshConfig` is plain and `serde`-derived so an external loader
//! can hand one in (this crate does not itself depend on a JSON library, in keeping with the
//! JSON configuration loader being an out-of-scope collaborator), carries the exchange strategy,
//! partitioner choice and transport settings a run needs, and can also be built directly with
//! [`MeshConfig::builder`] or loaded from a line-oriented host file, one `host:port` per rank.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use mesh_partition::PartitionerConfig;

use crate::error::RuntimeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeStrategy {
    TwoSided,
    OneSided,
}

impl Default for ExchangeStrategy {
    fn default() -> Self {
        ExchangeStrategy::TwoSided
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionerKind {
    Naive,
    Metis,
    Distributed,
}

impl Default for PartitionerKind {
    fn default() -> Self {
        PartitionerKind::Naive
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshConfig {
    pub exchange_strategy: ExchangeStrategy,
    pub partitioner_kind: PartitionerKind,
    pub partitioner_config: PartitionerConfig,
    /// Listen address table, ordered by rank.
    pub listen_addresses: Vec<SocketAddr>,
    pub connect_retries: u32,
    pub connect_backoff_ms: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            exchange_strategy: ExchangeStrategy::default(),
            partitioner_kind: PartitionerKind::default(),
            partitioner_config: PartitionerConfig::default(),
            listen_addresses: Vec::new(),
            connect_retries: 30,
            connect_backoff_ms: 200,
        }
    }
}

impl MeshConfig {
    pub fn builder() -> MeshConfigBuilder {
        MeshConfigBuilder::default()
    }

    /// One `host:port` per rank, in rank order, blank lines skipped.
    pub fn from_host_file(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let f = BufReader::new(File::open(path.as_ref())?);
        let mut listen_addresses = Vec::new();
        for line in f.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let addr: SocketAddr = trimmed
                .parse()
                .map_err(|_| RuntimeError::BadHostFile(trimmed.to_string()))?;
            listen_addresses.push(addr);
        }
        Ok(Self { listen_addresses, ..Self::default() })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshConfigBuilder {
    inner: MeshConfig,
}

impl MeshConfigBuilder {
    pub fn exchange_strategy(mut self, strategy: ExchangeStrategy) -> Self {
        self.inner.exchange_strategy = strategy;
        self
    }

    pub fn partitioner_kind(mut self, kind: PartitionerKind) -> Self {
        self.inner.partitioner_kind = kind;
        self
    }

    pub fn partitioner_config(mut self, config: PartitionerConfig) -> Self {
        self.inner.partitioner_config = config;
        self
    }

    pub fn listen_addresses(mut self, addresses: Vec<SocketAddr>) -> Self {
        self.inner.listen_addresses = addresses;
        self
    }

    pub fn connect_retries(mut self, retries: u32) -> Self {
        self.inner.connect_retries = retries;
        self
    }

    pub fn connect_backoff_ms(mut self, ms: u64) -> Self {
        self.inner.connect_backoff_ms = ms;
        self
    }

    pub fn build(self) -> MeshConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_uses_two_sided_and_naive() {
        let config = MeshConfig::default();
        assert_eq!(config.exchange_strategy, ExchangeStrategy::TwoSided);
        assert_eq!(config.partitioner_kind, PartitionerKind::Naive);
        assert_eq!(config.connect_retries, 30);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = MeshConfig::builder()
            .exchange_strategy(ExchangeStrategy::OneSided)
            .partitioner_kind(PartitionerKind::Distributed)
            .connect_retries(5)
            .build();
        assert_eq!(config.exchange_strategy, ExchangeStrategy::OneSided);
        assert_eq!(config.partitioner_kind, PartitionerKind::Distributed);
        assert_eq!(config.connect_retries, 5);
    }

    #[test]
    fn host_file_parses_one_address_per_line_skipping_blanks() {
        let path = scratch_path("two-addresses");
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "127.0.0.1:9000").unwrap();
            writeln!(file).unwrap();
            writeln!(file, "127.0.0.1:9001").unwrap();
        }

        let config = MeshConfig::from_host_file(&path).unwrap();
        assert_eq!(config.listen_addresses.len(), 2);
        assert_eq!(config.listen_addresses[0].port(), 9000);
        assert_eq!(config.listen_addresses[1].port(), 9001);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn host_file_rejects_unparseable_address() {
        let path = scratch_path("bad-address");
        {
            let mut file = File::create(&path).unwrap();
            writeln!(file, "not-an-address").unwrap();
        }

        let result = MeshConfig::from_host_file(&path);
        assert!(matches!(result, Err(RuntimeError::BadHostFile(_))));

        std::fs::remove_file(path).unwrap();
    }

    fn scratch_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("mesh-runtime-test-hostfile-{tag}-{:?}", std::thread::current().id()))
    }
}
