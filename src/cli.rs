//! Command line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::registry::{RegistryConfig, RepublishPolicy, DEFAULT_QUEUE_CAPACITY};
use crate::server::ServerConfig;

/// Live FLV stream hub with archival to object storage
#[derive(Debug, Clone, Parser)]
#[command(name = "livehub", version)]
pub struct Cli {
    /// Address for publisher and viewer connections
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:1935")]
    pub listen_addr: SocketAddr,

    /// Address for the query API
    #[arg(long, env = "HTTP_LISTEN_ADDR", default_value = "0.0.0.0:8083")]
    pub http_listen_addr: SocketAddr,

    /// Root directory of the object store
    #[arg(long, env = "STORAGE_ROOT", default_value = "./data")]
    pub storage_root: PathBuf,

    /// Bucket archived recordings are uploaded to
    #[arg(long, env = "STORAGE_BUCKET", default_value = "videos")]
    pub storage_bucket: String,

    /// Base URL presigned links point at
    #[arg(long, env = "STORAGE_PUBLIC_URL", default_value = "http://localhost:8083")]
    pub storage_public_url: String,

    /// Secret used to sign object URLs
    #[arg(long, env = "STORAGE_PRESIGN_SECRET", hide_env_values = true)]
    pub storage_presign_secret: String,

    /// Directory for scratch recordings (defaults to the OS temp dir)
    #[arg(long, env = "SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Packets buffered per viewer before dropping
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// What happens when a second publisher claims a live stream key
    #[arg(long, env = "REPUBLISH_POLICY", value_enum, default_value_t = Republish::Evict)]
    pub republish_policy: Republish,

    /// Maximum concurrent stream connections (0 = unlimited)
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 0)]
    pub max_connections: usize,

    /// Lifetime of presigned URLs in seconds
    #[arg(long, env = "PRESIGN_TTL_SECS", default_value_t = 3600)]
    pub presign_ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Republish {
    /// Close the live stream and take over its key
    Evict,
    /// Refuse the new publisher
    Reject,
}

impl From<Republish> for RepublishPolicy {
    fn from(value: Republish) -> Self {
        match value {
            Republish::Evict => RepublishPolicy::Evict,
            Republish::Reject => RepublishPolicy::Reject,
        }
    }
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::with_addr(self.listen_addr)
            .http_bind(self.http_listen_addr)
            .max_connections(self.max_connections)
            .presign_ttl(Duration::from_secs(self.presign_ttl_secs));
        if let Some(dir) = &self.scratch_dir {
            config = config.scratch_dir(dir);
        }
        config
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default()
            .queue_capacity(self.queue_capacity)
            .republish(self.republish_policy.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["livehub", "--storage-presign-secret", "s3cret"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]);

        assert_eq!(cli.storage_bucket, "videos");

        let server = cli.server_config();
        assert_eq!(server.bind_addr.port(), 1935);
        assert_eq!(server.http_addr.port(), 8083);
        assert_eq!(server.presign_ttl, Duration::from_secs(3600));

        let registry = cli.registry_config();
        assert_eq!(registry.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(registry.republish, RepublishPolicy::Evict);
    }

    #[test]
    fn test_overrides() {
        let cli = parse(&[
            "--listen-addr",
            "127.0.0.1:2935",
            "--queue-capacity",
            "8",
            "--republish-policy",
            "reject",
            "--scratch-dir",
            "/tmp/scratch",
            "--max-connections",
            "10",
        ]);

        let server = cli.server_config();
        assert_eq!(server.bind_addr, "127.0.0.1:2935".parse().unwrap());
        assert_eq!(server.max_connections, 10);
        assert_eq!(server.scratch_dir, Some(PathBuf::from("/tmp/scratch")));

        let registry = cli.registry_config();
        assert_eq!(registry.queue_capacity, 8);
        assert_eq!(registry.republish, RepublishPolicy::Reject);
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let result = Cli::try_parse_from([
            "livehub",
            "--storage-presign-secret",
            "x",
            "--republish-policy",
            "merge",
        ]);
        assert!(result.is_err());
    }
}
