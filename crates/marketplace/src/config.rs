//! Client configuration.

use std::path::PathBuf;

use marketplace_core::StorageConfig;

/// Default data directory.
pub const DEFAULT_DATA_PATH: &str = "./marketplace_data";

/// Default page cache size (256 MB).
pub const DEFAULT_CACHE_CAPACITY: u64 = 256 * 1024 * 1024;

/// Default background flush interval in milliseconds.
pub const DEFAULT_FLUSH_EVERY_MS: u64 = 1000;

/// Configuration for [`MarketplaceClient`](crate::MarketplaceClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the database directory.
    pub data_path: PathBuf,

    /// Keep everything in memory and discard it on drop.
    pub temporary: bool,

    /// Page cache size in bytes.
    pub cache_capacity: u64,

    /// Background flush interval. None flushes only on demand.
    pub flush_every_ms: Option<u64>,

    /// Compress stored pages.
    pub compression: bool,
}

impl ClientConfig {
    /// Create a configuration for the database at `data_path`.
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            temporary: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            flush_every_ms: Some(DEFAULT_FLUSH_EVERY_MS),
            compression: false,
        }
    }

    /// Create an in-memory configuration.
    pub fn temporary() -> Self {
        Self::new(DEFAULT_DATA_PATH).with_temporary(true)
    }

    /// Set whether the database is temporary.
    pub fn with_temporary(mut self, temporary: bool) -> Self {
        self.temporary = temporary;
        self
    }

    /// Set the page cache size.
    pub fn with_cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Set the background flush interval.
    pub fn with_flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }

    /// Enable or disable compression.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Storage configuration for the engine.
    pub fn storage_config(&self) -> StorageConfig {
        let config = if self.temporary {
            StorageConfig::temporary()
        } else {
            StorageConfig::new(&self.data_path)
        };
        config
            .with_cache_capacity(self.cache_capacity)
            .with_flush_every_ms(self.flush_every_ms)
            .with_compression(self.compression)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_PATH)
    }
}

/// Storage options shared by the command-line tools.
#[derive(clap::Args, Debug, Clone)]
pub struct Args {
    /// Path to the database directory.
    #[arg(short, long, env = "MARKETPLACE_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    /// Use an in-memory database that is discarded on exit.
    #[arg(long)]
    pub temporary: bool,

    /// Page cache size in megabytes.
    #[arg(long, default_value_t = 256)]
    pub cache_mb: u64,

    /// Flush interval in milliseconds. Set to 0 to flush only on exit.
    #[arg(long, default_value_t = DEFAULT_FLUSH_EVERY_MS)]
    pub flush_ms: u64,

    /// Compress stored pages.
    #[arg(long)]
    pub compress: bool,
}

impl Args {
    /// Convert command-line arguments to client configuration.
    pub fn into_config(self) -> ClientConfig {
        let flush_every_ms = if self.flush_ms == 0 {
            None
        } else {
            Some(self.flush_ms)
        };

        ClientConfig::new(self.data_path)
            .with_temporary(self.temporary)
            .with_cache_capacity(self.cache_mb.saturating_mul(1024 * 1024))
            .with_flush_every_ms(flush_every_ms)
            .with_compression(self.compress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: Args,
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.data_path, PathBuf::from(DEFAULT_DATA_PATH));
        assert!(!config.temporary);

        let storage = ClientConfig::temporary().storage_config();
        assert!(storage.temporary);
    }

    #[test]
    fn test_args_into_config() {
        let cli = Cli::parse_from([
            "marketplace",
            "--data-path",
            "/tmp/shop",
            "--cache-mb",
            "16",
            "--flush-ms",
            "0",
        ]);
        let config = cli.args.into_config();

        assert_eq!(config.data_path, PathBuf::from("/tmp/shop"));
        assert_eq!(config.cache_capacity, 16 * 1024 * 1024);
        assert_eq!(config.flush_every_ms, None);
        assert!(!config.compression);
    }

    #[test]
    fn test_huge_cache_saturates() {
        let max = u64::MAX.to_string();
        let cli = Cli::parse_from(["marketplace", "--cache-mb", max.as_str()]);
        assert_eq!(cli.args.into_config().cache_capacity, u64::MAX);
    }
}
