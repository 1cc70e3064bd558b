use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::codec::{CodecError, DocIdCodec};

/// Environment variable prefix, e.g. `ADAPTOR__FEED__NAME`
pub const ENV_PREFIX: &str = "ADAPTOR";

/// Main adaptor configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdaptorConfig {
    #[serde(default)]
    pub gsa: GsaConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl AdaptorConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_env(ENV_PREFIX)
    }

    /// Load configuration from environment with custom prefix
    pub fn load_from_env(prefix: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(
            Environment::with_prefix(prefix)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load configuration from file with environment overrides
    pub fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Codec for the URLs the appliance will fetch documents from
    pub fn doc_id_codec(&self) -> Result<DocIdCodec, CodecError> {
        DocIdCodec::new(&self.server.base_url(), self.server.doc_id_is_url)
    }
}

/// Search appliance connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GsaConfig {
    #[serde(default = "default_gsa_hostname")]
    pub hostname: String,
    /// Feed port; defaults to 19900, or 19902 when `secure`
    #[serde(default)]
    pub feed_port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

impl GsaConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Default::default()
        }
    }

    pub fn with_feed_port(mut self, port: u16) -> Self {
        self.feed_port = Some(port);
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn effective_feed_port(&self) -> u16 {
        self.feed_port
            .unwrap_or(if self.secure { 19902 } else { 19900 })
    }

    /// `http(s)://host:port/xmlfeed`
    pub fn feed_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{}://{}:{}/xmlfeed",
            scheme,
            self.hostname,
            self.effective_feed_port()
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for GsaConfig {
    fn default() -> Self {
        Self {
            hostname: default_gsa_hostname(),
            feed_port: None,
            secure: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

fn default_gsa_hostname() -> String {
    "localhost".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    180
}

/// Where the adaptor serves document content from
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_hostname")]
    pub hostname: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default)]
    pub secure: bool,
    #[serde(default = "default_doc_id_path")]
    pub doc_id_path: String,
    /// DocIds are already URLs and are sent unmodified
    #[serde(default)]
    pub doc_id_is_url: bool,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        let path = if self.doc_id_path.starts_with('/') {
            self.doc_id_path.clone()
        } else {
            format!("/{}", self.doc_id_path)
        };
        format!("{}://{}:{}{}", scheme, self.hostname, self.port, path)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_server_hostname(),
            port: default_server_port(),
            secure: false,
            doc_id_path: default_doc_id_path(),
            doc_id_is_url: false,
        }
    }
}

fn default_server_hostname() -> String {
    "localhost".to_string()
}

fn default_server_port() -> u16 {
    5678
}

fn default_doc_id_path() -> String {
    "/doc/".to_string()
}

/// Feed content and transmission settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Datasource name, `[a-zA-Z_][a-zA-Z0-9_-]*`
    #[serde(default = "default_feed_name")]
    pub name: String,
    /// Maximum items per feed file
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    /// `metadata-and-url` or `incremental`
    #[serde(default = "default_feed_type")]
    pub feed_type: String,
    #[serde(default)]
    pub use_compression: bool,
    #[serde(default)]
    pub compression_min_bytes: usize,
    #[serde(default = "default_compression_max_bytes")]
    pub compression_max_bytes: usize,
    #[serde(default = "default_true")]
    pub crawl_immediately_enabled: bool,
    #[serde(default = "default_true")]
    pub no_recrawl_enabled: bool,
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            name: default_feed_name(),
            max_urls: default_max_urls(),
            feed_type: default_feed_type(),
            use_compression: false,
            compression_min_bytes: 0,
            compression_max_bytes: default_compression_max_bytes(),
            crawl_immediately_enabled: true,
            no_recrawl_enabled: true,
            archive_dir: None,
        }
    }
}

fn default_feed_name() -> String {
    "adaptor".to_string()
}

fn default_max_urls() -> usize {
    5000
}

fn default_feed_type() -> String {
    "metadata-and-url".to_string()
}

fn default_compression_max_bytes() -> usize {
    1024 * 1024
}

fn default_true() -> bool {
    true
}

/// Recurring push schedule
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_full_push_interval_secs")]
    pub full_push_interval_secs: u64,
    /// Zero disables incremental pushes
    #[serde(default = "default_incremental_poll_period_secs")]
    pub incremental_poll_period_secs: u64,
    #[serde(default = "default_true")]
    pub push_doc_ids_on_startup: bool,
}

impl ScheduleConfig {
    pub fn full_push_interval(&self) -> Duration {
        Duration::from_secs(self.full_push_interval_secs)
    }

    pub fn incremental_poll_period(&self) -> Option<Duration> {
        (self.incremental_poll_period_secs > 0)
            .then(|| Duration::from_secs(self.incremental_poll_period_secs))
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            full_push_interval_secs: default_full_push_interval_secs(),
            incremental_poll_period_secs: default_incremental_poll_period_secs(),
            push_doc_ids_on_startup: true,
        }
    }
}

fn default_full_push_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_incremental_poll_period_secs() -> u64 {
    900
}

/// Backoff settings for feed and listing retries
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub feed_max_attempts: u32,
    #[serde(default = "default_max_attempts")]
    pub listing_max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub retry_rejections: bool,
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            feed_max_attempts: default_max_attempts(),
            listing_max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_rejections: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    12
}

fn default_initial_delay_ms() -> u64 {
    5_000
}

fn default_max_delay_ms() -> u64 {
    5 * 60 * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gsa_feed_url() {
        let gsa = GsaConfig::new("gsa.example.com");
        assert_eq!(gsa.feed_url(), "http://gsa.example.com:19900/xmlfeed");

        let secure = GsaConfig::new("gsa").with_secure(true);
        assert_eq!(secure.feed_url(), "https://gsa:19902/xmlfeed");

        let custom = GsaConfig::new("gsa").with_feed_port(8080);
        assert_eq!(custom.feed_url(), "http://gsa:8080/xmlfeed");
    }

    #[test]
    fn test_server_base_url() {
        let server = ServerConfig::default();
        assert_eq!(server.base_url(), "http://localhost:5678/doc/");

        let server = ServerConfig {
            doc_id_path: "content".to_string(),
            ..Default::default()
        };
        assert_eq!(server.base_url(), "http://localhost:5678/content");
    }

    #[test]
    fn test_defaults() {
        let config = AdaptorConfig::default();
        assert_eq!(config.feed.name, "adaptor");
        assert_eq!(config.feed.max_urls, 5000);
        assert_eq!(config.feed.compression_max_bytes, 1024 * 1024);
        assert_eq!(config.retry.feed_max_attempts, 12);
        assert_eq!(config.schedule.incremental_poll_period(), Some(Duration::from_secs(900)));
        assert!(config.doc_id_codec().is_ok());
    }

    #[test]
    fn test_zero_poll_period_disables_incremental() {
        let schedule = ScheduleConfig {
            incremental_poll_period_secs: 0,
            ..Default::default()
        };
        assert!(schedule.incremental_poll_period().is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("adaptor.toml");
        std::fs::write(
            &path,
            r#"
[gsa]
hostname = "gsa.internal"
feed_port = 9000

[feed]
name = "docs"
max_urls = 10
use_compression = true
"#,
        )
        .unwrap();

        let config = AdaptorConfig::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.gsa.hostname, "gsa.internal");
        assert_eq!(config.gsa.effective_feed_port(), 9000);
        assert_eq!(config.feed.name, "docs");
        assert_eq!(config.feed.max_urls, 10);
        assert!(config.feed.use_compression);
        assert_eq!(config.server.port, 5678);
    }
}
