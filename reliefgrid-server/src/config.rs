// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Server configuration
//!
//! Loaded from defaults, then an optional TOML file, then any `RELIEFGRID_*`
//! variables that are set in the environment.

use anyhow::Result;
use reliefgrid_core::geohash;
use reliefgrid_ingest::PipelineConfig;
use reliefgrid_storage::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_addr")]
    pub listen_addr: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory name of the point table inside `data_dir`
    #[serde(default = "default_table_name")]
    pub table_name: String,

    #[serde(default = "default_partition_key")]
    pub partition_key: String,

    /// Geohash length of stored sort keys
    #[serde(default = "default_precision")]
    pub precision: usize,

    /// Listing page size when the client sends no limit
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_http_addr() -> String {
    "127.0.0.1:47200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_enable_cors() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./reliefgrid-data")
}

fn default_table_name() -> String {
    "deprem".to_string()
}

fn default_partition_key() -> String {
    reliefgrid_core::POINT_PARTITION.to_string()
}

fn default_precision() -> usize {
    reliefgrid_core::POINT_PRECISION
}

fn default_page_size() -> usize {
    reliefgrid_storage::DEFAULT_PAGE_SIZE
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_http_addr(),
            request_timeout_secs: default_request_timeout(),
            enable_cors: default_enable_cors(),
            cors_origins: vec![],
            json_logs: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            table_name: default_table_name(),
            partition_key: default_partition_key(),
            precision: default_precision(),
            page_size: default_page_size(),
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        Self::merge_with_env(Self::default())
    }

    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = if let Some(path) = config_file {
            if path.exists() {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            } else {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
        } else {
            Self::default()
        };

        Ok(Self::merge_with_env(config))
    }

    fn merge_with_env(mut config: Self) -> Self {
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Overlay every variable `lookup` knows about. Values that fail to
    /// parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(name: &str, value: String) -> Option<T> {
            match value.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(variable = name, value = %value, "ignoring unparsable value");
                    None
                }
            }
        }
        let get = |name: &str| lookup(name).map(|v| (name.to_string(), v));

        if let Some((_, v)) = get("RELIEFGRID_HTTP_ADDR") {
            self.server.listen_addr = v;
        }
        if let Some((n, v)) = get("RELIEFGRID_REQUEST_TIMEOUT") {
            if let Some(val) = parsed(&n, v) {
                self.server.request_timeout_secs = val;
            }
        }
        if let Some((n, v)) = get("RELIEFGRID_ENABLE_CORS") {
            if let Some(val) = parsed(&n, v) {
                self.server.enable_cors = val;
            }
        }
        if let Some((_, v)) = get("RELIEFGRID_CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some((n, v)) = get("RELIEFGRID_JSON_LOGS") {
            if let Some(val) = parsed(&n, v) {
                self.server.json_logs = val;
            }
        }

        if let Some((_, v)) = get("RELIEFGRID_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Some((_, v)) = get("RELIEFGRID_TABLE_NAME") {
            self.storage.table_name = v;
        }
        if let Some((_, v)) = get("RELIEFGRID_PARTITION_KEY") {
            self.storage.partition_key = v;
        }
        if let Some((n, v)) = get("RELIEFGRID_PAGE_SIZE") {
            if let Some(val) = parsed(&n, v) {
                self.storage.page_size = val;
            }
        }

        if let Some((_, v)) = get("RELIEFGRID_OBJECT_DIR") {
            self.pipeline.object_dir = Some(PathBuf::from(v));
        }
        if let Some((n, v)) = get("RELIEFGRID_PIPELINE_TIMEOUT") {
            if let Some(val) = parsed(&n, v) {
                self.pipeline.timeout_secs = val;
            }
        }
        if let Some((n, v)) = get("RELIEFGRID_MAX_DELIVERIES") {
            if let Some(val) = parsed(&n, v) {
                self.pipeline.max_deliveries = val;
            }
        }
        if let Some((n, v)) = get("RELIEFGRID_REDELIVERY_BACKOFF_MS") {
            if let Some(val) = parsed(&n, v) {
                self.pipeline.redelivery_backoff_ms = val;
            }
        }
        if let Some((_, v)) = get("RELIEFGRID_TRANSCRIPTION_ENDPOINT") {
            self.pipeline.transcription.endpoint = v;
        }
        if let Some((_, v)) = get("RELIEFGRID_TRANSCRIPTION_MODEL") {
            self.pipeline.transcription.model = v;
        }
        if let Some((_, v)) = get("RELIEFGRID_TRANSCRIPTION_LANGUAGE") {
            self.pipeline.transcription.language = v;
        }
        if let Some((_, v)) = get("OPENAI_API_KEY") {
            self.pipeline.transcription.api_key = Some(v);
        }
        if let Some((_, v)) = get("RELIEFGRID_EXTRACTION_MODEL") {
            self.pipeline.extraction.model = v;
        }
        if let Some((_, v)) = get("ANTHROPIC_API_KEY") {
            self.pipeline.extraction.api_key = Some(v);
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(self.server.listen_addr.parse()?)
    }

    /// Directory holding the point table
    pub fn table_dir(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.table_name)
    }

    /// Root of the object store
    pub fn object_dir(&self) -> PathBuf {
        self.pipeline
            .object_dir
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("objects"))
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        geohash::validate_precision(self.storage.precision)?;

        if self.storage.partition_key.trim().is_empty() {
            anyhow::bail!("storage.partition_key must not be empty");
        }

        let table = &self.storage.table_name;
        if table.is_empty()
            || !table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!(
                "storage.table_name '{}' must be a non-empty directory name of [A-Za-z0-9_-]",
                table
            );
        }

        if self.storage.page_size == 0 || self.storage.page_size > MAX_PAGE_SIZE {
            anyhow::bail!(
                "storage.page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE,
                self.storage.page_size
            );
        }

        if self.pipeline.max_deliveries == 0 {
            anyhow::bail!("pipeline.max_deliveries must be at least 1");
        }
        if self.pipeline.timeout_secs == 0 || self.pipeline.delivery_timeout_secs == 0 {
            anyhow::bail!("pipeline timeouts must be greater than zero");
        }

        if !self.storage.data_dir.exists() {
            std::fs::create_dir_all(&self.storage.data_dir)?;
        }

        Ok(())
    }
}
