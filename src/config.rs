use crate::backpressure::DEFAULT_WINDOW_CAPACITY;
use crate::command::generator::{
    DEFAULT_CENSUS_RADIUS, DEFAULT_PYRAMID_BLOCK, MAX_CENSUS_DEPTH, MAX_CENSUS_RADIUS,
    MAX_PYRAMID_SIZE,
};
use crate::error::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "config/local";
const ENV_PREFIX: &str = "MINEPROXY";

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub pyramid: PyramidConfig,
    #[serde(default)]
    pub census: CensusConfig,
    /// Chat senders allowed to fire triggers. Empty means everyone.
    #[serde(default)]
    pub allowed_senders: Vec<String>,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            flow: FlowConfig::default(),
            pyramid: PyramidConfig::default(),
            census: CensusConfig::default(),
            allowed_senders: Vec::new(),
            drain_timeout: default_drain_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ListenConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Backlog lengths that are a multiple of this value produce a progress line.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_capacity: default_window_capacity(),
            progress_interval: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PyramidConfig {
    #[serde(default = "default_block")]
    pub block: String,
    #[serde(default = "default_max_size")]
    pub max_size: u32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            block: default_block(),
            max_size: default_max_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CensusConfig {
    #[serde(default = "default_radius")]
    pub radius: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

impl Default for CensusConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            max_depth: default_max_depth(),
            output_path: default_output_path(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_window_capacity() -> usize {
    DEFAULT_WINDOW_CAPACITY
}

const fn default_progress_interval() -> usize {
    1000
}

fn default_block() -> String {
    DEFAULT_PYRAMID_BLOCK.to_string()
}

const fn default_max_size() -> u32 {
    256
}

const fn default_radius() -> u32 {
    DEFAULT_CENSUS_RADIUS
}

const fn default_max_depth() -> u32 {
    64
}

fn default_output_path() -> PathBuf {
    PathBuf::from("blockcount.json")
}

fn default_drain_timeout() -> String {
    "5s".to_string()
}

impl BridgeConfig {
    /// Layers `path` (or the optional `config/local`) under `MINEPROXY__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("allowed_senders")
            .try_parsing(true)
    }

    fn load_from(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let config: BridgeConfig = Config::builder()
            .add_source(file)
            .add_source(environment)
            .build()
            .context("failed to read configuration sources")?
            .try_deserialize()
            .context("failed to deserialise configuration")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        crate::ensure_err!(
            self.flow.window_capacity > 0,
            "flow.window_capacity must be greater than zero"
        );
        crate::ensure_err!(
            self.flow.progress_interval > 0,
            "flow.progress_interval must be greater than zero"
        );
        crate::ensure_err!(
            !self.pyramid.block.trim().is_empty(),
            "pyramid.block must not be empty"
        );
        crate::ensure_err!(
            self.pyramid.max_size <= MAX_PYRAMID_SIZE,
            "pyramid.max_size must be at most {}",
            MAX_PYRAMID_SIZE
        );
        crate::ensure_err!(
            self.census.radius <= MAX_CENSUS_RADIUS,
            "census.radius must be at most {}",
            MAX_CENSUS_RADIUS
        );
        crate::ensure_err!(
            self.census.max_depth <= MAX_CENSUS_DEPTH,
            "census.max_depth must be at most {}",
            MAX_CENSUS_DEPTH
        );
        crate::ensure_err!(
            !self.listen.host.trim().is_empty(),
            "listen.host must not be empty"
        );
        self.drain_timeout()?;
        Ok(())
    }

    pub fn drain_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.drain_timeout)
            .with_context(|| format!("invalid drain_timeout `{}`", self.drain_timeout))
    }
}
