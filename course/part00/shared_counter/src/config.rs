use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_WORKERS: usize = 5;
pub const DEFAULT_INCREMENTS: usize = 10_000;

const CONFIG_NAME: &str = "shared_counter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DriverConfig {
    pub workers: usize,
    pub increments: usize,
    #[serde(default)]
    pub join_timeout_ms: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_INCREMENTS)
    }
}

impl DriverConfig {
    pub fn new(workers: usize, increments: usize) -> Self {
        Self {
            workers,
            increments,
            join_timeout_ms: None,
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_ms.map(Duration::from_millis)
    }

    pub fn expected_total(&self) -> u64 {
        (self.workers as u64) * (self.increments as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.increments == 0 {
            return Err(ConfigError::ZeroIncrements);
        }
        Ok(())
    }

    /// Reads `shared_counter.{toml,json,...}` from the working directory if
    /// there is one, falling back to the defaults for anything it leaves out.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_NAME)
    }

    pub fn load_from(name: &str) -> Result<Self, ConfigError> {
        Self::from_source(config::File::with_name(name).required(false))
    }

    fn from_source<S>(source: S) -> Result<Self, ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let config = config::Config::builder()
            .set_default("workers", DEFAULT_WORKERS as i64)?
            .set_default("increments", DEFAULT_INCREMENTS as i64)?
            .add_source(source)
            .build()?;

        let config: DriverConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(#[from] config::ConfigError),
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("increments per worker must be at least 1")]
    ZeroIncrements,
}
