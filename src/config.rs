//! Startup configuration: worker count, HTTP bind address, log filter. Loaded once from a YAML
//! profile with an environment-variable override for the bind address and safe defaults when
//! the file is missing, so the binary runs out of the box.

use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::Deserialize;

use crate::error::PipelineError;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_LOG_FILTER: &str = "info";
const BIND_ADDRESS_ENV_VAR: &str = "CONDUIT_BIND_ADDRESS";

/// The profile as it appears on disk; every field is optional so a partial file still loads.
#[derive(Debug, Default, Deserialize)]
struct ProfileFile {
    workers: Option<usize>,
    bind_address: Option<String>,
    log_filter: Option<String>,
}

/// Resolved startup settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Default `max_p` fed to the demo pipeline's `Iterator`.
    pub workers: usize,
    /// Address the HTTP adapter binds to.
    pub bind_address: String,
    /// `tracing_subscriber::EnvFilter` directive installed at startup.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workers: DEFAULT_WORKERS,
            bind_address: DEFAULT_BIND_ADDRESS.to_owned(),
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl Config {
    /// Loads the profile at `path`, falling back to defaults field-by-field if the file is
    /// absent; a present-but-invalid file is an error. The environment variable
    /// `CONDUIT_BIND_ADDRESS`, if set, always wins over both the file and the default.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let file = match std::fs::read_to_string(path) {
            Ok(contents) => serde_yaml::from_str::<ProfileFile>(&contents)
                .map_err(|err| PipelineError::Config(format!("{}: {err}", path.display())))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => ProfileFile::default(),
            Err(err) => return Err(PipelineError::Config(format!("{}: {err}", path.display()))),
        };

        let mut config = Config {
            workers: file.workers.unwrap_or(DEFAULT_WORKERS),
            bind_address: file.bind_address.unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned()),
            log_filter: file.log_filter.unwrap_or_else(|| DEFAULT_LOG_FILTER.to_owned()),
        };

        if let Ok(from_env) = std::env::var(BIND_ADDRESS_ENV_VAR) {
            config.bind_address = from_env;
        }

        Ok(config)
    }
}

/// Shared handle to the process's configuration. Every read-only access path takes a shared
/// (`read`) lock; only [`SharedConfig::reload`] takes the exclusive lock.
#[derive(Clone)]
pub struct SharedConfig(Arc<RwLock<Config>>);

impl SharedConfig {
    /// Wraps `config` for shared, lock-guarded access.
    pub fn new(config: Config) -> Self {
        SharedConfig(Arc::new(RwLock::new(config)))
    }

    /// Reads the current worker count.
    pub fn workers(&self) -> usize {
        self.0.read().unwrap().workers
    }

    /// Reads the current bind address.
    pub fn bind_address(&self) -> String {
        self.0.read().unwrap().bind_address.clone()
    }

    /// Reads the current log filter directive.
    pub fn log_filter(&self) -> String {
        self.0.read().unwrap().log_filter.clone()
    }

    /// Replaces the configuration wholesale, under an exclusive lock.
    pub fn reload(&self, config: Config) {
        *self.0.write().unwrap() = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load("/nonexistent/conduit.yaml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn shared_config_reads_never_block_each_other() {
        let shared = SharedConfig::new(Config::default());
        let _first = shared.0.read().unwrap();
        assert_eq!(shared.0.try_read().unwrap().workers, DEFAULT_WORKERS);
    }
}
