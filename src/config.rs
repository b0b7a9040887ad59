//! Service configuration.
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file, the
//! `PORT` environment variable, then whatever the binary applies from its
//! command line.
//!
//! ```toml
//! listen = "0.0.0.0:3000"
//! max_upload_bytes = 10485760
//! temp_dir = "/var/tmp/avif2webp"
//! expose_diagnostics = false
//! cors = true
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the standalone server binds to.
    pub listen: SocketAddr,
    /// Largest accepted upload, in bytes. Exactly this many is still accepted.
    pub max_upload_bytes: u64,
    /// Directory that holds per-request temporary files. Created at startup.
    pub temp_dir: PathBuf,
    /// Echo codec and parser diagnostics to clients in a `details` field.
    pub expose_diagnostics: bool,
    /// Send `Access-Control-Allow-Origin: *` and answer preflight requests.
    pub cors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            temp_dir: std::env::temp_dir().join("avif2webp"),
            expose_diagnostics: false,
            cors: true,
        }
    }
}

impl Config {
    /// Loads the file at `path` if given, otherwise starts from defaults,
    /// then applies the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// `PORT` replaces the port of `listen` and keeps its host.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), Error> {
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|e| Error::config(format!("invalid PORT `{port}`: {e}")))?;
            self.listen.set_port(port);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_upload_bytes == 0 {
            return Err(Error::config("max_upload_bytes must be greater than zero"));
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(Error::config("temp_dir must not be empty"));
        }
        Ok(())
    }
}
