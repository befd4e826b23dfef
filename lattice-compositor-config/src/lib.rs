//! Configuration file definitions and loading for `lattice-compositor`.
//!
//! The transaction engine itself does not read this file: every timing and
//! policy constant it relies on is fixed (see `lattice_compositor::constants`).
//! What lives here is the surrounding, user-facing configuration that the
//! rest of the compositor (outside the scope of this crate) would consult:
//! logging verbosity and the handful of knobs that affect how outputs are
//! greeted when they first appear.

use std::path::PathBuf;
use std::{fs, io};

use serde::Deserialize;

#[macro_use]
extern crate tracing;

/// Top level compositor configuration, loaded from `$XDG_CONFIG_HOME/lattice-compositor/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// `tracing-subscriber` env-filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Newly plugged outputs are focused immediately, moving the pointer to
    /// their center.
    pub focus_new_outputs: bool,
    /// Output-specific overrides, keyed by connector name (eg. `"eDP-1"`).
    pub outputs: std::collections::HashMap<String, OutputConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "error,lattice_compositor=info".to_string(),
            focus_new_outputs: true,
            outputs: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    /// Tags to pre-select for this output the first time it is seen.
    pub tags: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read configuration file: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse configuration file:\n{0}")]
    Parse(#[from] toml::de::Error),
}

/// Load the configuration from `path`, or the default XDG location if `path` is `None`.
///
/// A missing file is not an error: it quietly resolves to [`Config::default`].
pub fn load(path: Option<PathBuf>) -> Result<Config, Error> {
    let path = match path {
        Some(path) => path,
        None => match default_path() {
            Some(path) => path,
            None => {
                warn!("no XDG config directory available, using default configuration");
                return Ok(Config::default());
            }
        },
    };

    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(?path, "no configuration file found, using defaults");
            return Ok(Config::default());
        }
        Err(err) => return Err(err.into()),
    };

    toml::from_str(&contents).map_err(Error::from)
}

fn default_path() -> Option<PathBuf> {
    xdg::BaseDirectories::new()
        .ok()
        .map(|dirs| dirs.get_config_file("lattice-compositor/config.toml"))
}
