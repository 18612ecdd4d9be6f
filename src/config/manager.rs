//! Configuration source wrangling
// (c) 2024 Ross Younger

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::Result;
use figment::{
    Figment, Metadata, Provider,
    providers::{Env, Format as _, Toml},
    value::Value,
};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Configuration, SystemDefault};

/// Prefix for configuration environment variables, e.g. `SWCP_PORT`
pub const ENV_PREFIX: &str = "SWCP_";

/// Processes and merges all possible configuration sources.
///
/// To see which files apply on the current platform, run `swcp --config-files`.
#[derive(Debug, Clone)]
pub struct Manager {
    /// Configuration data
    pub(super) data: Figment,
}

impl Manager {
    /// Constructor.
    ///
    /// Sources are merged in rising priority: system file, user file, `extra_file`, environment.
    pub(super) fn new(apply_env: bool, apply_config_files: bool, extra_file: Option<&Path>) -> Self {
        let mut new1 = Self {
            data: Figment::new(),
        };
        if apply_config_files {
            // N.B. This may leave data in a fused-error state, if a config file isn't parseable.
            new1.add_config("system", Some(&system_config_path()));
            new1.add_config("user", user_config_path().as_ref());
        }
        if let Some(path) = extra_file {
            new1.merge_provider(Toml::file_exact(path));
        }
        if apply_env {
            new1.merge_provider(Env::prefixed(ENV_PREFIX));
        }
        new1
    }

    /// General constructor for production use
    ///
    /// Reads the set of config files appropriate to the platform and the current user,
    /// then the environment.
    #[must_use]
    pub fn standard(extra_file: Option<&Path>) -> Self {
        Self::new(true, true, extra_file)
    }

    /// Testing/internal constructor, does not read files or environment; DOES apply system default.
    #[must_use]
    #[cfg(test)]
    pub(crate) fn without_files() -> Self {
        let mut new1 = Self::new(false, false, None);
        new1.apply_system_default();
        new1
    }

    /// Testing/internal constructor, does not read files, environment or system default
    #[must_use]
    #[cfg(test)]
    pub(crate) fn without_default() -> Self {
        Self::new(false, false, None)
    }

    fn add_config(&mut self, what: &str, path: Option<&PathBuf>) {
        let Some(path) = path else {
            warn!("could not determine {what} configuration file path");
            return;
        };
        if !path.exists() {
            debug!("{what} configuration file {path:?} not present");
            return;
        }
        self.merge_provider(Toml::file_exact(path));
    }

    /// Returns the list of configuration files we read.
    ///
    /// This is a function of platform and the current user.
    #[must_use]
    pub fn config_files() -> Vec<String> {
        std::iter::once(system_config_path())
            .chain(user_config_path())
            .map(|p| p.to_string_lossy().to_string())
            .collect()
    }

    /// Merges in a data set, which is some sort of [figment::Provider](https://docs.rs/figment/latest/figment/trait.Provider.html).
    /// This uses figment's `merge` operation, which prefers to _replace_ existing items.
    pub fn merge_provider<T>(&mut self, provider: T)
    where
        T: Provider,
    {
        let f = std::mem::take(&mut self.data);
        self.data = f.merge(provider); // in the error case, this leaves the provider in a fused state
    }

    /// Applies the system default settings, at a lower priority than everything else
    pub fn apply_system_default(&mut self) {
        let f = std::mem::take(&mut self.data);
        self.data = f.join(SystemDefault);
    }

    /// Attempts to extract a particular struct from the data.
    ///
    /// `T` is usually [Configuration], but it isn't intrinsically required to be.
    pub fn get<'de, T>(&self) -> Result<T, figment::Error>
    where
        T: Deserialize<'de>,
    {
        self.data.extract_lossy::<T>()
    }

    /// Extracts the configuration with the system default underneath, and validates it
    pub fn configuration(&self) -> Result<Configuration> {
        let mut working = self.clone();
        working.apply_system_default();
        working.get::<Configuration>()?.validate()
    }

    /// Creates a pretty-printer for the current [Configuration] fields and their sources.
    #[must_use]
    pub fn to_display_adapter(&self) -> DisplayAdapter<'_> {
        DisplayAdapter { source: self }
    }
}

/// Location of the system-wide configuration file
#[must_use]
pub fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/swcp.toml")
}

/// Location of the current user's configuration file, if we can work one out
#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("swcp").join("swcp.toml"))
}

/// Pretty-printing type wrapper to [`Manager`]
#[derive(Debug)]
pub struct DisplayAdapter<'a> {
    source: &'a Manager,
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(_tag, s) => s.clone(),
        Value::Char(_tag, c) => c.to_string(),
        Value::Bool(_tag, b) => b.to_string(),
        Value::Num(_tag, num) => num
            .to_u128()
            .map(|u| u.to_string())
            .or_else(|| num.to_i128().map(|i| i.to_string()))
            .or_else(|| num.to_f64().map(|f| f.to_string()))
            .unwrap_or_default(),
        Value::Empty(_tag, _) => "<empty>".into(),
        Value::Dict(_tag, dict) => format!("{{{} entries}}", dict.len()),
        Value::Array(_tag, vec) => format!(
            "[{}]",
            vec.iter().map(render_value).collect::<Vec<_>>().join(",")
        ),
    }
}

fn render_source(meta: Option<&Metadata>) -> String {
    meta.map(|m| {
        m.source
            .as_ref()
            .map_or_else(|| m.name.to_string(), figment::Source::to_string)
    })
    .unwrap_or_default()
}

impl Display for DisplayAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = &self.source.data;
        let width = Configuration::FIELDS
            .iter()
            .map(|s| s.len())
            .max()
            .unwrap_or_default();
        for field in Configuration::FIELDS {
            if let Ok(value) = data.find_value(field) {
                let meta = data.get_metadata(value.tag());
                writeln!(
                    f,
                    "{field:width$}  {value:20}  ({source})",
                    value = render_value(&value),
                    source = render_source(meta),
                )?;
            }
        }
        Ok(())
    }
}
