use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;
use weft::{filters, Context, Value};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Settings {
    /// Put the stock filters (`upper`, `lower`, ...) in the base context.
    #[serde(default = "enabled")]
    pub builtin_filters: bool,

    /// Values every template can read. Per-render values override these.
    #[serde(default)]
    pub globals: BTreeMap<String, serde_json::Value>,
}

fn enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            builtin_filters: true,
            globals: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Base contexts for a template, in merge order.
    pub fn contexts(&self) -> Vec<Context> {
        let globals = self
            .globals
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value.clone())))
            .collect();

        if self.builtin_filters {
            vec![filters::builtins(), globals]
        } else {
            vec![globals]
        }
    }
}

pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("weft").join("config.toml"))
}

/// Loads settings from `path`, or from the default location.
///
/// An explicit path must exist. A missing default file yields the defaults.
pub fn load(path: Option<PathBuf>) -> Result<Settings> {
    let explicit = path.is_some();
    match path.or_else(default_path) {
        Some(path) if explicit || path.exists() => read(&path),
        path => {
            debug!(?path, "no settings file, using defaults");
            Ok(Settings::default())
        }
    }
}

fn read(path: &Path) -> Result<Settings> {
    debug!(?path, "loading settings");

    let contents = fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("read settings file {}", path.display()))?;

    let settings = toml::from_str(&contents)
        .into_diagnostic()
        .wrap_err_with(|| format!("parse settings file {}", path.display()))?;

    debug!(?settings, "loaded settings");
    Ok(settings)
}
