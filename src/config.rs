use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::cache::ControllerOptions;
use crate::store::{Settings, StoreOptions, DEFAULT_KEY_PREFIX};

const APP_NAME: &str = "piggyback";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Prefix of every cache name the app owns
  pub app_name: String,
  /// Origin the cache controller treats as same-origin
  pub origin: String,
  /// Where the store, cache and log live (default: $XDG_DATA_HOME/piggyback)
  pub data_dir: Option<PathBuf>,
  pub cache: CacheConfig,
  pub store: StoreConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      app_name: APP_NAME.to_string(),
      origin: "http://localhost:5000".to_string(),
      data_dir: None,
      cache: CacheConfig::default(),
      store: StoreConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Version tag embedded in cache names; bump on every deployment
  pub version: String,
  pub precache: Vec<String>,
  pub shell: String,
  pub build_prefix: String,
  /// Cross-origin hosts whose responses are treated as fonts (case-insensitive)
  #[serde(deserialize_with = "deserialize_lowercase_list")]
  pub font_hosts: Vec<String>,
  #[serde(deserialize_with = "deserialize_lowercase_list")]
  pub cacheable_extensions: Vec<String>,
  /// Take over as soon as install completes
  pub skip_waiting: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    use crate::cache::{DEFAULT_BUILD_PREFIX, DEFAULT_CACHEABLE_EXTENSIONS, DEFAULT_FONT_HOSTS};
    use crate::cache::{DEFAULT_PRECACHE, DEFAULT_SHELL};

    Self {
      version: "v1".to_string(),
      precache: DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
      shell: DEFAULT_SHELL.to_string(),
      build_prefix: DEFAULT_BUILD_PREFIX.to_string(),
      font_hosts: DEFAULT_FONT_HOSTS.iter().map(|s| s.to_string()).collect(),
      cacheable_extensions: DEFAULT_CACHEABLE_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect(),
      skip_waiting: true,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub key_prefix: String,
  pub currency_code: String,
  pub currency_symbol: String,
  pub language: String,
}

impl Default for StoreConfig {
  fn default() -> Self {
    let settings = Settings::default();
    Self {
      key_prefix: DEFAULT_KEY_PREFIX.to_string(),
      currency_code: settings.currency_code,
      currency_symbol: settings.currency_symbol,
      language: settings.language,
    }
  }
}

fn deserialize_lowercase_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(v.into_iter().map(|s| s.to_lowercase()).collect())
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./piggyback.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/piggyback/config.yaml
  ///
  /// Built-in defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => {
        debug!("No configuration file found, using defaults");
        Ok(Self::default())
      }
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("piggyback.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join(APP_NAME).join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Directory holding the store, cache database and logs.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join(APP_NAME))
  }

  pub fn store_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("store.db"))
  }

  pub fn cache_path(&self) -> Result<PathBuf> {
    Ok(self.data_dir()?.join("cache.db"))
  }

  pub fn origin(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      key_prefix: self.store.key_prefix.clone(),
      defaults: Settings {
        currency_code: self.store.currency_code.clone(),
        currency_symbol: self.store.currency_symbol.clone(),
        language: self.store.language.clone(),
      },
    }
  }

  pub fn controller_options(&self) -> Result<ControllerOptions> {
    let origin = self.origin()?;
    let mut options = ControllerOptions::new(origin, &self.app_name, &self.cache.version);

    options.policy = options
      .policy
      .with_font_hosts(self.cache.font_hosts.clone())
      .with_build_prefix(self.cache.build_prefix.clone())
      .with_cacheable_extensions(self.cache.cacheable_extensions.clone());
    options.precache = self.cache.precache.clone();
    options.shell = self.cache.shell.clone();
    options.skip_waiting = self.cache.skip_waiting;

    Ok(options)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("{}").unwrap();
    assert_eq!(config.app_name, "piggyback");
    assert_eq!(config.cache.precache.len(), 4);
    assert_eq!(config.store.currency_code, "MGA");
    assert!(config.cache.skip_waiting);
  }

  #[test]
  fn test_partial_override() {
    let config = Config::parse(
      r#"
origin: https://piggy.example.com
data_dir: /tmp/piggy
cache:
  version: v7
  font_hosts: [Fonts.Example.COM]
store:
  currency_code: EUR
  currency_symbol: "€"
"#,
    )
    .unwrap();

    assert_eq!(config.cache.version, "v7");
    assert_eq!(config.cache.font_hosts, vec!["fonts.example.com"]);
    assert_eq!(config.cache.shell, "/index.html");
    assert_eq!(config.store.language, "en");
    assert_eq!(config.store_path().unwrap(), PathBuf::from("/tmp/piggy/store.db"));

    let options = config.store_options();
    assert_eq!(options.defaults.currency_symbol, "€");
    assert_eq!(options.key_prefix, "simple-piggy");

    let controller = config.controller_options().unwrap();
    assert_eq!(controller.origin.as_str(), "https://piggy.example.com/");
  }

  #[test]
  fn test_invalid_origin() {
    let config = Config::parse("origin: not a url").unwrap();
    assert!(config.controller_options().is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("piggyback.yaml");
    std::fs::write(&path, "cache:\n  version: v9\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.cache.version, "v9");

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}
