//! Application-level configuration loading: storage locations, mailbox sizing and the
//! encyclopedias offered to hosts.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "WIKIRACE_CONFIG_PATH";
const DEFAULT_DATA_DIR: &str = "./games";
const DEFAULT_KEY_FILE: &str = "./games/.page-key";
const DEFAULT_MAILBOX_CAPACITY: usize = 16;
const DEFAULT_WIKI_URL: &str = "https://en.wikipedia.org";

/// Encyclopedia a race can be played on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WikiSite {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    data_dir: PathBuf,
    key_file: PathBuf,
    mailbox_capacity: usize,
    default_wiki_url: String,
    wikis: Vec<WikiSite>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        data_dir = %app_config.data_dir.display(),
                        wikis = app_config.wikis.len(),
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Directory holding one record per game.
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    /// File holding the hex-encoded page token key.
    pub fn key_file(&self) -> &PathBuf {
        &self.key_file
    }

    /// Capacity of each realtime connection's mailbox, never zero.
    pub fn mailbox_capacity(&self) -> usize {
        self.mailbox_capacity
    }

    pub fn default_wiki_url(&self) -> &str {
        &self.default_wiki_url
    }

    pub fn wikis(&self) -> &[WikiSite] {
        &self.wikis
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            key_file: PathBuf::from(DEFAULT_KEY_FILE),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            default_wiki_url: DEFAULT_WIKI_URL.to_string(),
            wikis: default_wikis(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    data_dir: Option<PathBuf>,
    key_file: Option<PathBuf>,
    mailbox_capacity: Option<usize>,
    default_wiki_url: Option<String>,
    #[serde(default)]
    wikis: Vec<WikiSite>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        let wikis = if value.wikis.is_empty() {
            defaults.wikis
        } else {
            value.wikis
        };
        Self {
            data_dir: value.data_dir.unwrap_or(defaults.data_dir),
            key_file: value.key_file.unwrap_or(defaults.key_file),
            mailbox_capacity: value
                .mailbox_capacity
                .unwrap_or(defaults.mailbox_capacity)
                .max(1),
            default_wiki_url: value
                .default_wiki_url
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.default_wiki_url),
            wikis,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_wikis() -> Vec<WikiSite> {
    [
        ("English Wikipedia", "https://en.wikipedia.org"),
        ("French Wikipedia", "https://fr.wikipedia.org"),
        ("German Wikipedia", "https://de.wikipedia.org"),
    ]
    .into_iter()
    .map(|(name, url)| WikiSite {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}
