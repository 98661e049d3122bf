use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 2;

/// Destination group inside the library, picked per release.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    pub short: String,
    pub folder: String,
    /// Group releases below an album-artist folder.
    pub aa_group: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadishConfig {
    pub version: u32,
    pub registry_path: String,
    pub mapping_path: String,
    pub library_path: String,
    pub various_artists: String,
    pub always_skip_mapped: bool,
    pub artist_remap: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagger_command: Option<Vec<String>>,
    pub copy_command: Vec<String>,
    pub shelves: Vec<ShelfConfig>,
}

impl Default for RadishConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            registry_path: "artist_sort.json".to_string(),
            mapping_path: "mapping.json".to_string(),
            library_path: "".to_string(),
            various_artists: "Various Artists".to_string(),
            always_skip_mapped: false,
            artist_remap: BTreeMap::new(),
            events_path: None,
            tagger_command: None,
            copy_command: vec!["cp".to_string(), "-r".to_string()],
            shelves: Vec::new(),
        }
    }
}

impl RadishConfig {
    pub fn shelf(&self, short: &str) -> Option<&ShelfConfig> {
        self.shelves.iter().find(|shelf| shelf.short == short)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("RADISH_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("radish.yaml"))
            .unwrap_or_else(|| PathBuf::from("radish.yaml")),
        Err(_) => PathBuf::from("radish.yaml"),
    }
}

/// Returns the config and whether it was written out (created or upgraded).
pub fn load_or_create_config(path: &Path) -> Result<(RadishConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: RadishConfig = serde_yaml::from_str(&contents)?;
        let mut changed = false;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
            changed = true;
        }
        if config.registry_path.trim().is_empty() {
            config.registry_path = "artist_sort.json".to_string();
            changed = true;
        }
        if config.mapping_path.trim().is_empty() {
            config.mapping_path = "mapping.json".to_string();
            changed = true;
        }
        if config.copy_command.is_empty() {
            config.copy_command = RadishConfig::default().copy_command;
            changed = true;
        }
        if config.tagger_command.as_ref().is_some_and(|cmd| cmd.is_empty()) {
            config.tagger_command = None;
        }
        if changed {
            save_config(path, &config)?;
        }
        return Ok((config, changed));
    }

    let config = RadishConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &RadishConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}
