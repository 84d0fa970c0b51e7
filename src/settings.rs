use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExtractoError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("extracto")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("extracto")
}

fn load_from(path: &Path) -> Settings {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

fn save_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| ExtractoError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn load_settings() -> Settings {
    load_from(&settings_path())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_to(&settings_path(), settings)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

/// Filesystem layout under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            raw_dir: data_dir.join("raw"),
            processed_dir: data_dir.join("processed"),
            db_path: data_dir.join("extracto.db"),
            data_dir,
        }
    }

    /// Paths for this run: an explicit override wins over the settings file.
    pub fn resolve(data_dir_override: Option<&str>) -> Self {
        match data_dir_override {
            Some(dir) => Self::new(shellexpand_path(dir)),
            None => Self::new(load_settings().data_dir),
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.raw_dir)?;
        std::fs::create_dir_all(&self.processed_dir)?;
        Ok(())
    }

    /// Use `input` as given when it exists, otherwise look for it under `raw_dir`.
    pub fn locate_input(&self, input: &str) -> PathBuf {
        let direct = PathBuf::from(input);
        if direct.exists() {
            return direct;
        }
        let in_raw = self.raw_dir.join(input);
        if in_raw.exists() {
            in_raw
        } else {
            direct
        }
    }
}
