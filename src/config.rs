//! Loading server configuration from TOML, with environment overrides.
//!
//! Sources, later wins:
//!   1. built-in defaults
//!   2. TOML file at SURVEY_CONFIG_PATH (optional)
//!   3. env: PORT, DATA_ROOT, STATIC_DIR, SERIALIZE_WRITES

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
  pub port: u16,
  /// Directory holding survey.json and the per-user trees.
  pub data_root: PathBuf,
  /// Built front-end served for unknown paths, if the directory exists.
  pub static_dir: Option<PathBuf>,
  /// Hold a per-file lock across each read-modify-write.
  pub serialize_writes: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      port: 3000,
      data_root: PathBuf::from("./data"),
      static_dir: Some(PathBuf::from("./static")),
      serialize_writes: true,
    }
  }
}

impl ServerConfig {
  /// Defaults, then the TOML file (if any), then env overrides.
  pub fn from_env() -> Self {
    let mut cfg = load_config_file_from_env().unwrap_or_default();
    cfg.apply_overrides(|k| std::env::var(k).ok());
    cfg
  }

  /// Apply overrides from a key lookup (env in production, a map in tests).
  pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
    if let Some(p) = get("PORT") {
      match p.parse::<u16>() {
        Ok(port) => self.port = port,
        Err(_) => warn!(target: "survey_backend", value = %p, "Ignoring invalid PORT"),
      }
    }
    if let Some(d) = get("DATA_ROOT").filter(|d| !d.is_empty()) {
      self.data_root = PathBuf::from(d);
    }
    if let Some(s) = get("STATIC_DIR") {
      self.static_dir = if s.is_empty() { None } else { Some(PathBuf::from(s)) };
    }
    if let Some(v) = get("SERIALIZE_WRITES") {
      match parse_bool(&v) {
        Some(b) => self.serialize_writes = b,
        None => warn!(target: "survey_backend", value = %v, "Ignoring invalid SERIALIZE_WRITES"),
      }
    }
  }
}

fn parse_bool(s: &str) -> Option<bool> {
  match s.trim().to_ascii_lowercase().as_str() {
    "1" | "true" | "yes" | "on" => Some(true),
    "0" | "false" | "no" | "off" => Some(false),
    _ => None,
  }
}

/// Attempt to load `ServerConfig` from SURVEY_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_file_from_env() -> Option<ServerConfig> {
  let path = std::env::var("SURVEY_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ServerConfig>(&s) {
      Ok(cfg) => {
        info!(target: "survey_backend", %path, "Loaded server config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "survey_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "survey_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
