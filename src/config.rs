use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Window setup read from `~/.config/lm-desk/config.toml`. Connection
/// settings live separately in `settings.json`.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

fn default_min_width() -> u32 {
    400
}

fn default_min_height() -> u32 {
    300
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 900,
            height: 700,
            min_width: default_min_width(),
            min_height: default_min_height(),
        }
    }
}

impl Config {
    pub fn load() -> Self {
        let config_path = Self::get_config_path();

        if config_path.exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => return config,
                    Err(e) => eprintln!("Error parsing config.toml: {}. Using defaults.", e),
                },
                Err(e) => eprintln!("Error reading config.toml: {}. Using defaults.", e),
            }
        } else if let Some(parent) = config_path.parent() {
            let _ = fs::create_dir_all(parent);
        }

        Config::default()
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn get_config_dir() -> PathBuf {
        if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home).join(".config/lm-desk")
        } else {
            PathBuf::from(".")
        }
    }
}
