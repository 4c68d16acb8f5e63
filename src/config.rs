use colored::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::parsers::UnknownRoles;

pub const CONFIG_FILE: &str = "doc2dash.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
    /// How many parsed entries may wait for the indexer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub unknown_roles: UnknownRoles,
    #[serde(default)]
    pub enable_js: bool,
    #[serde(default)]
    pub online_redirect_url: Option<String>,
}

fn default_destination() -> PathBuf {
    PathBuf::from(".")
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for Config {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            channel_capacity: default_channel_capacity(),
            unknown_roles: UnknownRoles::default(),
            enable_js: false,
            online_redirect_url: None,
        }
    }
}

impl Config {
    /// Load `doc2dash.toml` from the working directory, falling back to
    /// defaults.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        return config;
                    }
                    Err(e) => {
                        eprintln!(
                            "{} Failed to parse {}: {}",
                            "⚠️".yellow(),
                            config_path.display(),
                            e
                        );
                        eprintln!("   Using default configuration");
                    }
                },
                Err(e) => {
                    eprintln!(
                        "{} Failed to read {}: {}",
                        "⚠️".yellow(),
                        config_path.display(),
                        e
                    );
                    eprintln!("   Using default configuration");
                }
            }
        }

        Config::default()
    }
}
