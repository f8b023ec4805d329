// config.rs
//! Config code

use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "reelbox.toml";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (from trace to off, case insensitive)
    pub log_level:       String,
    /// Whether to log to the console
    pub log_to_console:  bool,
    /// Path to the log file
    pub log_file:        PathBuf,
    /// Max log size in bytes
    pub log_max_size:    u64,
    /// Address the server listens on
    pub server_address:  String,
    /// Directory uploaded videos are stored in
    pub upload_dir:      PathBuf,
    /// Directory public assets are served from
    pub public_dir:      PathBuf,
    /// Suffix a stored file must have to show up in the gallery
    pub video_extension: String,
    /// Maximum request body size for uploads, in bytes. Unlimited if unset.
    pub max_upload_size: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level:       "info".to_string(),
            log_to_console:  true,
            log_file:        PathBuf::from("reelbox.log"),
            log_max_size:    16 * 1024 * 1024, // 16 MiB
            server_address:  "0.0.0.0:3000".to_string(),
            upload_dir:      PathBuf::from("uploads"),
            public_dir:      PathBuf::from("public"),
            video_extension: ".mp4".to_string(),
            max_upload_size: None,
        }
    }
}

impl Config {
    /// # Load the config from a toml file
    ///
    /// Logging isn't set up yet when this runs, so problems are reported on stderr. A missing or
    /// invalid file falls back to the default config.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        let config_str = match fs::read_to_string(path) {
            | Ok(c) => c,
            | Err(e) => {
                eprintln!("Failed to read config file at {}: {e}", path.display());
                eprintln!("The default config will be used");
                return Self::default();
            },
        };

        Self::parse(&config_str).unwrap_or_else(|e| {
            eprintln!("\x1b[31;1mInvalid config: {e}\x1b[0m");
            eprintln!("\x1b[31;1mThe default config will be used\x1b[0m");
            Self::default()
        })
    }

    pub fn parse(s: &str) -> Result<Self, toml::de::Error> { toml::de::from_str(s) }
}
