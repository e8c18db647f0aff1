use serde::Deserialize;
use std::path::{Path, PathBuf};
use directories::{BaseDirs, ProjectDirs};
use std::fs;
use crate::error::{Error, Result};

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub entry: EntryConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PathConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_applications_dir")]
    pub applications_dir: PathBuf,
    #[serde(default = "default_icons_dir")]
    pub icons_dir: PathBuf,
}

fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn data_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| home_dir().join(".local/share"))
}

fn default_source_dir() -> PathBuf { home_dir().join("AppImages") }
fn default_applications_dir() -> PathBuf { data_dir().join("applications") }
fn default_icons_dir() -> PathBuf { data_dir().join("icons").join("hicolor") }

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            applications_dir: default_applications_dir(),
            icons_dir: default_icons_dir(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExtractConfig {
    /// Seconds before a running `--appimage-extract` is terminated. 0 waits forever.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Parent for the temporary extraction directories (system temp dir if unset).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 { 60 }

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            work_dir: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EntryConfig {
    #[serde(default = "default_comment")]
    pub comment: String,
    /// Icon name written when a bundle carries no usable image.
    #[serde(default)]
    pub fallback_icon: Option<String>,
    /// Program and arguments run after entries change. Empty disables the refresh.
    #[serde(default = "default_refresh_command")]
    pub refresh_command: Vec<String>,
}

fn default_comment() -> String { "AppImage Application".to_string() }
fn default_refresh_command() -> Vec<String> { vec!["update-desktop-database".to_string()] }

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            comment: default_comment(),
            fallback_icon: None,
            refresh_command: default_refresh_command(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct WatchConfig {
    /// Poll interval used to wait for a new bundle to stop growing.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default)]
    pub scan_on_start: bool,
}

fn default_settle_ms() -> u64 { 1000 }

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            scan_on_start: false,
        }
    }
}

impl Config {
    pub fn parse(content: &str) -> Result<Config> {
        let mut config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.expand_paths();
        Ok(config)
    }

    fn expand_paths(&mut self) {
        let home = home_dir();
        self.paths.source_dir = expand_home(&self.paths.source_dir, &home);
        self.paths.applications_dir = expand_home(&self.paths.applications_dir, &home);
        self.paths.icons_dir = expand_home(&self.paths.icons_dir, &home);
        if let Some(dir) = &self.extract.work_dir {
            self.extract.work_dir = Some(expand_home(dir, &home));
        }
    }
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

pub fn default_config_path() -> PathBuf {
    match ProjectDirs::from("org", "appimage-desktop", "appimage-desktop") {
        Some(dirs) => dirs.config_dir().join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

/// Loads `path`, or the default config location when `path` is `None`.
/// A missing default file yields the built-in defaults; a missing explicit file is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = default_config_path();
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };

    let content = fs::read_to_string(&config_path).map_err(|e| Error::io(&config_path, e))?;
    Config::parse(&content)
}
