use crate::config::{load_config, Config};
use crate::error::Result;
use clap::Args;
use std::path::PathBuf;

/// Options shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory scanned for AppImages
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Directory receiving the .desktop files
    #[arg(long)]
    pub applications_dir: Option<PathBuf>,

    /// hicolor theme directory receiving the icons
    #[arg(long)]
    pub icons_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

impl CommonArgs {
    /// Loads the config file and applies command line overrides.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(dir) = &self.source {
            config.paths.source_dir = dir.clone();
        }
        if let Some(dir) = &self.applications_dir {
            config.paths.applications_dir = dir.clone();
        }
        if let Some(dir) = &self.icons_dir {
            config.paths.icons_dir = dir.clone();
        }
        Ok(config)
    }
}

/// `info` by default, `debug` with `--verbose`; `RUST_LOG` wins over both.
pub fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}
