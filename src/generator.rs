use crate::config::Config;
use crate::entry::{EntryWriter, WrittenEntry};
use crate::error::{Error, Result};
use crate::icons::{extract_best_icon, AppImageUnpacker, Unpacker};
use crate::model::Bundle;
use crate::refresh::refresh_desktop_database;
use crate::scanner::scan_bundles;
use log::{error, info};
use std::path::{Path, PathBuf};

/// Outcome of one batch pass.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub bundles: usize,
    pub changed: usize,
    pub without_icon: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// The per-bundle routine shared by the batch and watch drivers.
pub struct Generator {
    source_dir: PathBuf,
    work_dir: Option<PathBuf>,
    refresh_command: Vec<String>,
    unpacker: Box<dyn Unpacker>,
    writer: EntryWriter,
}

impl Generator {
    pub fn new(config: &Config) -> Self {
        let unpacker = AppImageUnpacker::from_secs(config.extract.timeout_secs);
        Self::with_unpacker(config, Box::new(unpacker))
    }

    pub fn with_unpacker(config: &Config, unpacker: Box<dyn Unpacker>) -> Self {
        Self {
            source_dir: config.paths.source_dir.clone(),
            work_dir: config.extract.work_dir.clone(),
            refresh_command: config.entry.refresh_command.clone(),
            unpacker,
            writer: EntryWriter::new(
                &config.paths.applications_dir,
                &config.paths.icons_dir,
                &config.entry.comment,
                config.entry.fallback_icon.clone(),
            ),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Extracts the icon of `bundle` and writes its outputs. A bundle without
    /// images still gets a desktop entry.
    pub fn process_bundle(&self, bundle: &Bundle) -> Result<WrittenEntry> {
        info!("Processing: {:?}", bundle.path);
        let icon = extract_best_icon(bundle, self.unpacker.as_ref(), self.work_dir.as_deref())?;
        self.writer.write(bundle, icon.as_ref())
    }

    pub fn refresh(&self) {
        refresh_desktop_database(&self.refresh_command);
    }

    /// Processes one bundle path and refreshes the desktop database if anything changed.
    pub fn process_path(&self, path: &Path) -> Result<WrittenEntry> {
        let path = std::path::absolute(path).map_err(|e| Error::io(path, e))?;
        let written = self.process_bundle(&Bundle::new(path))?;
        if written.changed {
            self.refresh();
        }
        Ok(written)
    }

    /// Processes every bundle in the source directory. Only a missing source
    /// directory fails the pass; bundle errors are logged and reported.
    pub fn run_batch(&self) -> Result<BatchReport> {
        info!("Scanning for AppImages in: {:?}", self.source_dir);
        info!("Generating desktop files in: {:?}", self.writer.applications_dir());

        let bundles = scan_bundles(&self.source_dir)?;
        let mut report = BatchReport { bundles: bundles.len(), ..Default::default() };

        for bundle in &bundles {
            match self.process_bundle(bundle) {
                Ok(written) => {
                    if written.changed {
                        report.changed += 1;
                    }
                    if written.icon_path.is_none() {
                        report.without_icon += 1;
                    }
                }
                Err(e) => {
                    error!("Error generating desktop file for {:?}: {}", bundle.path, e);
                    report.failed.push((bundle.path.clone(), e.to_string()));
                }
            }
        }

        if report.changed > 0 {
            self.refresh();
        }

        info!(
            "Desktop file generation complete: {} bundles, {} changed, {} without icon, {} failed",
            report.bundles,
            report.changed,
            report.without_icon,
            report.failed.len()
        );
        Ok(report)
    }
}
