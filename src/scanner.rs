use crate::error::{Error, Result};
use crate::model::{is_bundle_path, Bundle};
use std::fs;
use std::path::Path;
use log::{info, debug};

/// Lists the bundles directly inside `dir`, sorted by path. Bundle paths are
/// absolute even when `dir` is relative, since they end up on `Exec=` lines.
pub fn scan_bundles(dir: &Path) -> Result<Vec<Bundle>> {
    if !dir.is_dir() {
        return Err(Error::MissingSourceDir(dir.to_path_buf()));
    }
    let dir = &std::path::absolute(dir).map_err(|e| Error::io(dir, e))?;

    debug!("Scanning bundles in {:?}", dir);
    let read_dir = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in read_dir.flatten() {
        let path = entry.path();
        // is_file follows symlinks, so linked bundles are picked up too
        if path.is_file() && is_bundle_path(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let bundles: Vec<Bundle> = paths.into_iter().map(Bundle::new).collect();
    info!("Scanner: found {} bundles in {:?}", bundles.len(), dir);
    Ok(bundles)
}
