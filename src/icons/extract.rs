use crate::error::{Error, Result};
use crate::icons::probe::probe_image;
use crate::icons::score::{select_best, IconCandidate, IconScore};
use crate::model::Bundle;
use log::{debug, info, warn};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::fs::{self, File};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use walkdir::WalkDir;

const EXTRACT_ROOT: &str = "squashfs-root";
const EXTRACT_LOG: &str = "extract.log";
const MAX_CANDIDATE_BYTES: u64 = 8 * 1024 * 1024;
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const TERM_GRACE: Duration = Duration::from_secs(2);
const SPAWN_ATTEMPTS: usize = 3;

pub trait Unpacker {
    /// Unpacks `bundle` somewhere below `dest` and returns the root of the unpacked tree.
    fn unpack(&self, bundle: &Path, dest: &Path) -> Result<PathBuf>;
}

/// Runs the bundle's own `--appimage-extract`.
pub struct AppImageUnpacker {
    timeout: Option<Duration>,
}

impl AppImageUnpacker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn from_secs(timeout_secs: u64) -> Self {
        Self::new((timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)))
    }

    fn spawn(&self, bundle: &Path, dest: &Path, log: &File) -> std::io::Result<Child> {
        let mut attempt = 0;
        loop {
            let result = Command::new(bundle)
                .arg("--appimage-extract")
                .current_dir(dest)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(log.try_clone()?)
                .spawn();
            match result {
                // A freshly written bundle can still be open for writing elsewhere
                Err(e) if e.raw_os_error() == Some(nix::libc::ETXTBSY) && attempt + 1 < SPAWN_ATTEMPTS => {
                    attempt += 1;
                    debug!("{:?} is busy, retrying spawn", bundle);
                    thread::sleep(POLL_INTERVAL * 4);
                }
                other => return other,
            }
        }
    }
}

impl Unpacker for AppImageUnpacker {
    fn unpack(&self, bundle: &Path, dest: &Path) -> Result<PathBuf> {
        let bundle = std::path::absolute(bundle).map_err(|e| Error::io(bundle, e))?;
        let metadata = fs::metadata(&bundle).map_err(|e| Error::io(&bundle, e))?;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(Error::NotExecutable(bundle));
        }

        let log_path = dest.join(EXTRACT_LOG);
        let log = File::create(&log_path).map_err(|e| Error::io(&log_path, e))?;

        let mut child = self.spawn(&bundle, dest, &log).map_err(|e| Error::Extract {
            bundle: bundle.clone(),
            reason: e.to_string(),
        })?;
        let status = wait_with_timeout(&mut child, self.timeout, &bundle)?;

        if !status.success() {
            let stderr = fs::read_to_string(&log_path).unwrap_or_default();
            return Err(Error::Extract {
                bundle,
                reason: format!("{}: {}", status, last_line(&stderr)),
            });
        }

        let root = dest.join(EXTRACT_ROOT);
        if !root.is_dir() {
            return Err(Error::Extract {
                bundle,
                reason: format!("no {EXTRACT_ROOT} directory was produced"),
            });
        }
        Ok(root)
    }
}

fn last_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>, bundle: &Path) -> Result<ExitStatus> {
    let io_err = |e| Error::io(bundle, e);
    let Some(timeout) = timeout else {
        return child.wait().map_err(io_err);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            terminate(child);
            return Err(Error::ExtractTimeout {
                bundle: bundle.to_path_buf(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// SIGTERM, then SIGKILL once the grace period runs out.
fn terminate(child: &mut Child) {
    let pid = Pid::from_raw(child.id() as i32);
    debug!("Sending SIGTERM to extraction process {}", pid);
    if let Err(e) = kill(pid, Signal::SIGTERM) {
        debug!("Failed to send SIGTERM to {}: {}", pid, e);
    }

    let grace = Instant::now() + TERM_GRACE;
    while Instant::now() < grace {
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        thread::sleep(POLL_INTERVAL);
    }

    warn!("Extraction process {} ignored SIGTERM, killing it", pid);
    let _ = child.kill();
    let _ = child.wait();
}

/// Temporary extraction directory. Bundles may unpack read-only directories,
/// so write permission is restored before the directory is removed.
struct ExtractDir {
    dir: TempDir,
}

impl ExtractDir {
    fn create(work_dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("appimage-extract-");
        let dir = match work_dir {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                builder.tempdir_in(parent).map_err(|e| Error::io(parent, e))?
            }
            None => builder.tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?,
        };
        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Drop for ExtractDir {
    fn drop(&mut self) {
        for entry in WalkDir::new(self.dir.path()).into_iter().flatten() {
            if entry.file_type().is_dir() {
                let _ = fs::set_permissions(entry.path(), fs::Permissions::from_mode(0o700));
            }
        }
        // TempDir removes the tree when the field is dropped
    }
}

fn is_candidate_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name == ".DirIcon" {
        return true;
    }
    let lower = name.to_ascii_lowercase();
    [".png", ".svg", ".xpm", ".ico"]
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
}

/// Every image below `root` that could serve as the application icon.
pub fn collect_candidates(root: &Path) -> Vec<IconCandidate> {
    let canonical_root = match root.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            warn!("Cannot resolve {:?}: {}", root, e);
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).into_iter().flatten() {
        let path = entry.path();
        if !is_candidate_name(path) {
            continue;
        }

        let target = if entry.path_is_symlink() {
            match path.canonicalize() {
                Ok(t) if t.starts_with(&canonical_root) => t,
                _ => {
                    debug!("Skipping symlink {:?} leading outside the bundle", path);
                    continue;
                }
            }
        } else {
            path.to_path_buf()
        };

        match fs::metadata(&target) {
            Ok(m) if m.is_file() && m.len() <= MAX_CANDIDATE_BYTES => {}
            _ => continue,
        }
        let bytes = match fs::read(&target) {
            Ok(b) => b,
            Err(e) => {
                debug!("Cannot read {:?}: {}", target, e);
                continue;
            }
        };

        let (format, info) = probe_image(path, &bytes);
        let Some(format) = format else { continue };
        if info.is_none() {
            debug!("Could not measure {:?}", path);
        }

        let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
        candidates.push(IconCandidate { path: target, relative, format, info });
    }
    candidates
}

/// The winning icon of a bundle, with its bytes read before the extraction is cleaned up.
#[derive(Debug, Clone)]
pub struct ExtractedIcon {
    pub candidate: IconCandidate,
    pub score: IconScore,
    pub data: Vec<u8>,
}

/// Unpacks `bundle` into a temporary directory and returns its best icon.
/// `Ok(None)` means the bundle carries no usable image.
pub fn extract_best_icon(
    bundle: &Bundle,
    unpacker: &dyn Unpacker,
    work_dir: Option<&Path>,
) -> Result<Option<ExtractedIcon>> {
    let extract_dir = ExtractDir::create(work_dir)?;
    info!("Extracting {:?} to {:?}", bundle.path, extract_dir.path());

    let root = unpacker.unpack(&bundle.path, extract_dir.path())?;
    let candidates = collect_candidates(&root);
    if candidates.is_empty() {
        warn!("No icons found in {:?}", bundle.path);
        return Ok(None);
    }
    info!("Found {} icon candidates in {:?}", candidates.len(), bundle.path);

    let Some((candidate, score)) = select_best(candidates, &bundle.name) else {
        return Ok(None);
    };
    let data = fs::read(&candidate.path).map_err(|e| Error::io(&candidate.path, e))?;
    info!("Selected icon {:?} ({})", candidate.relative, score);

    Ok(Some(ExtractedIcon { candidate, score, data }))
}
