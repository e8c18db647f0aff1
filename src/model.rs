use crate::category::{self, Category};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const BUNDLE_SUFFIX: &str = ".appimage";

// Version (`-1.2.3`, `_v2`) or architecture (`.x86_64`) tail after the application name.
static NAME_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(.+?)[-_.](?:v?\d|(?:x86[-_]64|x86|amd64|aarch64|arm64|armhf|armv7l|i[3-6]86|x64|linux)(?:[-_.]|$))",
    )
    .expect("valid name regex")
});

/// One AppImage on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub path: PathBuf,
    pub id: String,       // File-name-safe stem, used for the .desktop and icon file names
    pub name: String,     // Display name
    pub category: Category,
}

impl Bundle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = bundle_stem(&path);
        let name = infer_name(&stem);
        Self {
            id: sanitize_id(&stem),
            category: category::detect_category(&name),
            name,
            path,
        }
    }

    pub fn desktop_file_name(&self) -> String {
        format!("{}.desktop", self.id)
    }
}

pub fn is_bundle_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(strip_bundle_suffix)
        .is_some_and(|stem| !stem.is_empty())
}

fn strip_bundle_suffix(file_name: &str) -> Option<&str> {
    let split = file_name.len().checked_sub(BUNDLE_SUFFIX.len())?;
    if !file_name.is_char_boundary(split) {
        return None;
    }
    let (stem, suffix) = file_name.split_at(split);
    suffix.eq_ignore_ascii_case(BUNDLE_SUFFIX).then_some(stem)
}

fn bundle_stem(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match strip_bundle_suffix(&file_name) {
        Some(stem) => stem.to_string(),
        None => file_name,
    }
}

fn infer_name(stem: &str) -> String {
    NAME_TAIL
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| stem.to_string())
}

fn sanitize_id(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect()
}
