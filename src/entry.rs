//! Desktop entry rendering and idempotent output writing.

use crate::error::{Error, Result};
use crate::icons::ExtractedIcon;
use crate::model::Bundle;
use log::{debug, info};
use std::fmt;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const DESKTOP_MODE: u32 = 0o755;
const ICON_MODE: u32 = 0o644;

// Characters that force an Exec argument into double quotes.
const EXEC_RESERVED: &[char] = &[
    ' ', '\t', '\n', '"', '\'', '\\', '>', '<', '~', '|', '&', ';', '$', '*', '?', '#', '(', ')', '`',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub name: String,
    pub comment: String,
    pub exec: String,
    pub try_exec: String,
    pub icon: Option<String>,
    pub categories: String,
}

impl DesktopEntry {
    pub fn for_bundle(bundle: &Bundle, icon: Option<String>, comment: &str) -> Self {
        let path = bundle.path.to_string_lossy();
        let mut exec = quote_exec_arg(&path);
        if bundle.category.takes_url {
            exec.push_str(" %u");
        }
        Self {
            name: bundle.name.clone(),
            comment: comment.to_string(),
            exec,
            try_exec: path.into_owned(),
            icon,
            categories: bundle.category.categories.to_string(),
        }
    }
}

impl fmt::Display for DesktopEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Desktop Entry]")?;
        writeln!(f, "Type=Application")?;
        writeln!(f, "Name={}", escape_value(&self.name))?;
        writeln!(f, "Comment={}", escape_value(&self.comment))?;
        writeln!(f, "Exec={}", escape_value(&self.exec))?;
        writeln!(f, "TryExec={}", escape_value(&self.try_exec))?;
        if let Some(icon) = &self.icon {
            writeln!(f, "Icon={}", escape_value(icon))?;
        }
        writeln!(f, "Terminal=false")?;
        writeln!(f, "Categories={}", self.categories)
    }
}

/// Quotes one Exec argument. `%` is a field code prefix and is always doubled.
fn quote_exec_arg(arg: &str) -> String {
    let arg = arg.replace('%', "%%");
    if !arg.contains(EXEC_RESERVED) {
        return arg;
    }
    let mut quoted = String::with_capacity(arg.len() + 2);
    quoted.push('"');
    for c in arg.chars() {
        if matches!(c, '"' | '`' | '$' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

/// Writes `data` to `path` unless the file already holds exactly those bytes.
/// The mode is applied either way. Returns whether the content changed.
pub fn write_if_changed(path: &Path, data: &[u8], mode: u32) -> Result<bool> {
    let unchanged = fs::read(path).is_ok_and(|existing| existing == data);

    if !unchanged {
        let parent = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
        tmp.write_all(data).map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    }

    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| Error::io(path, e))?;
    Ok(!unchanged)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenEntry {
    pub desktop_path: PathBuf,
    pub icon_path: Option<PathBuf>,
    pub changed: bool,
}

/// Writes the outputs of one bundle.
pub struct EntryWriter {
    applications_dir: PathBuf,
    icons_dir: PathBuf,
    comment: String,
    fallback_icon: Option<String>,
}

impl EntryWriter {
    pub fn new(
        applications_dir: impl Into<PathBuf>,
        icons_dir: impl Into<PathBuf>,
        comment: impl Into<String>,
        fallback_icon: Option<String>,
    ) -> Self {
        Self {
            applications_dir: applications_dir.into(),
            icons_dir: icons_dir.into(),
            comment: comment.into(),
            fallback_icon,
        }
    }

    pub fn applications_dir(&self) -> &Path {
        &self.applications_dir
    }

    /// Icon file for `bundle`: named after the bundle id with no extension.
    pub fn icon_path(&self, bundle: &Bundle, icon: &ExtractedIcon) -> PathBuf {
        self.icons_dir.join(icon.candidate.theme_dir()).join(&bundle.id)
    }

    pub fn write(&self, bundle: &Bundle, icon: Option<&ExtractedIcon>) -> Result<WrittenEntry> {
        let mut changed = false;

        let icon_path = match icon {
            Some(icon) => {
                let path = self.icon_path(bundle, icon);
                changed |= write_if_changed(&path, &icon.data, ICON_MODE)?;
                debug!("Cached icon {:?}", path);
                Some(path)
            }
            None => None,
        };

        let icon_name = match icon {
            Some(_) => Some(bundle.id.clone()),
            None => self.fallback_icon.clone(),
        };
        let entry = DesktopEntry::for_bundle(bundle, icon_name, &self.comment);
        let desktop_path = self.applications_dir.join(bundle.desktop_file_name());
        changed |= write_if_changed(&desktop_path, entry.to_string().as_bytes(), DESKTOP_MODE)?;

        if changed {
            info!("Generated desktop file: {:?}", desktop_path);
        } else {
            debug!("Desktop file {:?} already up to date", desktop_path);
        }

        Ok(WrittenEntry { desktop_path, icon_path, changed })
    }
}
