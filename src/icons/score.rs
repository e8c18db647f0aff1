use crate::icons::probe::{IconFormat, ImageInfo};
use std::cmp::Reverse;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Icon sizes with a directory in the hicolor theme.
pub const STANDARD_SIZES: [u32; 10] = [16, 22, 24, 32, 48, 64, 96, 128, 256, 512];
const FALLBACK_SIZE: u32 = 48;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconCandidate {
    pub path: PathBuf,         // Location in the unpacked tree
    pub relative: PathBuf,     // Location relative to the bundle root
    pub format: IconFormat,
    pub info: Option<ImageInfo>,
}

/// Ranking key for a candidate. Fields compare in declaration order, and the
/// trailing path makes the order total, so selection never depends on the
/// order the files were found in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IconScore {
    pub probed: bool,
    pub square: bool,
    pub icon_context: bool,
    pub format: IconFormat,
    pub area: u64,
    pub standard_size: bool,
    pub name_match: bool,
    depth: Reverse<usize>,
    path: Reverse<PathBuf>,
}

impl fmt::Display for IconScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probed={} square={} context={} format={} area={} standard={} name={} depth={}",
            self.probed,
            self.square,
            self.icon_context,
            self.format,
            self.area,
            self.standard_size,
            self.name_match,
            self.depth.0,
        )
    }
}

impl IconCandidate {
    pub fn score(&self, app_name: &str) -> IconScore {
        let (square, area, standard_size) = match self.info {
            Some(info) => (
                info.width == info.height,
                u64::from(info.width) * u64::from(info.height),
                STANDARD_SIZES.contains(&info.width.max(info.height)),
            ),
            None => (false, 0, false),
        };
        let name_match = self
            .relative
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|s| s.eq_ignore_ascii_case(app_name));

        IconScore {
            probed: self.info.is_some(),
            square,
            icon_context: in_icon_context(&self.relative),
            format: self.format,
            area,
            standard_size,
            name_match,
            depth: Reverse(self.relative.components().count()),
            path: Reverse(self.relative.clone()),
        }
    }

    /// Theme subdirectory the icon belongs in, e.g. `scalable/apps` or `128x128/apps`.
    pub fn theme_dir(&self) -> PathBuf {
        if self.format.is_scalable() {
            return PathBuf::from("scalable/apps");
        }
        let size = match self.info {
            Some(info) => snap_to_standard(info.width.max(info.height)),
            None => FALLBACK_SIZE,
        };
        PathBuf::from(format!("{size}x{size}/apps"))
    }
}

/// Largest standard size not above `edge`, never below the smallest one.
fn snap_to_standard(edge: u32) -> u32 {
    STANDARD_SIZES
        .iter()
        .rev()
        .copied()
        .find(|&s| s <= edge)
        .unwrap_or(STANDARD_SIZES[0])
}

// Root files (the bundle's declared icon) and anything under an apps/ or pixmaps/ folder.
fn in_icon_context(relative: &Path) -> bool {
    match relative.parent() {
        None => true,
        Some(parent) => {
            parent.as_os_str().is_empty()
                || parent.components().any(|c| match c {
                    Component::Normal(n) => n == "apps" || n == "pixmaps",
                    _ => false,
                })
        }
    }
}

/// Picks the highest scoring candidate.
pub fn select_best(candidates: Vec<IconCandidate>, app_name: &str) -> Option<(IconCandidate, IconScore)> {
    candidates
        .into_iter()
        .map(|c| {
            let score = c.score(app_name);
            (c, score)
        })
        .max_by(|(_, a), (_, b)| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(relative: &str, format: IconFormat, size: Option<(u32, u32)>) -> IconCandidate {
        IconCandidate {
            path: Path::new("/unpacked").join(relative),
            relative: PathBuf::from(relative),
            format,
            info: size.map(|(width, height)| ImageInfo { width, height, format }),
        }
    }

    fn best(candidates: Vec<IconCandidate>) -> String {
        select_best(candidates, "app").unwrap().0.relative.display().to_string()
    }

    #[test]
    fn svg_beats_large_png() {
        let picked = best(vec![
            candidate("usr/share/icons/hicolor/512x512/apps/app.png", IconFormat::Png, Some((512, 512))),
            candidate("usr/share/icons/hicolor/scalable/apps/app.svg", IconFormat::Svg, Some((48, 48))),
        ]);
        assert_eq!(picked, "usr/share/icons/hicolor/scalable/apps/app.svg");
    }

    #[test]
    fn larger_png_wins() {
        let picked = best(vec![
            candidate("usr/share/icons/hicolor/64x64/apps/app.png", IconFormat::Png, Some((64, 64))),
            candidate("usr/share/icons/hicolor/256x256/apps/app.png", IconFormat::Png, Some((256, 256))),
            candidate("usr/share/icons/hicolor/32x32/apps/app.png", IconFormat::Png, Some((32, 32))),
        ]);
        assert_eq!(picked, "usr/share/icons/hicolor/256x256/apps/app.png");
    }

    #[test]
    fn screenshots_and_mime_icons_lose() {
        let picked = best(vec![
            candidate("usr/share/app/screenshot.png", IconFormat::Png, Some((1920, 1080))),
            candidate("usr/share/icons/hicolor/512x512/mimetypes/doc.png", IconFormat::Png, Some((512, 512))),
            candidate("app.png", IconFormat::Png, Some((128, 128))),
        ]);
        assert_eq!(picked, "app.png");
    }

    #[test]
    fn probed_beats_unprobed() {
        let picked = best(vec![
            candidate("broken.svg", IconFormat::Svg, None),
            candidate("app.ico", IconFormat::Ico, Some((32, 32))),
        ]);
        assert_eq!(picked, "app.ico");
    }

    #[test]
    fn area_outranks_standard_size() {
        let odd = candidate("apps/a.png", IconFormat::Png, Some((100, 100)));
        let std = candidate("apps/b.png", IconFormat::Png, Some((96, 96)));
        assert!(odd.score("x") > std.score("x"));
    }

    #[test]
    fn standard_size_breaks_area_ties() {
        let wide = candidate("apps/wide.png", IconFormat::Png, Some((256, 100)));
        let odd = candidate("apps/odd.png", IconFormat::Png, Some((200, 128)));
        assert_eq!(wide.score("x").area, odd.score("x").area);
        assert!(wide.score("x") > odd.score("x"));
    }

    #[test]
    fn ties_resolve_by_name_then_path() {
        let picked = best(vec![
            candidate("other.png", IconFormat::Png, Some((256, 256))),
            candidate("app.png", IconFormat::Png, Some((256, 256))),
        ]);
        assert_eq!(picked, "app.png");

        let picked = best(vec![
            candidate("b.png", IconFormat::Png, Some((256, 256))),
            candidate("a.png", IconFormat::Png, Some((256, 256))),
        ]);
        assert_eq!(picked, "a.png");
    }

    #[test]
    fn selection_ignores_input_order() {
        let items = vec![
            candidate(".DirIcon", IconFormat::Png, Some((256, 256))),
            candidate("app.png", IconFormat::Png, Some((256, 256))),
            candidate("usr/share/icons/hicolor/256x256/apps/app.png", IconFormat::Png, Some((256, 256))),
        ];
        let forward = best(items.clone());
        let reversed = best(items.into_iter().rev().collect());
        assert_eq!(forward, reversed);
        assert_eq!(forward, "app.png");
    }

    #[test]
    fn theme_dirs() {
        assert_eq!(candidate("a.svg", IconFormat::Svg, Some((1000, 1000))).theme_dir(), PathBuf::from("scalable/apps"));
        assert_eq!(candidate("a.png", IconFormat::Png, Some((256, 256))).theme_dir(), PathBuf::from("256x256/apps"));
        assert_eq!(candidate("a.png", IconFormat::Png, Some((300, 200))).theme_dir(), PathBuf::from("256x256/apps"));
        assert_eq!(candidate("a.png", IconFormat::Png, Some((1024, 1024))).theme_dir(), PathBuf::from("512x512/apps"));
        assert_eq!(candidate("a.ico", IconFormat::Ico, Some((8, 8))).theme_dir(), PathBuf::from("16x16/apps"));
        assert_eq!(candidate("a.xpm", IconFormat::Xpm, None).theme_dir(), PathBuf::from("48x48/apps"));
    }

    #[test]
    fn empty_candidate_list() {
        assert!(select_best(Vec::new(), "app").is_none());
    }
}
