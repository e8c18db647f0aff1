//! Format detection and dimension probing for icon candidates.
//!
//! Every supported format implements [`ImageProbe`]. A probe reports a
//! normalized [`ImageInfo`], or `None` when the bytes cannot be measured.

use image::{ImageFormat, ImageReader};
use regex::Regex;
use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IconFormat {
    // Declaration order is the preference order used when scoring.
    Ico,
    Xpm,
    Png,
    Svg,
}

impl IconFormat {
    pub fn from_extension(path: &Path) -> Option<IconFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "png" => Some(IconFormat::Png),
            "svg" => Some(IconFormat::Svg),
            "xpm" => Some(IconFormat::Xpm),
            "ico" => Some(IconFormat::Ico),
            _ => None,
        }
    }

    pub fn is_scalable(self) -> bool {
        self == IconFormat::Svg
    }
}

impl fmt::Display for IconFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IconFormat::Ico => "ico",
            IconFormat::Xpm => "xpm",
            IconFormat::Png => "png",
            IconFormat::Svg => "svg",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: IconFormat,
}

pub trait ImageProbe: Sync {
    fn format(&self) -> IconFormat;

    /// Whether `bytes` look like this format.
    fn sniff(&self, bytes: &[u8]) -> bool;

    fn probe(&self, bytes: &[u8]) -> Option<ImageInfo>;
}

pub struct PngProbe;
pub struct IcoProbe;
pub struct SvgProbe;
pub struct XpmProbe;

pub static PROBES: &[&dyn ImageProbe] = &[&PngProbe, &IcoProbe, &SvgProbe, &XpmProbe];

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const ICO_MAGIC: &[u8] = &[0, 0, 1, 0];
const XPM_MAGIC: &[u8] = b"/* XPM */";
const SNIFF_WINDOW: usize = 1024;

fn raster_dimensions(bytes: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
    ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .ok()
}

impl ImageProbe for PngProbe {
    fn format(&self) -> IconFormat { IconFormat::Png }

    fn sniff(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(PNG_MAGIC)
    }

    fn probe(&self, bytes: &[u8]) -> Option<ImageInfo> {
        let (width, height) = raster_dimensions(bytes, ImageFormat::Png)?;
        Some(ImageInfo { width, height, format: IconFormat::Png })
    }
}

impl ImageProbe for IcoProbe {
    fn format(&self) -> IconFormat { IconFormat::Ico }

    fn sniff(&self, bytes: &[u8]) -> bool {
        bytes.len() > 6 && bytes.starts_with(ICO_MAGIC)
    }

    // The decoder reports the largest entry in the directory.
    fn probe(&self, bytes: &[u8]) -> Option<ImageInfo> {
        let (width, height) = raster_dimensions(bytes, ImageFormat::Ico)?;
        Some(ImageInfo { width, height, format: IconFormat::Ico })
    }
}

impl ImageProbe for SvgProbe {
    fn format(&self) -> IconFormat { IconFormat::Svg }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let head = &bytes[..bytes.len().min(SNIFF_WINDOW)];
        String::from_utf8_lossy(head).contains("<svg")
    }

    fn probe(&self, bytes: &[u8]) -> Option<ImageInfo> {
        let opt = resvg::usvg::Options::default();
        let tree = resvg::usvg::Tree::from_data(bytes, &opt).ok()?;
        let size = tree.size();
        Some(ImageInfo {
            width: size.width().round() as u32,
            height: size.height().round() as u32,
            format: IconFormat::Svg,
        })
    }
}

// First string of the XPM array: "<width> <height> <colors> <chars per pixel>".
// Writers such as ImageMagick put a C comment between `{` and that string.
static XPM_VALUES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\{(?:\s|/\*.*?\*/)*"\s*(\d+)\s+(\d+)\s+\d+\s+\d+"#).expect("valid xpm regex")
});

impl ImageProbe for XpmProbe {
    fn format(&self) -> IconFormat { IconFormat::Xpm }

    fn sniff(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(XPM_MAGIC)
    }

    fn probe(&self, bytes: &[u8]) -> Option<ImageInfo> {
        let head = &bytes[..bytes.len().min(SNIFF_WINDOW * 4)];
        let text = String::from_utf8_lossy(head);
        let caps = XPM_VALUES.captures(&text)?;
        let width = caps[1].parse().ok()?;
        let height = caps[2].parse().ok()?;
        Some(ImageInfo { width, height, format: IconFormat::Xpm })
    }
}

fn probe_for(format: IconFormat) -> &'static dyn ImageProbe {
    match format {
        IconFormat::Png => &PngProbe,
        IconFormat::Ico => &IcoProbe,
        IconFormat::Svg => &SvgProbe,
        IconFormat::Xpm => &XpmProbe,
    }
}

/// Format of `bytes`: content sniffing first, then the file extension.
pub fn detect_format(path: &Path, bytes: &[u8]) -> Option<IconFormat> {
    PROBES
        .iter()
        .find(|p| p.sniff(bytes))
        .map(|p| p.format())
        .or_else(|| IconFormat::from_extension(path))
}

/// Detects the format and measures the image. The format is `None` when
/// neither content nor name identifies an image; the info is `None` when the
/// image could not be measured.
pub fn probe_image(path: &Path, bytes: &[u8]) -> (Option<IconFormat>, Option<ImageInfo>) {
    match detect_format(path, bytes) {
        Some(format) => (Some(format), probe_for(format).probe(bytes)),
        None => (None, None),
    }
}
