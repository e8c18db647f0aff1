/// Menu category for a bundle, picked from its inferred name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Category {
    pub categories: &'static str,
    /// Browsers take a URL argument, so their Exec line ends with `%u`.
    pub takes_url: bool,
}

pub const BROWSER: Category = Category { categories: "Network;WebBrowser;", takes_url: true };
pub const UTILITY: Category = Category { categories: "Utility;", takes_url: false };

// Checked in order; the first rule with a matching keyword wins.
const RULES: &[(&[&str], Category)] = &[
    (
        &["chrome", "chromium", "firefox", "librewolf", "microsoft-edge", "msedge", "brave", "opera", "safari", "vivaldi", "waterfox", "floorp", "zen-browser"],
        BROWSER,
    ),
    (
        &["libreoffice", "openoffice", "onlyoffice", "word", "excel", "powerpoint"],
        Category { categories: "Office;", takes_url: false },
    ),
    (
        &["code", "studio", "ide", "editor", "vim", "emacs", "sublime"],
        Category { categories: "Development;IDE;", takes_url: false },
    ),
    (
        &["player", "vlc", "mpv", "kodi", "spotify", "audacity"],
        Category { categories: "AudioVideo;Audio;Video;", takes_url: false },
    ),
    (
        &["gimp", "inkscape", "blender", "krita", "darktable"],
        Category { categories: "Graphics;2DGraphics;3DGraphics;", takes_url: false },
    ),
    (
        &["game", "steam", "minecraft", "roblox"],
        Category { categories: "Game;", takes_url: false },
    ),
    (
        &["terminal", "system", "admin", "disk", "backup"],
        Category { categories: "System;", takes_url: false },
    ),
];

pub fn detect_category(app_name: &str) -> Category {
    let lower = app_name.to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, category)| *category)
        .unwrap_or(UTILITY)
}
